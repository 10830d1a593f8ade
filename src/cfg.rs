//! CFG Builder: folds a flat `Statement` sequence (with its
//! `block_open`/`block_close` structure markers) into a directed graph with
//! typed nodes, then exposes dominators and bounded path enumeration.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::Serialize;

use crate::model::{Statement, StatementKind};

pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CfgNodeKind {
    Entry,
    Exit,
    Statement,
    Branch,
    Merge,
    LoopHeader,
    LoopBack,
}

#[derive(Debug, Clone)]
pub struct CfgNode {
    pub id: NodeId,
    pub kind: CfgNodeKind,
    pub statement: Option<Statement>,
    pub successors: Vec<NodeId>,
    pub predecessors: BTreeSet<NodeId>,
    pub line_start: Option<usize>,
    pub line_end: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct Cfg {
    pub nodes: Vec<CfgNode>,
    pub entry: NodeId,
    pub exits: Vec<NodeId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CfgNodeSummary {
    pub id: NodeId,
    pub kind: CfgNodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_start: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_end: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CfgSummary {
    pub nodes: Vec<CfgNodeSummary>,
    pub edges: Vec<(NodeId, NodeId)>,
    pub entry_node: NodeId,
    pub exit_nodes: Vec<NodeId>,
}

#[derive(Default)]
struct LoopFrame {
    break_sources: Vec<NodeId>,
    continue_sources: Vec<NodeId>,
}

impl Cfg {
    /// Builds a CFG from a function's flat statement sequence.
    pub fn build(stmts: &[Statement]) -> Cfg {
        let mut nodes = Vec::new();
        let entry = push_node(&mut nodes, CfgNodeKind::Entry, None);
        let exit = push_node(&mut nodes, CfgNodeKind::Exit, None);

        let mut idx = 0usize;
        let mut loop_stack = Vec::new();
        let fringe = link_body(stmts, &mut idx, &mut nodes, vec![entry], exit, &mut loop_stack);
        connect(&mut nodes, &fringe, exit);

        Cfg {
            nodes,
            entry,
            exits: vec![exit],
        }
    }

    pub fn summary(&self) -> CfgSummary {
        let mut edges = Vec::new();
        let node_summaries = self
            .nodes
            .iter()
            .map(|n| {
                for &succ in &n.successors {
                    edges.push((n.id, succ));
                }
                CfgNodeSummary {
                    id: n.id,
                    kind: n.kind,
                    line_start: n.line_start,
                    line_end: n.line_end,
                    text: n.statement.as_ref().map(|s| s.text.clone()),
                }
            })
            .collect();
        CfgSummary {
            nodes: node_summaries,
            edges,
            entry_node: self.entry,
            exit_nodes: self.exits.clone(),
        }
    }

    fn reachable_from_entry(&self) -> Vec<NodeId> {
        let mut seen = vec![false; self.nodes.len()];
        let mut order = Vec::new();
        let mut queue = VecDeque::new();
        queue.push_back(self.entry);
        seen[self.entry] = true;
        while let Some(n) = queue.pop_front() {
            order.push(n);
            for &succ in &self.nodes[n].successors {
                if !seen[succ] {
                    seen[succ] = true;
                    queue.push_back(succ);
                }
            }
        }
        order
    }

    /// Standard dominator fixed point, restricted to nodes reachable from
    /// entry: `Dom(entry) = {entry}`; `Dom(n) = {n} ∪ ⋂ Dom(preds(n))`.
    pub fn dominators(&self) -> BTreeMap<NodeId, BTreeSet<NodeId>> {
        let reachable = self.reachable_from_entry();
        let reachable_set: BTreeSet<NodeId> = reachable.iter().copied().collect();

        let mut dom: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();
        for &n in &reachable {
            dom.insert(
                n,
                if n == self.entry {
                    [n].into()
                } else {
                    reachable_set.clone()
                },
            );
        }

        let rpo = reverse_postorder(&self.nodes, self.entry, &reachable_set);

        let mut changed = true;
        while changed {
            changed = false;
            for &n in &rpo {
                if n == self.entry {
                    continue;
                }
                let preds: Vec<NodeId> = self.nodes[n]
                    .predecessors
                    .iter()
                    .copied()
                    .filter(|p| reachable_set.contains(p))
                    .collect();
                if preds.is_empty() {
                    continue;
                }
                let mut new_dom = dom[&preds[0]].clone();
                for p in &preds[1..] {
                    new_dom = new_dom.intersection(&dom[p]).copied().collect();
                }
                new_dom.insert(n);
                if new_dom != dom[&n] {
                    dom.insert(n, new_dom);
                    changed = true;
                }
            }
        }
        dom
    }

    /// Depth-first path enumeration from Entry to any Exit. An edge to a
    /// `LoopHeader` already on the current path is treated as terminating
    /// that path (pruned, not counted). Stops and sets `truncated=true` once
    /// `max_paths` complete paths have been found.
    pub fn enumerate_paths(&self, max_paths: usize) -> (Vec<Vec<NodeId>>, bool) {
        let mut paths = Vec::new();
        let mut truncated = false;
        let mut stack_path = vec![self.entry];
        let mut on_path = vec![false; self.nodes.len()];
        on_path[self.entry] = true;
        self.dfs_paths(self.entry, &mut stack_path, &mut on_path, &mut paths, &mut truncated, max_paths);
        (paths, truncated)
    }

    #[allow(clippy::too_many_arguments)]
    fn dfs_paths(
        &self,
        current: NodeId,
        path: &mut Vec<NodeId>,
        on_path: &mut [bool],
        out: &mut Vec<Vec<NodeId>>,
        truncated: &mut bool,
        max_paths: usize,
    ) {
        if *truncated {
            return;
        }
        if self.nodes[current].kind == CfgNodeKind::Exit {
            out.push(path.clone());
            if out.len() >= max_paths {
                *truncated = true;
            }
            return;
        }
        for &succ in &self.nodes[current].successors {
            if *truncated {
                break;
            }
            if self.nodes[succ].kind == CfgNodeKind::LoopHeader && on_path[succ] {
                continue; // back-edge: terminate this path without recording it
            }
            path.push(succ);
            on_path[succ] = true;
            self.dfs_paths(succ, path, on_path, out, truncated, max_paths);
            on_path[succ] = false;
            path.pop();
        }
    }
}

fn reverse_postorder(nodes: &[CfgNode], entry: NodeId, reachable: &BTreeSet<NodeId>) -> Vec<NodeId> {
    let mut visited = vec![false; nodes.len()];
    let mut postorder = Vec::new();
    let mut stack = vec![(entry, false)];
    while let Some((n, processed)) = stack.pop() {
        if processed {
            postorder.push(n);
            continue;
        }
        if visited[n] {
            continue;
        }
        visited[n] = true;
        stack.push((n, true));
        for &succ in &nodes[n].successors {
            if reachable.contains(&succ) && !visited[succ] {
                stack.push((succ, false));
            }
        }
    }
    postorder.reverse();
    postorder
}

fn push_node(nodes: &mut Vec<CfgNode>, kind: CfgNodeKind, statement: Option<Statement>) -> NodeId {
    let id = nodes.len();
    let (line_start, line_end) = match &statement {
        Some(s) => (Some(s.line), Some(s.line)),
        None => (None, None),
    };
    nodes.push(CfgNode {
        id,
        kind,
        statement,
        successors: Vec::new(),
        predecessors: BTreeSet::new(),
        line_start,
        line_end,
    });
    id
}

fn connect(nodes: &mut [CfgNode], from: &[NodeId], to: NodeId) {
    for &f in from {
        nodes[f].successors.push(to);
        nodes[to].predecessors.insert(f);
    }
}

fn connect_one(nodes: &mut [CfgNode], from: NodeId, to: NodeId) {
    connect(nodes, &[from], to);
}

fn expect_block_open(stmts: &[Statement], idx: &mut usize) {
    if *idx < stmts.len() && stmts[*idx].kind == StatementKind::BlockOpen {
        *idx += 1;
    }
}

/// Consumes `stmts[*idx..]` until a `block_close` at this nesting level (or
/// the end of the slice), folding control constructs structurally. Returns
/// the "fringe" — the node ids whose next statement, if any, should be
/// wired as their successor. An empty fringe means everything that follows
/// at this level is unreachable (falls after a `return`/`break`/`continue`).
fn link_body(
    stmts: &[Statement],
    idx: &mut usize,
    nodes: &mut Vec<CfgNode>,
    initial_fringe: Vec<NodeId>,
    exit: NodeId,
    loop_stack: &mut Vec<LoopFrame>,
) -> Vec<NodeId> {
    let mut fringe = initial_fringe;
    while *idx < stmts.len() {
        match stmts[*idx].kind {
            StatementKind::BlockClose => {
                *idx += 1;
                return fringe;
            }
            StatementKind::If => {
                let stmt = stmts[*idx].clone();
                *idx += 1;
                let branch = push_node(nodes, CfgNodeKind::Branch, Some(stmt));
                connect(nodes, &fringe, branch);
                expect_block_open(stmts, idx);
                let then_fringe =
                    link_body(stmts, idx, nodes, vec![branch], exit, loop_stack);
                let else_fringe = if *idx < stmts.len() && stmts[*idx].kind == StatementKind::Else
                {
                    *idx += 1;
                    expect_block_open(stmts, idx);
                    link_body(stmts, idx, nodes, vec![branch], exit, loop_stack)
                } else {
                    vec![branch]
                };
                let merge = push_node(nodes, CfgNodeKind::Merge, None);
                connect(nodes, &then_fringe, merge);
                connect(nodes, &else_fringe, merge);
                fringe = vec![merge];
            }
            StatementKind::Loop | StatementKind::While | StatementKind::For => {
                let stmt = stmts[*idx].clone();
                *idx += 1;
                let header = push_node(nodes, CfgNodeKind::LoopHeader, Some(stmt));
                connect(nodes, &fringe, header);
                expect_block_open(stmts, idx);
                loop_stack.push(LoopFrame::default());
                let body_fringe =
                    link_body(stmts, idx, nodes, vec![header], exit, loop_stack);
                let frame = loop_stack.pop().unwrap();
                let loopback = push_node(nodes, CfgNodeKind::LoopBack, None);
                connect(nodes, &body_fringe, loopback);
                connect(nodes, &frame.continue_sources, loopback);
                connect_one(nodes, loopback, header);
                fringe = frame.break_sources;
                fringe.push(header);
            }
            StatementKind::Else => {
                // Only valid directly after an `If`'s block; encountering
                // one here means malformed input. Skip it defensively.
                *idx += 1;
            }
            StatementKind::Return => {
                let stmt = stmts[*idx].clone();
                *idx += 1;
                let node = push_node(nodes, CfgNodeKind::Statement, Some(stmt));
                connect(nodes, &fringe, node);
                connect_one(nodes, node, exit);
                fringe = Vec::new();
            }
            StatementKind::Break => {
                let stmt = stmts[*idx].clone();
                *idx += 1;
                let node = push_node(nodes, CfgNodeKind::Statement, Some(stmt));
                connect(nodes, &fringe, node);
                if let Some(frame) = loop_stack.last_mut() {
                    frame.break_sources.push(node);
                }
                fringe = Vec::new();
            }
            StatementKind::Continue => {
                let stmt = stmts[*idx].clone();
                *idx += 1;
                let node = push_node(nodes, CfgNodeKind::Statement, Some(stmt));
                connect(nodes, &fringe, node);
                if let Some(frame) = loop_stack.last_mut() {
                    frame.continue_sources.push(node);
                }
                fringe = Vec::new();
            }
            StatementKind::BlockOpen => {
                // A bare nested scope (no preceding control keyword); purely
                // sequential, so just descend into it transparently.
                *idx += 1;
                fringe = link_body(stmts, idx, nodes, fringe, exit, loop_stack);
            }
            _ => {
                let stmt = stmts[*idx].clone();
                *idx += 1;
                let node = push_node(nodes, CfgNodeKind::Statement, Some(stmt));
                connect(nodes, &fringe, node);
                fringe = vec![node];
            }
        }
    }
    fringe
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::statement::parse_statements;

    #[test]
    fn branching_function_has_one_branch_and_two_returns() {
        let stmts = parse_statements("if x {\n return 1;\n} else {\n return 2;\n}\n", 1);
        let cfg = Cfg::build(&stmts);
        let branches = cfg
            .nodes
            .iter()
            .filter(|n| n.kind == CfgNodeKind::Branch)
            .count();
        let returns = cfg
            .nodes
            .iter()
            .filter(|n| n.kind == CfgNodeKind::Statement
                && n.statement.as_ref().map(|s| s.kind) == Some(StatementKind::Return))
            .count();
        assert_eq!(branches, 1);
        assert_eq!(returns, 2);

        let (paths, truncated) = cfg.enumerate_paths(100);
        assert_eq!(paths.len(), 2);
        assert!(!truncated);

        let dom = cfg.dominators();
        for n in cfg.nodes.iter().filter(|n| n.kind == CfgNodeKind::Statement) {
            assert!(dom[&n.id].contains(&cfg.entry));
        }
    }

    #[test]
    fn every_non_entry_node_has_a_predecessor_when_reachable() {
        let stmts = parse_statements("let x = 1;\nreturn x;\n", 1);
        let cfg = Cfg::build(&stmts);
        for n in &cfg.nodes {
            if n.id == cfg.entry {
                assert!(n.predecessors.is_empty());
            } else if !n.successors.is_empty() || n.kind == CfgNodeKind::Exit {
                assert!(!n.predecessors.is_empty(), "node {:?} unreachable", n.kind);
            }
        }
    }

    #[test]
    fn loop_with_break_reaches_exit() {
        let stmts = parse_statements("loop {\n if done {\n break;\n } \n}\nreturn 0;\n", 1);
        let cfg = Cfg::build(&stmts);
        let (paths, truncated) = cfg.enumerate_paths(100);
        assert!(!truncated);
        assert!(!paths.is_empty());
        assert!(paths.iter().all(|p| cfg.nodes[*p.last().unwrap()].kind == CfgNodeKind::Exit));
    }

    #[test]
    fn unreachable_statement_after_return_has_no_predecessor() {
        let stmts = parse_statements("return 1;\nlet y = 2;\n", 1);
        let cfg = Cfg::build(&stmts);
        let dead = cfg
            .nodes
            .iter()
            .find(|n| {
                n.statement
                    .as_ref()
                    .map(|s| s.kind == StatementKind::LetBinding)
                    .unwrap_or(false)
            })
            .unwrap();
        assert!(dead.predecessors.is_empty());
    }
}
