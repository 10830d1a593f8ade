//! Dataflow Analyzer: runs reaching-definitions over a built CFG and
//! derives def-use chains, storage-access records, external-call records,
//! and the two warning kinds from the result.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::cfg::{Cfg, NodeId};
use crate::model::StatementKind;

#[derive(Debug, Clone, Serialize)]
pub struct DefUseChain {
    pub variable: String,
    pub defs: BTreeSet<NodeId>,
    pub uses: BTreeSet<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    Read,
    Write,
}

#[derive(Debug, Clone, Serialize)]
pub struct StorageAccess {
    pub access_type: AccessType,
    pub storage_var: String,
    pub line: usize,
    pub node_id: NodeId,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExternalCall {
    pub function_name: String,
    pub arguments: Vec<String>,
    pub line: usize,
    pub node_id: NodeId,
    pub internal: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    UninitializedUse,
    UnusedDefinition,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisWarning {
    pub kind: WarningKind,
    pub variable: String,
    pub line: usize,
}

/// Everything one dataflow pass over a function's CFG derives. The reporter
/// splits `warnings` out as a sibling of this struct in the external output
/// shape; it travels together here because one pass produces both.
#[derive(Debug, Clone, Serialize, Default)]
pub struct DataflowOutput {
    pub def_use_chains: Vec<DefUseChain>,
    pub storage_accesses: Vec<StorageAccess>,
    pub external_calls: Vec<ExternalCall>,
    pub warnings: Vec<AnalysisWarning>,
}

#[derive(Clone)]
struct DefSite {
    variable: String,
    node: NodeId,
}

/// Runs the analyzer. `params` are the function's parameter names (excluded
/// from uninitialized-use and treated as already live at Entry). `imported_symbols`
/// is every symbol name the owning contract's imports resolved or stubbed —
/// a `call` whose callee is in this set counts as external even without the
/// `dispatcher.method(...)` shape.
pub fn analyze(cfg: &Cfg, params: &[String], imported_symbols: &BTreeSet<String>) -> DataflowOutput {
    let param_set: BTreeSet<String> = params.iter().cloned().collect();

    let (def_sites, gen_of, var_to_defs) = collect_def_sites(cfg, &param_set);
    let (in_sets, _out_sets) = reaching_definitions(cfg, &gen_of, &var_to_defs);
    let da = definitely_assigned(cfg, &param_set, &var_to_defs);

    let mut chains: BTreeMap<String, DefUseChain> = BTreeMap::new();
    for d in &def_sites {
        chains
            .entry(d.variable.clone())
            .or_insert_with(|| DefUseChain {
                variable: d.variable.clone(),
                defs: BTreeSet::new(),
                uses: BTreeSet::new(),
            })
            .defs
            .insert(d.node);
    }

    let mut warnings = Vec::new();
    let mut storage_accesses = Vec::new();
    let mut external_calls = Vec::new();
    // Tracks, per definition site index, whether some later use reached it.
    let mut def_used: BTreeMap<(String, NodeId), bool> = BTreeMap::new();
    for d in &def_sites {
        def_used.insert((d.variable.clone(), d.node), false);
    }

    for node in &cfg.nodes {
        let Some(stmt) = &node.statement else { continue };

        for var in &stmt.used {
            // "Some path lacks a definition" is a must-analysis: a use
            // warns iff `var` is not guaranteed assigned on *every* path
            // reaching this node, independent of whether it happens to be
            // reached on at least one path (the may-analysis below).
            if !param_set.contains(var) && !da[node.id].contains(var) {
                warnings.push(AnalysisWarning {
                    kind: WarningKind::UninitializedUse,
                    variable: var.clone(),
                    line: stmt.line,
                });
            }

            let reaching: Vec<&DefSite> = in_sets[node.id]
                .iter()
                .filter_map(|idx| def_sites.get(*idx))
                .filter(|d| &d.variable == var)
                .collect();
            if reaching.is_empty() {
                continue;
            }

            let chain = chains.entry(var.clone()).or_insert_with(|| DefUseChain {
                variable: var.clone(),
                defs: BTreeSet::new(),
                uses: BTreeSet::new(),
            });
            chain.uses.insert(node.id);
            for d in &reaching {
                def_used.insert((d.variable.clone(), d.node), true);
            }
        }

        // Storage access is keyed off `storage_member`, not `kind`: a read
        // wrapped in a `let` binding (`let v = self.storage.x.read();`)
        // classifies as `let_binding` but still carries the member name and
        // the literal `.read(`/`.write(` text that disambiguates the two.
        if let Some(member) = &stmt.storage_member {
            let access_type = if stmt.text.contains(".write(") {
                AccessType::Write
            } else {
                AccessType::Read
            };
            storage_accesses.push(StorageAccess {
                access_type,
                storage_var: member.clone(),
                line: stmt.line,
                node_id: node.id,
            });
        }

        if stmt.kind == StatementKind::Call {
            if let Some(callee) = &stmt.callee {
                let external = stmt.qualified_call || imported_symbols.contains(callee);
                external_calls.push(ExternalCall {
                    function_name: callee.clone(),
                    arguments: stmt.arguments.clone(),
                    line: stmt.line,
                    node_id: node.id,
                    internal: !external,
                });
            }
        }
    }

    // Parameter-shadowing and underscore-prefixed definitions never warn
    // unused.
    for d in &def_sites {
        if param_set.contains(&d.variable) || d.variable.starts_with('_') {
            continue;
        }
        if !def_used.get(&(d.variable.clone(), d.node)).copied().unwrap_or(false) {
            let line = cfg.nodes[d.node]
                .statement
                .as_ref()
                .map(|s| s.line)
                .unwrap_or(0);
            warnings.push(AnalysisWarning {
                kind: WarningKind::UnusedDefinition,
                variable: d.variable.clone(),
                line,
            });
        }
    }

    let mut def_use_chains: Vec<DefUseChain> = chains.into_values().collect();
    def_use_chains.sort_by(|a, b| a.variable.cmp(&b.variable));
    storage_accesses.sort_by(|a, b| a.node_id.cmp(&b.node_id));
    external_calls.sort_by(|a, b| a.node_id.cmp(&b.node_id));
    warnings.sort_by(|a, b| a.line.cmp(&b.line).then_with(|| a.variable.cmp(&b.variable)));

    DataflowOutput {
        def_use_chains,
        storage_accesses,
        external_calls,
        warnings,
    }
}

/// Builds the definition-site table, plus `GEN(n)` (def indices introduced
/// at each node — parameters are a pseudo-GEN at Entry) and a variable name
/// to all-its-def-indices index used to compute `KILL`.
fn collect_def_sites(
    cfg: &Cfg,
    params: &BTreeSet<String>,
) -> (Vec<DefSite>, Vec<BTreeSet<usize>>, BTreeMap<String, BTreeSet<usize>>) {
    let mut def_sites = Vec::new();
    let mut gen_of = vec![BTreeSet::new(); cfg.nodes.len()];
    let mut var_to_defs: BTreeMap<String, BTreeSet<usize>> = BTreeMap::new();

    for p in params {
        let idx = def_sites.len();
        def_sites.push(DefSite {
            variable: p.clone(),
            node: cfg.entry,
        });
        gen_of[cfg.entry].insert(idx);
        var_to_defs.entry(p.clone()).or_default().insert(idx);
    }

    for node in &cfg.nodes {
        let Some(stmt) = &node.statement else { continue };
        for var in &stmt.defined {
            let idx = def_sites.len();
            def_sites.push(DefSite {
                variable: var.clone(),
                node: node.id,
            });
            gen_of[node.id].insert(idx);
            var_to_defs.entry(var.clone()).or_default().insert(idx);
        }
    }

    (def_sites, gen_of, var_to_defs)
}

/// `OUT(n) = GEN(n) ∪ (IN(n) − KILL(n))`, `IN(n) = ⋃ OUT(p)` over
/// predecessors, iterated to a fixed point. `KILL(n)` is every def index of
/// a variable redefined at `n`, drawn from `var_to_defs` rather than just
/// `GEN(n)` so a definition anywhere else in the function is killed too.
fn reaching_definitions(
    cfg: &Cfg,
    gen_of: &[BTreeSet<usize>],
    var_to_defs: &BTreeMap<String, BTreeSet<usize>>,
) -> (Vec<BTreeSet<usize>>, Vec<BTreeSet<usize>>) {
    let n = cfg.nodes.len();
    let mut in_sets = vec![BTreeSet::new(); n];
    let mut out_sets: Vec<BTreeSet<usize>> = gen_of.to_vec();

    let kill_of: Vec<BTreeSet<usize>> = cfg
        .nodes
        .iter()
        .map(|node| {
            let mut kill = BTreeSet::new();
            if let Some(stmt) = &node.statement {
                for var in &stmt.defined {
                    if let Some(defs) = var_to_defs.get(var) {
                        kill.extend(defs.iter().copied());
                    }
                }
            }
            if node.id == cfg.entry {
                // Parameters never get killed by anything upstream of
                // themselves; nothing to add here, their defs already live
                // in `gen_of[entry]`.
            }
            kill
        })
        .collect();

    let mut changed = true;
    let mut iterations = 0usize;
    while changed && iterations <= n + 2 {
        changed = false;
        iterations += 1;
        for node in &cfg.nodes {
            let id = node.id;
            let mut new_in = BTreeSet::new();
            for &pred in &node.predecessors {
                new_in.extend(out_sets[pred].iter().copied());
            }
            if new_in != in_sets[id] {
                in_sets[id] = new_in;
                changed = true;
            }

            let survivors: BTreeSet<usize> = in_sets[id]
                .difference(&kill_of[id])
                .copied()
                .collect();
            let mut new_out = gen_of[id].clone();
            new_out.extend(survivors);
            if new_out != out_sets[id] {
                out_sets[id] = new_out;
                changed = true;
            }
        }
    }

    (in_sets, out_sets)
}

/// "Definitely assigned" — a must-analysis, separate from the may-based
/// `reaching_definitions` above, used only for uninitialized-use warnings
/// (the question is whether *some* path lacks a definition, i.e. the
/// complement of "*every* path has one"). `IN(entry) = params`; `IN(n) = ⋂ OUT(preds)`
/// (a node with no predecessors — unreachable code — gets the universal set,
/// the lattice top, so it never spuriously warns); `OUT(n) = IN(n) ∪
/// defined(n)`. Returns `IN` per node, which is what a use at that node is
/// checked against.
fn definitely_assigned(
    cfg: &Cfg,
    params: &BTreeSet<String>,
    var_to_defs: &BTreeMap<String, BTreeSet<usize>>,
) -> Vec<BTreeSet<String>> {
    let universe: BTreeSet<String> = params.iter().cloned().chain(var_to_defs.keys().cloned()).collect();
    let n = cfg.nodes.len();

    let mut out: Vec<BTreeSet<String>> = vec![universe.clone(); n];
    out[cfg.entry] = params.clone();
    let mut in_da: Vec<BTreeSet<String>> = vec![BTreeSet::new(); n];

    let mut changed = true;
    let mut iterations = 0usize;
    while changed && iterations <= n + 2 {
        changed = false;
        iterations += 1;
        for node in &cfg.nodes {
            let id = node.id;
            if id == cfg.entry {
                continue;
            }
            let new_in = if node.predecessors.is_empty() {
                universe.clone()
            } else {
                let mut iter = node.predecessors.iter();
                let first = *iter.next().unwrap();
                let mut acc = out[first].clone();
                for &p in iter {
                    acc = acc.intersection(&out[p]).cloned().collect();
                }
                acc
            };
            if new_in != in_da[id] {
                in_da[id] = new_in.clone();
                changed = true;
            }

            let mut new_out = new_in;
            if let Some(stmt) = &node.statement {
                new_out.extend(stmt.defined.iter().cloned());
            }
            if new_out != out[id] {
                out[id] = new_out;
                changed = true;
            }
        }
    }

    in_da[cfg.entry] = BTreeSet::new();
    in_da
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::statement::parse_statements;

    fn build(body: &str) -> Cfg {
        let stmts = parse_statements(body, 1);
        Cfg::build(&stmts)
    }

    #[test]
    fn uninitialized_use_on_conditionally_assigned_var() {
        let cfg = build("let x;\nif cond {\n x = 1;\n}\nreturn x;\n");
        let result = analyze(&cfg, &[], &BTreeSet::new());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::UninitializedUse && w.variable == "x"));
    }

    #[test]
    fn initialized_use_has_no_warning() {
        let cfg = build("let x = 1;\nreturn x;\n");
        let result = analyze(&cfg, &[], &BTreeSet::new());
        assert!(!result
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::UninitializedUse));
        let chain = result
            .def_use_chains
            .iter()
            .find(|c| c.variable == "x")
            .unwrap();
        assert_eq!(chain.defs.len(), 1);
        assert_eq!(chain.uses.len(), 1);
    }

    #[test]
    fn unused_definition_is_flagged_and_underscore_excluded() {
        let cfg = build("let x = 1;\nlet _y = 2;\nreturn 0;\n");
        let result = analyze(&cfg, &[], &BTreeSet::new());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::UnusedDefinition && w.variable == "x"));
        assert!(!result
            .warnings
            .iter()
            .any(|w| w.variable == "_y"));
    }

    #[test]
    fn parameter_never_flagged_uninitialized_or_unused() {
        let cfg = build("return amount;\n");
        let result = analyze(&cfg, &["amount".to_string()], &BTreeSet::new());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn storage_read_and_write_are_recorded() {
        let cfg = build(
            "let v = self.storage.balance.read();\nself.storage.balance.write(v + 1);\nreturn 0;\n",
        );
        let result = analyze(&cfg, &[], &BTreeSet::new());
        assert_eq!(result.storage_accesses.len(), 2);
        assert_eq!(result.storage_accesses[0].access_type, AccessType::Read);
        assert_eq!(result.storage_accesses[1].access_type, AccessType::Write);
        assert!(result.storage_accesses.iter().all(|a| a.storage_var == "balance"));
    }

    #[test]
    fn dispatcher_call_is_external_plain_call_is_internal() {
        let cfg = build("dispatcher.transfer(to, amount);\nhelper();\nreturn 0;\n");
        let result = analyze(&cfg, &[], &BTreeSet::new());
        let dispatcher_call = result
            .external_calls
            .iter()
            .find(|c| c.function_name == "transfer")
            .unwrap();
        assert!(!dispatcher_call.internal);
        let helper_call = result
            .external_calls
            .iter()
            .find(|c| c.function_name == "helper")
            .unwrap();
        assert!(helper_call.internal);
    }

    #[test]
    fn qualified_call_arguments_exclude_receiver_and_keep_order() {
        let cfg = build("dispatcher.transfer(to, amount);\nreturn 0;\n");
        let result = analyze(&cfg, &[], &BTreeSet::new());
        let call = result
            .external_calls
            .iter()
            .find(|c| c.function_name == "transfer")
            .unwrap();
        assert_eq!(call.arguments, vec!["to".to_string(), "amount".to_string()]);
    }

    #[test]
    fn imported_symbol_call_counts_as_external_even_unqualified() {
        let cfg = build("transfer_from(a, b);\nreturn 0;\n");
        let imported: BTreeSet<String> = ["transfer_from".to_string()].into_iter().collect();
        let result = analyze(&cfg, &[], &imported);
        let call = result.external_calls.first().unwrap();
        assert!(!call.internal);
    }
}
