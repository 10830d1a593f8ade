//! File Scanner: enumerates `*.cairo` files under each input root, excludes
//! tests, and derives each file's module path.

use std::collections::HashSet;

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use serde::Serialize;
use walkdir::WalkDir;

use crate::model::ModulePath;

#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub file_path: Utf8PathBuf,
    pub module_path: ModulePath,
}

/// Emitted once per root the first time that root's module paths had to
/// fall back to "relative to root" because no `src/` ancestor was found.
/// Surfaced on `RunMetadata`, since it's a property of the root, not of any
/// single `ContractInfo`.
#[derive(Debug, Clone, Serialize)]
pub struct ModulePathFallback {
    pub root: Utf8PathBuf,
    pub file_path: Utf8PathBuf,
}

#[derive(Debug, Default)]
pub struct ScanResult {
    pub files: Vec<ScannedFile>,
    pub fallbacks: Vec<ModulePathFallback>,
}

const TEST_BASENAME: &str = "tests.cairo";

fn is_test_basename(basename: &str) -> bool {
    basename == TEST_BASENAME
        || (basename.starts_with("test_") && basename.ends_with(".cairo"))
        || (basename.ends_with("_test.cairo"))
}

fn has_test_segment(path: &Utf8Path) -> bool {
    path.components()
        .any(|c| c.as_str() == "tests" || c.as_str() == "test")
}

fn should_exclude(path: &Utf8Path, exclude_tests: bool) -> bool {
    if !exclude_tests {
        return false;
    }
    let basename = path.file_name().unwrap_or_default();
    is_test_basename(basename) || has_test_segment(path)
}

/// Find the innermost ancestor directory literally named `src` that
/// contains `file_path`, and return the file's path relative to it.
fn relative_to_src(file_path: &Utf8Path) -> Option<Utf8PathBuf> {
    // `ancestors()` walks from the file itself up to the filesystem root;
    // the first `src` encountered this way is the innermost one.
    for anc in file_path.ancestors() {
        if anc.file_name() == Some("src") {
            return file_path.strip_prefix(anc).ok().map(Utf8PathBuf::from);
        }
    }
    None
}

fn path_to_module(relative: &Utf8Path) -> ModulePath {
    let mut segs: Vec<String> = relative
        .components()
        .map(|c| c.as_str().to_string())
        .collect();
    if let Some(last) = segs.last_mut() {
        if let Some(stripped) = last.strip_suffix(".cairo") {
            *last = stripped.to_string();
        }
    }
    // `lib`/`mod` collapse to their parent directory's module path.
    if segs.last().map(String::as_str) == Some("lib") || segs.last().map(String::as_str) == Some("mod") {
        segs.pop();
    }
    ModulePath::new(segs.join("::"))
}

/// Derives the module path for `file_path`, relative to `root` if no `src/`
/// ancestor is found. Returns the module path and whether the root-relative
/// fallback was used.
pub fn derive_module_path(root: &Utf8Path, file_path: &Utf8Path) -> (ModulePath, bool) {
    if let Some(rel) = relative_to_src(file_path) {
        return (path_to_module(&rel), false);
    }
    let rel = file_path.strip_prefix(root).unwrap_or(file_path);
    (path_to_module(rel), true)
}

/// Scans `roots` in order, deduplicating by canonicalized absolute path
/// (first occurrence wins across roots). Re-scanning the same ordered roots
/// yields the same sequence.
pub fn scan(roots: &[Utf8PathBuf], exclude_tests: bool) -> ScanResult {
    let mut seen: HashSet<Utf8PathBuf> = HashSet::new();
    let mut result = ScanResult::default();

    for root in roots {
        let mut root_fell_back = false;
        for entry in WalkDir::new(root.as_std_path())
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = match Utf8PathBuf::try_from(entry.into_path()) {
                Ok(p) => p,
                Err(_) => continue,
            };
            if path.extension() != Some("cairo") {
                continue;
            }
            if should_exclude(&path, exclude_tests) {
                debug!("excluding test file {path}");
                continue;
            }
            let canonical = path
                .as_std_path()
                .canonicalize()
                .ok()
                .and_then(|p| Utf8PathBuf::try_from(p).ok())
                .unwrap_or_else(|| path.clone());
            if !seen.insert(canonical) {
                continue;
            }
            let (module_path, fell_back) = derive_module_path(root, &path);
            if fell_back && !root_fell_back {
                root_fell_back = true;
                warn!("no `src/` ancestor found for {path}; module path derived relative to root {root}");
                result.fallbacks.push(ModulePathFallback {
                    root: root.clone(),
                    file_path: path.clone(),
                });
            }
            result.files.push(ScannedFile {
                file_path: path,
                module_path,
            });
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_file(root: &Utf8Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "// empty\n").unwrap();
    }

    #[test]
    fn module_path_under_src() {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        write_file(&root, "src/math/delta.cairo");

        let result = scan(&[root.clone()], true);
        assert_eq!(result.files.len(), 1);
        assert_eq!(result.files[0].module_path.as_str(), "math::delta");
    }

    #[test]
    fn lib_and_mod_collapse_to_parent() {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        write_file(&root, "src/lib.cairo");
        write_file(&root, "src/foo/mod.cairo");

        let result = scan(&[root.clone()], true);
        let paths: Vec<_> = result
            .files
            .iter()
            .map(|f| f.module_path.as_str().to_string())
            .collect();
        assert!(paths.contains(&String::new()));
        assert!(paths.contains(&"foo".to_string()));
    }

    #[test]
    fn excludes_test_files() {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        write_file(&root, "src/foo.cairo");
        write_file(&root, "src/test_foo.cairo");
        write_file(&root, "src/foo_test.cairo");
        write_file(&root, "src/tests.cairo");
        write_file(&root, "src/tests/bar.cairo");

        let result = scan(&[root.clone()], true);
        assert_eq!(result.files.len(), 1);
        assert_eq!(result.files[0].module_path.as_str(), "foo");
    }

    #[test]
    fn scanner_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        write_file(&root, "src/a.cairo");
        write_file(&root, "src/b.cairo");

        let first = scan(&[root.clone()], true);
        let second = scan(&[root.clone()], true);
        let first_paths: Vec<_> = first.files.iter().map(|f| f.file_path.clone()).collect();
        let second_paths: Vec<_> = second.files.iter().map(|f| f.file_path.clone()).collect();
        assert_eq!(first_paths, second_paths);
    }

    #[test]
    fn first_occurrence_wins_across_roots() {
        let tmp_a = TempDir::new().unwrap();
        let tmp_b = TempDir::new().unwrap();
        let root_a = Utf8PathBuf::try_from(tmp_a.path().to_path_buf()).unwrap();
        let root_b = Utf8PathBuf::try_from(tmp_b.path().to_path_buf()).unwrap();
        write_file(&root_a, "src/shared.cairo");
        // Same absolute file can't exist in two roots; this checks that
        // scanning both roots doesn't panic and preserves root order.
        write_file(&root_b, "src/other.cairo");

        let result = scan(&[root_a, root_b], true);
        assert_eq!(result.files.len(), 2);
    }
}
