use opexgen_scan::{NodeId, NodeKind, SortKey, TreeWalker, WalkConfig, WarningKind};
use std::fs;
use tempfile::TempDir;

fn archive() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("A")).unwrap();
    fs::create_dir_all(root.join("B")).unwrap();
    fs::write(root.join("A/a1.txt"), "one").unwrap();
    fs::write(root.join("A/a2.txt"), "two").unwrap();
    temp
}

#[test]
fn test_scenario_tree_indexes() {
    let temp = archive();
    let outcome = TreeWalker::new(WalkConfig::new(temp.path())).walk().unwrap();
    let table = outcome.table;

    let summary: Vec<(String, NodeKind, u32, u32)> = table
        .iter()
        .skip(1)
        .map(|n| (n.name.to_string(), n.kind, n.level, n.sibling_index))
        .collect();

    assert_eq!(
        summary,
        vec![
            ("A".to_string(), NodeKind::Directory, 1, 1),
            ("a1.txt".to_string(), NodeKind::File, 2, 1),
            ("a2.txt".to_string(), NodeKind::File, 2, 2),
            ("B".to_string(), NodeKind::Directory, 1, 2),
        ]
    );
    assert_eq!(table.children(NodeId::ROOT).len(), 2);
}

#[test]
fn test_self_exclusion_of_output_files() {
    let temp = archive();
    let export = temp.path().join("A").join("refs.json");
    fs::write(&export, "[]").unwrap();

    let config = WalkConfig::builder()
        .root(temp.path())
        .excluded_paths(vec![export.clone()])
        .build()
        .unwrap();
    let outcome = TreeWalker::new(config).walk().unwrap();

    assert!(outcome.table.iter().all(|n| n.name != "refs.json"));
    assert_eq!(outcome.table.stats().total_files, 2);
}

#[test]
fn test_sidecars_and_meta_never_become_nodes() {
    let temp = archive();
    fs::write(temp.path().join("A/A.opex"), "<opex/>").unwrap();
    fs::create_dir(temp.path().join("meta")).unwrap();
    fs::write(temp.path().join("meta/log.txt"), "x").unwrap();

    let outcome = TreeWalker::new(WalkConfig::new(temp.path())).walk().unwrap();
    assert_eq!(outcome.table.len(), 5);
}

#[test]
fn test_sort_key_changes_indexes_only_where_kinds_interleave() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("a.txt"), "a").unwrap();
    fs::create_dir(temp.path().join("b")).unwrap();

    let folders_first = TreeWalker::new(WalkConfig::new(temp.path())).walk().unwrap();
    let mut config = WalkConfig::new(temp.path());
    config.sort_key = SortKey::Alphabetical;
    let alphabetical = TreeWalker::new(config).walk().unwrap();

    let index_of = |table: &opexgen_scan::NodeTable, name: &str| {
        table.iter().find(|n| n.name == name).map(|n| n.sibling_index)
    };
    assert_eq!(index_of(&folders_first.table, "b"), Some(1));
    assert_eq!(index_of(&folders_first.table, "a.txt"), Some(2));
    assert_eq!(index_of(&alphabetical.table, "a.txt"), Some(1));
    assert_eq!(index_of(&alphabetical.table, "b"), Some(2));
}

#[cfg(unix)]
#[test]
fn test_unreadable_directory_becomes_leaf() {
    use std::os::unix::fs::PermissionsExt;

    let temp = archive();
    let locked = temp.path().join("B");
    fs::write(locked.join("hidden-from-walk.txt"), "x").unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Permissions do not bind a privileged user.
    if fs::read_dir(&locked).is_ok() {
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let result = TreeWalker::new(WalkConfig::new(temp.path())).walk();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
    let outcome = result.unwrap();

    let b = outcome
        .table
        .iter()
        .find(|n| n.name == "B")
        .expect("locked directory is still a node");
    assert_eq!(b.kind, NodeKind::Directory);
    assert!(outcome.table.children(b.id).is_empty());
    assert!(
        outcome
            .table
            .iter()
            .all(|n| n.name != "hidden-from-walk.txt")
    );

    let read_errors: Vec<_> = outcome
        .warnings
        .iter()
        .filter(|w| w.kind == WarningKind::ReadError)
        .collect();
    assert_eq!(read_errors.len(), 1);
    assert_eq!(outcome.table.stats().total_files, 2);
}
