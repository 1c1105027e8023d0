//! Tree building (directories, symlinks, shortcuts, cycles) and dispatch order.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use treesum::tree::{
    Dispatcher, FileSink, FileVisitor, LnkResolver, ShortcutResolver, TreeBuilder, is_shortcut,
    parse_lnk_target,
};
use treesum::{BuildError, Directory, FileNode, RegularFile};

fn build(root: &Path) -> Result<FileNode, BuildError> {
    TreeBuilder::new().build(root)
}

fn file_paths(node: &FileNode) -> BTreeSet<String> {
    node.files().iter().map(|f| f.path().to_string()).collect()
}

fn as_dir(node: &FileNode) -> &Directory {
    match node {
        FileNode::Directory(d) => d,
        FileNode::File(f) => panic!("expected directory, got file {}", f.path()),
    }
}

fn child<'a>(dir: &'a Directory, path: &str) -> &'a FileNode {
    dir.children()
        .iter()
        .find(|c| c.path() == path)
        .unwrap_or_else(|| panic!("no child {path} in {}", dir.path()))
}

/// Sum of regular file sizes under `path`, without following links.
fn walkdir_size(path: &Path) -> u64 {
    walkdir::WalkDir::new(path)
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.metadata().unwrap().len())
        .sum()
}

// --- shell link fixtures ---

const HAS_LINK_TARGET_ID_LIST: u32 = 0x01;
const HAS_LINK_INFO: u32 = 0x02;

/// Minimal shell link: header, optional IDList, LinkInfo with local and/or network target.
fn shell_link(id_list: Option<&[u8]>, base: Option<&str>, network: Option<&str>, suffix: &str) -> Vec<u8> {
    let mut out = vec![0u8; 0x4C];
    out[0..4].copy_from_slice(&0x4Cu32.to_le_bytes());
    let mut flags = HAS_LINK_INFO;
    if let Some(ids) = id_list {
        flags |= HAS_LINK_TARGET_ID_LIST;
        out.extend((ids.len() as u16).to_le_bytes());
        out.extend_from_slice(ids);
    }
    out[0x14..0x18].copy_from_slice(&flags.to_le_bytes());

    let header_len = 0x1C;
    let mut info_flags = 0u32;
    let mut tail: Vec<u8> = Vec::new();
    let mut base_off = 0u32;
    let mut cnrl_off = 0u32;
    if let Some(b) = base {
        info_flags |= 0x01;
        base_off = (header_len + tail.len()) as u32;
        tail.extend_from_slice(b.as_bytes());
        tail.push(0);
    }
    if let Some(n) = network {
        info_flags |= 0x02;
        cnrl_off = (header_len + tail.len()) as u32;
        let mut cnrl = vec![0u8; 0x14];
        cnrl[8..12].copy_from_slice(&0x14u32.to_le_bytes());
        tail.extend(cnrl);
        tail.extend_from_slice(n.as_bytes());
        tail.push(0);
    }
    let suffix_off = (header_len + tail.len()) as u32;
    tail.extend_from_slice(suffix.as_bytes());
    tail.push(0);

    let total = (header_len + tail.len()) as u32;
    for v in [total, header_len as u32, info_flags, 0, base_off, cnrl_off, suffix_off] {
        out.extend(v.to_le_bytes());
    }
    out.extend(tail);
    out
}

// --- directory trees ---

#[test]
fn test_build_two_level_tree() {
    let tmp = tempfile::tempdir().unwrap();
    let d = tmp.path().join("D");
    fs::create_dir_all(d.join("E")).unwrap();
    fs::write(d.join("a.txt"), "abc").unwrap();
    fs::write(d.join("E/b.txt"), "").unwrap();

    let tree = build(&d).unwrap();
    assert!(tree.is_dir());
    assert_eq!(tree.path(), "D");
    assert_eq!(tree.size(), 3);
    assert_eq!(
        file_paths(&tree),
        BTreeSet::from(["D/a.txt".to_string(), "D/E/b.txt".to_string()])
    );

    let root = as_dir(&tree);
    assert_eq!(root.children().len(), 2);
    assert_eq!(child(root, "D/a.txt").size(), 3);
    let e = child(root, "D/E");
    assert!(e.is_dir());
    assert_eq!(e.size(), 0);

    let a = tree.files().into_iter().find(|f| f.path() == "D/a.txt").unwrap();
    assert_eq!(fs::read(a.location()).unwrap(), b"abc");
}

#[test]
fn test_directory_sizes_match_walkdir() {
    let tmp = tempfile::tempdir().unwrap();
    let d = tmp.path().join("data");
    for (rel, len) in [
        ("x.bin", 10usize),
        ("one/y.bin", 200),
        ("one/two/z.bin", 3000),
        ("one/two/w.bin", 1),
        ("three/v.bin", 0),
    ] {
        let p = d.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(&p, vec![7u8; len]).unwrap();
    }
    fs::create_dir_all(d.join("empty")).unwrap();

    let tree = build(&d).unwrap();
    assert_eq!(tree.size(), walkdir_size(&d));
    assert_eq!(tree.size(), 3211);

    fn check(node: &FileNode, base: &Path) {
        if let FileNode::Directory(dir) = node {
            assert_eq!(dir.size(), walkdir_size(&base.join(dir.path())), "{}", dir.path());
            let sum: u64 = dir.children().iter().map(FileNode::size).sum();
            assert_eq!(dir.size(), sum);
            for c in dir.children() {
                check(c, base);
            }
        }
    }
    check(&tree, tmp.path());
}

#[test]
fn test_build_empty_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let d = tmp.path().join("empty");
    fs::create_dir(&d).unwrap();
    let tree = build(&d).unwrap();
    assert_eq!(tree.size(), 0);
    assert!(as_dir(&tree).children().is_empty());
    assert!(tree.files().is_empty());
}

#[test]
fn test_build_single_file_root() {
    let tmp = tempfile::tempdir().unwrap();
    let f = tmp.path().join("only.txt");
    fs::write(&f, "hello").unwrap();
    match build(&f).unwrap() {
        FileNode::File(file) => {
            assert_eq!(file.path(), "only.txt");
            assert_eq!(file.size(), 5);
        }
        FileNode::Directory(_) => panic!("expected file"),
    }
}

#[test]
fn test_build_missing_root_is_io_error() {
    let tmp = tempfile::tempdir().unwrap();
    let err = build(&tmp.path().join("nope")).unwrap_err();
    assert!(!err.is_cycle());
    match err {
        BuildError::Io { source, .. } => assert_eq!(source.kind(), io::ErrorKind::NotFound),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_regular_file_equality_ignores_location() {
    let a = RegularFile::new("D/a.txt", 3, "/one/D/a.txt");
    let b = RegularFile::new("D/a.txt", 3, "/two/D/a.txt");
    assert_eq!(a, b);
    assert_ne!(a, RegularFile::new("D/a.txt", 4, "/one/D/a.txt"));
}

// --- symbolic links ---

#[cfg(unix)]
mod symlinks {
    use super::*;
    use std::os::unix::fs::symlink;

    #[test]
    fn test_symlink_to_file_reports_target() {
        let tmp = tempfile::tempdir().unwrap();
        let d = tmp.path().join("D");
        fs::create_dir(&d).unwrap();
        fs::write(d.join("real.txt"), "abcd").unwrap();
        symlink("real.txt", d.join("alias")).unwrap();

        let tree = build(&d).unwrap();
        assert_eq!(tree.size(), 8);
        let files = tree.files();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.path() == "D/real.txt" && f.size() == 4));
    }

    #[test]
    fn test_symlink_chain_resolves_to_final_file() {
        let tmp = tempfile::tempdir().unwrap();
        let d = tmp.path().join("D");
        fs::create_dir(&d).unwrap();
        let target = tmp.path().join("target.txt");
        fs::write(&target, "xyz").unwrap();
        symlink(&target, tmp.path().join("l3")).unwrap();
        symlink("../l3", d.join("l2")).unwrap();
        symlink("l2", d.join("l1")).unwrap();

        let tree = build(&d.join("l1")).unwrap();
        match tree {
            FileNode::File(f) => {
                // Relative to the root's parent (D), so the target sits one level up.
                assert_eq!(f.path(), "../target.txt");
                assert_eq!(f.size(), 3);
            }
            FileNode::Directory(_) => panic!("expected file"),
        }
    }

    #[test]
    fn test_parent_step_uses_real_directory_of_link() {
        // `up` is reached through `alias`, a link to `real/inner`; its `..` must land in `real`.
        let tmp = tempfile::tempdir().unwrap();
        let d = tmp.path().join("D");
        fs::create_dir_all(d.join("real/inner")).unwrap();
        fs::write(d.join("real/z.txt"), "xyz").unwrap();
        symlink("../z.txt", d.join("real/inner/up")).unwrap();
        symlink("real/inner", d.join("alias")).unwrap();
        symlink("alias/up", d.join("l")).unwrap();
        assert_eq!(fs::metadata(d.join("l")).unwrap().len(), 3);

        let tree = build(&d).unwrap();
        let files = tree.files();
        // real/z.txt, real/inner/up, alias/up and l all end at the same file.
        assert_eq!(files.len(), 4);
        assert!(files.iter().all(|f| f.path() == "D/real/z.txt" && f.size() == 3));
        assert_eq!(tree.size(), 12);

        match build(&d.join("l")).unwrap() {
            FileNode::File(f) => {
                assert_eq!(f.path(), "real/z.txt");
                assert_eq!(fs::read(f.location()).unwrap(), b"xyz");
            }
            FileNode::Directory(_) => panic!("expected file"),
        }
    }

    #[test]
    fn test_two_links_to_same_file_are_not_a_cycle() {
        let tmp = tempfile::tempdir().unwrap();
        let d = tmp.path().join("D");
        fs::create_dir(&d).unwrap();
        fs::write(tmp.path().join("shared.txt"), "12345").unwrap();
        symlink("../shared.txt", d.join("first")).unwrap();
        symlink("../shared.txt", d.join("second")).unwrap();

        let tree = build(&d).unwrap();
        assert_eq!(tree.size(), 10);
        assert!(tree.files().iter().all(|f| f.path() == "shared.txt"));
    }

    #[test]
    fn test_symlink_to_sibling_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let d = tmp.path().join("D");
        fs::create_dir_all(d.join("real")).unwrap();
        fs::write(d.join("real/f.txt"), "ab").unwrap();
        symlink("real", d.join("mirror")).unwrap();

        let tree = build(&d).unwrap();
        assert_eq!(tree.size(), 4);
        assert_eq!(file_paths(&tree), BTreeSet::from(["D/real/f.txt".to_string()]));
    }

    #[test]
    fn test_self_link_is_cycle() {
        let tmp = tempfile::tempdir().unwrap();
        let d = tmp.path().join("D");
        fs::create_dir(&d).unwrap();
        symlink("loop", d.join("loop")).unwrap();
        assert!(build(&d).unwrap_err().is_cycle());
    }

    #[test]
    fn test_mutual_links_are_cycle() {
        let tmp = tempfile::tempdir().unwrap();
        let d = tmp.path().join("D");
        fs::create_dir(&d).unwrap();
        symlink("b", d.join("a")).unwrap();
        symlink("a", d.join("b")).unwrap();
        let err = build(&d).unwrap_err();
        assert!(matches!(err, BuildError::CycleDetected { .. }));
    }

    #[test]
    fn test_link_to_ancestor_is_cycle() {
        let tmp = tempfile::tempdir().unwrap();
        let d = tmp.path().join("D");
        fs::create_dir_all(d.join("sub")).unwrap();
        fs::write(d.join("sub/f.txt"), "x").unwrap();
        symlink("..", d.join("sub/up")).unwrap();
        assert!(build(&d).unwrap_err().is_cycle());
    }

    #[test]
    fn test_dangling_link_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let d = tmp.path().join("D");
        fs::create_dir(&d).unwrap();
        symlink("missing.txt", d.join("broken")).unwrap();
        let err = build(&d).unwrap_err();
        assert!(matches!(err, BuildError::Io { .. }));
    }

    #[test]
    fn test_cycle_guard_released_after_subtree() {
        // The same directory reached twice in sequence (not nested) is fine.
        let tmp = tempfile::tempdir().unwrap();
        let d = tmp.path().join("D");
        fs::create_dir_all(tmp.path().join("lib")).unwrap();
        fs::write(tmp.path().join("lib/x"), "1").unwrap();
        fs::create_dir(&d).unwrap();
        symlink("../lib", d.join("one")).unwrap();
        symlink("../lib", d.join("two")).unwrap();
        let tree = build(&d).unwrap();
        assert_eq!(tree.size(), 2);
    }

    #[test]
    fn test_socket_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let d = tmp.path().join("D");
        fs::create_dir(&d).unwrap();
        fs::write(d.join("a.txt"), "abc").unwrap();
        let _listener = std::os::unix::net::UnixListener::bind(d.join("sock")).unwrap();
        let tree = build(&d).unwrap();
        assert_eq!(file_paths(&tree), BTreeSet::from(["D/a.txt".to_string()]));
        assert_eq!(as_dir(&tree).children().len(), 1);
    }
}

// --- shortcuts ---

#[test]
fn test_is_shortcut() {
    assert!(is_shortcut(Path::new("a/b/Report.LNK")));
    assert!(is_shortcut(Path::new("x.lnk")));
    assert!(!is_shortcut(Path::new("x.lnk.txt")));
    assert!(!is_shortcut(Path::new("lnk")));
}

#[test]
fn test_parse_lnk_local_target() {
    let bytes = shell_link(None, Some("C:\\docs\\report.txt"), None, "");
    assert_eq!(parse_lnk_target(&bytes).unwrap(), "C:\\docs\\report.txt");

    let split = shell_link(None, Some("C:\\docs\\"), None, "report.txt");
    assert_eq!(parse_lnk_target(&split).unwrap(), "C:\\docs\\report.txt");
}

#[test]
fn test_parse_lnk_skips_id_list() {
    let bytes = shell_link(Some(&[1, 2, 3, 4, 5, 6]), Some("C:\\t.txt"), None, "");
    assert_eq!(parse_lnk_target(&bytes).unwrap(), "C:\\t.txt");
}

#[test]
fn test_parse_lnk_network_target() {
    let bytes = shell_link(None, None, Some("\\\\server\\share"), "docs\\a.txt");
    assert_eq!(
        parse_lnk_target(&bytes).unwrap(),
        "\\\\server\\share\\docs\\a.txt"
    );
}

#[test]
fn test_parse_lnk_rejects_malformed() {
    assert_eq!(
        parse_lnk_target(b"nope").unwrap_err().kind(),
        io::ErrorKind::InvalidData
    );

    let full = shell_link(None, Some("C:\\t.txt"), None, "");
    let truncated = &full[..full.len() - 12];
    assert_eq!(
        parse_lnk_target(truncated).unwrap_err().kind(),
        io::ErrorKind::InvalidData
    );

    // Header only, LinkInfo flag cleared.
    let mut no_info = vec![0u8; 0x4C];
    no_info[0..4].copy_from_slice(&0x4Cu32.to_le_bytes());
    assert!(parse_lnk_target(&no_info).is_err());
}

#[test]
fn test_lnk_shortcut_followed_in_tree() {
    let tmp = tempfile::tempdir().unwrap();
    let d = tmp.path().join("D");
    fs::create_dir(&d).unwrap();
    fs::write(d.join("real.txt"), "abc").unwrap();
    let target = d.join("real.txt");
    fs::write(
        d.join("short.lnk"),
        shell_link(None, Some(target.to_str().unwrap()), None, ""),
    )
    .unwrap();

    let tree = build(&d).unwrap();
    assert_eq!(tree.size(), 6);
    assert!(tree.files().iter().all(|f| f.path() == "D/real.txt"));
}

#[test]
fn test_lnk_shortcut_to_ancestor_is_cycle() {
    let tmp = tempfile::tempdir().unwrap();
    let d = tmp.path().join("D");
    fs::create_dir_all(d.join("sub")).unwrap();
    fs::write(
        d.join("sub/up.lnk"),
        shell_link(None, Some(d.to_str().unwrap()), None, ""),
    )
    .unwrap();
    assert!(build(&d).unwrap_err().is_cycle());
}

#[test]
fn test_malformed_lnk_aborts_build() {
    let tmp = tempfile::tempdir().unwrap();
    let d = tmp.path().join("D");
    fs::create_dir(&d).unwrap();
    fs::write(d.join("bad.lnk"), b"garbage").unwrap();
    match build(&d).unwrap_err() {
        BuildError::Io { source, .. } => assert_eq!(source.kind(), io::ErrorKind::InvalidData),
        other => panic!("unexpected {other:?}"),
    }
}

struct FixedResolver(PathBuf);

impl ShortcutResolver for FixedResolver {
    fn resolve(&self, _shortcut: &Path) -> io::Result<PathBuf> {
        Ok(self.0.clone())
    }
}

#[test]
fn test_custom_shortcut_resolver() {
    let tmp = tempfile::tempdir().unwrap();
    let d = tmp.path().join("D");
    fs::create_dir_all(tmp.path().join("docs")).unwrap();
    fs::write(tmp.path().join("docs/x.txt"), "12").unwrap();
    fs::create_dir(&d).unwrap();
    fs::write(d.join("docs.LNK"), b"ignored by the resolver").unwrap();

    let builder = TreeBuilder::with_resolver(Box::new(FixedResolver(tmp.path().join("docs"))));
    let tree = builder.build(&d).unwrap();
    assert_eq!(tree.size(), 2);
    assert_eq!(file_paths(&tree), BTreeSet::from(["docs/x.txt".to_string()]));
}

#[test]
fn test_lnk_resolver_reads_file() {
    let tmp = tempfile::tempdir().unwrap();
    let p = tmp.path().join("a.lnk");
    fs::write(&p, shell_link(None, Some("/srv/data"), None, "")).unwrap();
    assert_eq!(LnkResolver.resolve(&p).unwrap(), PathBuf::from("/srv/data"));
}

// --- dispatch ---

#[derive(Default)]
struct RecordingSink {
    seen: RefCell<Vec<String>>,
}

impl FileSink for RecordingSink {
    fn add_to_process(&self, file: RegularFile) {
        self.seen.borrow_mut().push(file.path().to_string());
    }
}

fn sample_tree() -> FileNode {
    let mut sub = Directory::new("R/S");
    sub.add_child(RegularFile::new("R/S/b", 2, "/r/S/b").into());
    sub.add_child(RegularFile::new("R/S/c", 3, "/r/S/c").into());
    let mut root = Directory::new("R");
    root.add_child(RegularFile::new("R/a", 1, "/r/a").into());
    root.add_child(sub.into());
    root.add_child(Directory::new("R/empty").into());
    root.add_child(RegularFile::new("R/d", 4, "/r/d").into());
    root.into()
}

#[test]
fn test_directory_size_rolls_up() {
    let tree = sample_tree();
    assert_eq!(tree.size(), 10);
    assert_eq!(child(as_dir(&tree), "R/S").size(), 5);
    assert_eq!(child(as_dir(&tree), "R/empty").size(), 0);
}

#[test]
fn test_dispatcher_depth_first_order() {
    let sink = RecordingSink::default();
    let mut dispatcher = Dispatcher::new(&sink);
    dispatcher.visit(&sample_tree());
    assert_eq!(dispatcher.dispatched(), 4);
    assert_eq!(*sink.seen.borrow(), vec!["R/a", "R/S/b", "R/S/c", "R/d"]);
}

#[test]
fn test_dispatcher_single_file_and_empty_dir() {
    let sink = RecordingSink::default();
    let mut dispatcher = Dispatcher::new(&sink);
    dispatcher.visit(&Directory::new("E").into());
    assert_eq!(dispatcher.dispatched(), 0);
    dispatcher.visit(&RegularFile::new("f", 1, "/f").into());
    assert_eq!(dispatcher.dispatched(), 1);
    assert_eq!(*sink.seen.borrow(), vec!["f"]);
}

#[test]
fn test_custom_visitor_sees_directories() {
    struct Counter {
        dirs: usize,
        bytes: u64,
    }
    impl FileVisitor for Counter {
        fn visit_file(&mut self, file: &RegularFile) {
            self.bytes += file.size();
        }
        fn visit_directory(&mut self, dir: &Directory) {
            self.dirs += 1;
            for c in dir.children() {
                c.accept(self);
            }
        }
    }
    let mut counter = Counter { dirs: 0, bytes: 0 };
    sample_tree().accept(&mut counter);
    assert_eq!(counter.dirs, 3);
    assert_eq!(counter.bytes, 10);
}
