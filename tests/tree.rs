use logtree::{FsyncPolicy, Tree, TreeConfig};

fn config(page_size: u16) -> TreeConfig {
    TreeConfig { page_size, fsync_policy: FsyncPolicy::AfterEveryWrite, ..TreeConfig::default() }
}

#[test]
fn basic_round_trip_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("s1.db");

    {
        let mut tree = Tree::open(&path).unwrap();
        tree.set(b"hello", b"world").unwrap();
        assert_eq!(tree.get(b"hello").unwrap(), b"world");
        assert!(tree.get(b"absent").is_err());
        tree.close();
    }

    let mut tree = Tree::open(&path).unwrap();
    assert_eq!(tree.get(b"hello").unwrap(), b"world");
}

#[test]
fn small_page_size_forces_a_split() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("s2.db");
    let mut tree = Tree::open_with(&path, config(4)).unwrap();

    for k in [b"a", b"b", b"c", b"d", b"e"] {
        tree.set(k, k).unwrap();
    }
    for k in [b"a", b"b", b"c", b"d", b"e"] {
        assert_eq!(tree.get(k).unwrap(), k);
    }
}

#[test]
fn overwrite_replaces_value_and_range_sees_one_entry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("s3.db");
    let mut tree = Tree::open(&path).unwrap();

    tree.set(b"k", b"v1").unwrap();
    tree.set(b"k", b"v2").unwrap();
    assert_eq!(tree.get(b"k").unwrap(), b"v2");

    let mut seen = Vec::new();
    tree.get_range(None, None, |k, v| {
        seen.push((k.to_vec(), v));
        true
    })
    .unwrap();
    assert_eq!(seen, vec![(b"k".to_vec(), b"v2".to_vec())]);
}

#[test]
fn remove_collapses_single_child_internal_pages() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("s4.db");
    let mut tree = Tree::open_with(&path, config(4)).unwrap();

    let keys: Vec<Vec<u8>> = (0..64u32).map(|i| format!("key-{i:04}").into_bytes()).collect();
    for k in &keys {
        tree.set(k, k).unwrap();
    }
    // Remove most keys, leaving a sparse survivor set behind.
    for k in keys.iter().filter(|k| {
        let n: u32 = std::str::from_utf8(&k[4..]).unwrap().parse().unwrap();
        n % 16 != 0
    }) {
        tree.remove(k).unwrap();
    }

    let survivors: Vec<Vec<u8>> =
        keys.iter().filter(|k| (std::str::from_utf8(&k[4..]).unwrap().parse::<u32>().unwrap()) % 16 == 0).cloned().collect();

    let mut seen = Vec::new();
    tree.get_range(None, None, |k, _v| {
        seen.push(k.to_vec());
        true
    })
    .unwrap();
    assert_eq!(seen, survivors);
}

#[test]
fn crash_simulation_recovers_last_good_head() {
    let dir = tempfile::tempdir().unwrap();

    // Exercise every sub-stride tail length: the backward scan must find
    // the last good head regardless of how many bytes of torn garbage
    // follow it, not just lengths that happen to realign to a stride
    // boundary.
    for garbage_len in 0..40u64 {
        let path = dir.path().join(format!("s5-{garbage_len}.db"));

        {
            let mut tree = Tree::open(&path).unwrap();
            tree.set(b"a", b"1").unwrap();
            tree.close();
        }

        {
            use std::fs::OpenOptions;
            use std::io::Write;
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&vec![0xAAu8; garbage_len as usize]).unwrap();
        }

        let mut tree = Tree::open(&path).unwrap();
        assert_eq!(
            tree.get(b"a").unwrap(),
            b"1",
            "failed to recover head after appending {garbage_len} garbage bytes"
        );
    }
}

#[test]
fn compaction_shrinks_the_file_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("s6.db");
    let mut tree = Tree::open_with(&path, config(16)).unwrap();

    for i in 0..1000u32 {
        let k = format!("key-{i:05}").into_bytes();
        tree.set(&k, &k).unwrap();
    }
    for i in (0..1000u32).step_by(2) {
        let k = format!("key-{i:05}").into_bytes();
        tree.remove(&k).unwrap();
    }

    let before = std::fs::metadata(&path).unwrap().len();
    tree.compact().unwrap();
    let after_first = std::fs::metadata(&path).unwrap().len();
    assert!(after_first < before);

    let mut survivors = Vec::new();
    tree.get_range(None, None, |k, _v| {
        survivors.push(k.to_vec());
        true
    })
    .unwrap();
    assert_eq!(survivors.len(), 500);
    assert!(survivors.windows(2).all(|w| w[0] < w[1]));

    tree.compact().unwrap();
    let after_second = std::fs::metadata(&path).unwrap().len();
    assert!(after_second <= after_first);

    let mut survivors_again = Vec::new();
    tree.get_range(None, None, |k, _v| {
        survivors_again.push(k.to_vec());
        true
    })
    .unwrap();
    assert_eq!(survivors, survivors_again);
}

#[test]
fn update_inserts_and_modifies_but_never_deletes_on_none() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("update.db");
    let mut tree = Tree::open(&path).unwrap();

    tree.update(b"counter", |cur| match cur {
        None => Some(b"1".to_vec()),
        Some(v) => Some((std::str::from_utf8(v).unwrap().parse::<u32>().unwrap() + 1).to_string().into_bytes()),
    })
    .unwrap();
    assert_eq!(tree.get(b"counter").unwrap(), b"1");

    tree.update(b"counter", |cur| match cur {
        None => Some(b"1".to_vec()),
        Some(v) => Some((std::str::from_utf8(v).unwrap().parse::<u32>().unwrap() + 1).to_string().into_bytes()),
    })
    .unwrap();
    assert_eq!(tree.get(b"counter").unwrap(), b"2");

    // The no-change sentinel must leave the existing value untouched, not
    // delete it — deletion goes through `Tree::remove`, not `update`.
    tree.update(b"counter", |_| None).unwrap();
    assert_eq!(tree.get(b"counter").unwrap(), b"2");

    tree.remove(b"counter").unwrap();
    assert!(tree.get(b"counter").is_err());
}

#[test]
fn bulk_update_writes_a_single_head_block() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bulk.db");
    let mut tree = Tree::open(&path).unwrap();

    let keys: Vec<Vec<u8>> = (0..20u32).map(|i| format!("k{i}").into_bytes()).collect();
    tree.bulk_update(&keys, |k, _cur| Some(k.to_vec())).unwrap();

    for k in &keys {
        assert_eq!(tree.get(k).unwrap(), *k);
    }
}

#[test]
fn second_tree_on_same_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lock.db");
    let _first = Tree::open(&path).unwrap();
    assert!(Tree::open(&path).is_err());
}

#[test]
fn compact_refuses_to_clobber_a_stale_compact_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stale.db");
    let mut tree = Tree::open(&path).unwrap();
    tree.set(b"x", b"1").unwrap();

    std::fs::write(format!("{}.compact", path.display()), b"leftover").unwrap();
    assert!(tree.compact().is_err());
}
