use crate::store::{ByteStore, Container, Memory};
use rand::RngCore;
use tempfile::TempDir;

const STORE_LEN: u64 = 1 << 18;

fn scratch_container(dir: &TempDir) -> Container {
    Container::create(&dir.path().join("image.s64"), STORE_LEN).expect("create container")
}

#[test]
fn create_presizes_backing_file() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("image.s64");
    let store = Container::create(&path, STORE_LEN).expect("create container");
    assert_eq!(store.len(), STORE_LEN);
    let meta = std::fs::metadata(&path).expect("metadata");
    assert_eq!(meta.len(), STORE_LEN, "backing file must be pre-sized");
}

#[test]
fn fresh_container_reads_zeros() {
    let dir = TempDir::new().expect("tempdir");
    let store = scratch_container(&dir);

    let mut buf = vec![0xAAu8; 4096];
    let n = store.read_at(0, &mut buf);
    assert_eq!(n, 4096);
    assert!(
        buf.iter().all(|&b| b == 0),
        "fresh container space should read as zeros"
    );
}

#[test]
fn container_roundtrip_same_session() {
    let dir = TempDir::new().expect("tempdir");
    let mut store = scratch_container(&dir);

    let off = 8192 + 37;
    let mut data = vec![0u8; 4096];
    rand::rng().fill_bytes(&mut data);

    let wn = store.write_at(off, &data);
    assert_eq!(wn, data.len(), "must write full buffer");

    let mut back = vec![0u8; data.len()];
    let rn = store.read_at(off, &mut back);
    assert_eq!(rn, data.len(), "must read full buffer");
    assert_eq!(back, data, "roundtrip must match");
}

#[test]
fn container_reopen_sees_previous_writes() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("image.s64");
    let off = STORE_LEN / 2 + 11;

    {
        let mut store = Container::create(&path, STORE_LEN).expect("create");
        let wn = store.write_at(off, b"persisted-bytes!");
        assert_eq!(wn, 16);
        store.sync().expect("sync");
    }

    let store = Container::open(&path).expect("reopen");
    assert_eq!(store.len(), STORE_LEN, "open must use the on-disk length");
    let mut buf = vec![0u8; 16];
    let rn = store.read_at(off, &mut buf);
    assert_eq!(rn, 16);
    assert_eq!(&buf, b"persisted-bytes!");
}

#[test]
fn container_clamps_at_the_edge() {
    let dir = TempDir::new().expect("tempdir");
    let mut store = scratch_container(&dir);

    let data = vec![0x5Au8; 300];
    let wn = store.write_at(STORE_LEN - 100, &data);
    assert_eq!(wn, 100, "only the in-range prefix should be written");

    let mut buf = vec![0xCCu8; 300];
    let rn = store.read_at(STORE_LEN - 100, &mut buf);
    assert_eq!(rn, 100, "read must truncate at the edge");
    assert!(buf[..100].iter().all(|&b| b == 0x5A));
    assert!(
        buf[100..].iter().all(|&b| b == 0xCC),
        "untouched tail must remain"
    );

    let mut past = [0u8; 8];
    assert_eq!(store.read_at(STORE_LEN, &mut past), 0);
    assert_eq!(store.write_at(STORE_LEN + 1, &[1]), 0);
}

#[test]
fn memory_store_behaves_like_container() {
    let mut store = Memory::new(4096);
    assert_eq!(store.len(), 4096);
    assert!(!store.is_empty());

    let mut data = vec![0u8; 512];
    rand::rng().fill_bytes(&mut data);
    assert_eq!(store.write_at(1000, &data), 512);

    let mut back = vec![0u8; 512];
    assert_eq!(store.read_at(1000, &mut back), 512);
    assert_eq!(back, data);

    assert_eq!(store.write_at(4000, &[7u8; 200]), 96, "clamped at the edge");
    assert_eq!(store.read_at(5000, &mut back), 0);
}

#[test]
fn overlapping_writes_keep_latest_bytes() {
    let mut store = Memory::new(1024);
    store.write_at(100, b"AAAAAAAAAA");
    store.write_at(105, b"BBBBB");

    let mut buf = [0u8; 10];
    store.read_at(100, &mut buf);
    assert_eq!(&buf, b"AAAAABBBBB");
}
