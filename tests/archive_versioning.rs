//! Archive versioning tests
//!
//! Version claims, element storage and versioned writes working together
//! against a real directory tree.

use std::collections::BTreeSet;
use std::fs;
use std::io::Read;
use std::sync::Arc;
use std::thread;

use arcvault::archive::{
    Archive, DeletionSelector, DirectoryWorkspace, Element, ElementKind, ElementStore,
    FileClaimStore, FileSystemElementStore, MediaPackage, Source, StoragePath, Version,
    VersionAllocator, VersionedArchive,
};
use tempfile::TempDir;

const ORG: &str = "o1";

struct Fixture {
    temp: TempDir,
    store: Arc<FileSystemElementStore>,
    allocator: VersionAllocator,
}

fn fixture() -> Fixture {
    let temp = TempDir::new().unwrap();
    let workspace = Arc::new(DirectoryWorkspace::new(temp.path().join("workspace")));
    let store = Arc::new(FileSystemElementStore::open(temp.path().join("archive"), workspace).unwrap());
    let claims = Arc::new(FileClaimStore::open(temp.path().join("state/claims.json")).unwrap());
    Fixture {
        temp,
        store,
        allocator: VersionAllocator::new(claims),
    }
}

fn stage(fx: &Fixture, name: &str, bytes: &[u8]) -> String {
    let dir = fx.temp.path().join("workspace/inbox");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(name), bytes).unwrap();
    format!("inbox/{}", name)
}

fn read(store: &dyn ElementStore, path: &StoragePath) -> Vec<u8> {
    let mut buf = Vec::new();
    store
        .get(path)
        .unwrap()
        .expect("element stored")
        .read_to_end(&mut buf)
        .unwrap();
    buf
}

#[test]
fn test_claim_put_get_round_trip() {
    let fx = fixture();

    assert_eq!(fx.allocator.claim_next("U1").unwrap(), Version::new(0));
    let version = fx.allocator.claim_next("U1").unwrap();
    assert_eq!(version, Version::new(1));

    let payload: Vec<u8> = (0..=255u8).cycle().take(64 * 1024).collect();
    let uri = stage(&fx, "slides.pdf", &payload);
    let path = StoragePath::new(ORG, "U1", version, "slides");
    fx.store.put(&path, &Source::new(uri)).unwrap();

    assert!(fx.store.contains(&path).unwrap());
    assert_eq!(read(fx.store.as_ref(), &path), payload);
    assert!(fx
        .temp
        .path()
        .join("archive/o1/U1/1/slides.pdf")
        .is_file());
}

#[test]
fn test_claims_survive_reopen() {
    let fx = fixture();
    fx.allocator.claim_next("U1").unwrap();
    fx.allocator.claim_next("U1").unwrap();

    let reopened = VersionAllocator::new(Arc::new(
        FileClaimStore::open(fx.temp.path().join("state/claims.json")).unwrap(),
    ));
    assert_eq!(reopened.last_claimed("U1").unwrap(), Some(Version::new(1)));
    assert_eq!(reopened.claim_next("U1").unwrap(), Version::new(2));
    assert_eq!(reopened.last_claimed("U2").unwrap(), None);
}

#[test]
fn test_copy_then_delete_unit() {
    let fx = fixture();
    let v0 = fx.allocator.claim_next("U1").unwrap();
    let v1 = fx.allocator.claim_next("U1").unwrap();
    let first = StoragePath::new(ORG, "U1", v0, "track");
    let second = StoragePath::new(ORG, "U1", v1, "track");

    fx.store
        .put(&first, &Source::new(stage(&fx, "t.mp4", b"frames")))
        .unwrap();
    assert!(fx.store.copy(&first, &second).unwrap());
    assert_eq!(read(fx.store.as_ref(), &second), b"frames");

    assert!(fx.store.delete(&DeletionSelector::all(ORG, "U1")).unwrap());
    assert!(!fx.store.contains(&first).unwrap());
    assert!(!fx.store.contains(&second).unwrap());
    assert!(!fx.store.delete(&DeletionSelector::all(ORG, "U1")).unwrap());
}

#[test]
fn test_concurrent_writes_get_distinct_consecutive_versions() {
    const WRITERS: u64 = 8;
    let fx = fixture();
    let archive = Arc::new(VersionedArchive::new(
        ORG,
        fx.store.clone(),
        fx.allocator.clone(),
        fx.temp.path().join("state/manifests"),
    ));

    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            let uri = stage(&fx, &format!("take-{}.mp4", i), format!("take {}", i).as_bytes());
            let archive = archive.clone();
            thread::spawn(move || {
                let mp = MediaPackage::new("E1").with_element(Element::new(
                    "track",
                    ElementKind::Track,
                    "presenter/source",
                    uri,
                ));
                archive.write(&mp).unwrap().version.unwrap().value()
            })
        })
        .collect();

    let versions: BTreeSet<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(versions, (0..WRITERS).collect::<BTreeSet<_>>());

    let history = archive.versions("E1").unwrap();
    assert_eq!(history.len() as u64, WRITERS);
    let latest = archive.find_latest("E1").unwrap().unwrap();
    assert_eq!(latest.version, Some(Version::new(WRITERS - 1)));

    // Every version's payload is intact
    for mp in &history {
        let version = mp.version.unwrap();
        let path = StoragePath::new(ORG, "E1", version, "track");
        let bytes = read(fx.store.as_ref(), &path);
        assert!(String::from_utf8(bytes).unwrap().starts_with("take "));
    }
}

#[test]
fn test_archive_delete_removes_every_version() {
    let fx = fixture();
    let archive = VersionedArchive::new(
        ORG,
        fx.store.clone(),
        fx.allocator.clone(),
        fx.temp.path().join("state/manifests"),
    );
    let uri = stage(&fx, "a.mp4", b"video");
    let mp = MediaPackage::new("E1")
        .with_series("S1")
        .with_element(Element::new("a", ElementKind::Track, "presenter/source", uri));
    let first = archive.write(&mp).unwrap();
    archive.write(&first).unwrap();

    assert!(archive.delete("E1").unwrap());
    assert!(archive.find_latest("E1").unwrap().is_none());
    assert!(archive.find_latest_by_series("S1").unwrap().is_empty());
    assert!(!fx
        .store
        .contains(&StoragePath::new(ORG, "E1", Version::new(0), "a"))
        .unwrap());

    // Claims are never reused
    let again = archive.write(&mp).unwrap();
    assert_eq!(again.version, Some(Version::new(2)));
}
