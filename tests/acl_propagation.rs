//! ACL propagation tests
//!
//! Immediate application of episode and series ACLs across the archive,
//! the search index and the distribution channel.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use arcvault::acl::{AclScope, ConfiguredWorkflowRef};
use common::{acl_for, Harness, CHANNEL};

// =============================================================================
// Episode ACLs
// =============================================================================

#[test]
fn test_unknown_episode_returns_false_and_writes_nothing() {
    let h = Harness::new();

    let applied = h
        .service
        .apply_acl_to_episode("missing", Some(&acl_for("ROLE_A")), None)
        .unwrap();

    assert!(!applied);
    assert_eq!(h.writes(), 0);
    assert!(h.distribution.distributed().is_empty());
    assert_eq!(h.search.adds.load(Ordering::SeqCst), 0);
}

#[test]
fn test_set_episode_acl_reaches_every_service() {
    let h = Harness::new();
    h.ingest("E1", None);

    assert!(h
        .service
        .apply_acl_to_episode("E1", Some(&acl_for("ROLE_A")), None)
        .unwrap());

    // New archive version carrying the ACL
    let archived = h.archived("E1");
    assert_eq!(archived.version.unwrap().value(), 1);
    assert_eq!(h.service.active_episode_acl("E1").unwrap(), Some(acl_for("ROLE_A")));

    // Distributed and re-indexed with the distributed element in place
    assert_eq!(
        h.distribution.distributed(),
        vec![("E1".to_string(), "security-policy-episode".to_string())]
    );
    let published = h.search.get("E1").unwrap();
    let attachments = h.attachments.acl_attachments(&published, AclScope::Episode);
    assert_eq!(attachments.len(), 1);
    assert!(attachments[0].uri.starts_with(&format!("http://engage/{}/", CHANNEL)));
}

#[test]
fn test_reapplying_is_idempotent() {
    let h = Harness::new();
    h.ingest("E1", None);
    let acl = acl_for("ROLE_A");

    h.service.apply_acl_to_episode("E1", Some(&acl), None).unwrap();
    h.service.apply_acl_to_episode("E1", Some(&acl), None).unwrap();

    assert_eq!(h.episode_acl_counts("E1"), (1, 1));
    let distributed = h.distribution.distributed();
    assert_eq!(distributed.len(), 2);
    assert_eq!(distributed[0], distributed[1]);
    assert_eq!(h.service.active_episode_acl("E1").unwrap(), Some(acl));
}

#[test]
fn test_delete_episode_acl_retracts_attachment() {
    let h = Harness::new();
    h.ingest("E1", None);
    h.service
        .apply_acl_to_episode("E1", Some(&acl_for("ROLE_A")), None)
        .unwrap();

    assert!(h.service.apply_acl_to_episode("E1", None, None).unwrap());

    assert_eq!(h.episode_acl_counts("E1"), (0, 0));
    assert_eq!(
        h.distribution.retracted(),
        vec![("E1".to_string(), "security-policy-episode".to_string())]
    );
    assert_eq!(h.service.active_episode_acl("E1").unwrap(), None);
}

#[test]
fn test_episode_missing_from_search_still_updates_archive() {
    let h = Harness::new();
    h.ingest("E1", None);
    h.search.remove("E1");

    assert!(h
        .service
        .apply_acl_to_episode("E1", Some(&acl_for("ROLE_A")), None)
        .unwrap());
    assert_eq!(h.writes(), 1);
    assert_eq!(h.service.active_episode_acl("E1").unwrap(), Some(acl_for("ROLE_A")));
    assert!(h.distribution.distributed().is_empty());
    assert!(h.search.get("E1").is_none());
}

#[test]
fn test_workflow_started_and_its_failure_ignored() {
    let h = Harness::new();
    h.ingest("E1", None);
    let workflow = ConfiguredWorkflowRef::new("republish-metadata").with_parameter("force", "true");

    h.service
        .apply_acl_to_episode("E1", Some(&acl_for("ROLE_A")), Some(&workflow))
        .unwrap();
    assert_eq!(
        h.workflows.started.lock().unwrap().clone(),
        vec![("republish-metadata".to_string(), vec!["E1".to_string()])]
    );

    h.workflows.fail.store(true, Ordering::SeqCst);
    assert!(h
        .service
        .apply_acl_to_episode("E1", Some(&acl_for("ROLE_B")), Some(&workflow))
        .unwrap());
}

#[test]
fn test_episode_without_series_is_applied_exclusively() {
    let h = Harness::new();
    h.ingest("E1", None);

    // While the first application distributes, start a second one
    let service = Arc::downgrade(&h.service);
    let second = Arc::new(Mutex::new(None));
    let slot = second.clone();
    h.distribution.before_next_distribute(move || {
        let service = service.upgrade().unwrap();
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();
        let handle = thread::spawn(move || {
            let applied = service
                .apply_acl_to_episode("E1", Some(&acl_for("ROLE_B")), None)
                .unwrap();
            flag.store(true, Ordering::SeqCst);
            applied
        });
        thread::sleep(Duration::from_millis(50));
        *slot.lock().unwrap() = Some((handle, finished.load(Ordering::SeqCst)));
    });

    assert!(h
        .service
        .apply_acl_to_episode("E1", Some(&acl_for("ROLE_A")), None)
        .unwrap());
    let (handle, overlapped) = second.lock().unwrap().take().unwrap();
    assert!(!overlapped);
    assert!(handle.join().unwrap());

    assert_eq!(h.service.active_episode_acl("E1").unwrap(), Some(acl_for("ROLE_B")));
    assert_eq!(h.episode_acl_counts("E1"), (1, 1));
    assert_eq!(h.distribution.distributed().len(), 2);
}

// =============================================================================
// Series ACLs
// =============================================================================

#[test]
fn test_series_acl_without_override_keeps_episode_acls() {
    let h = Harness::new();
    h.series.create("S1");
    h.ingest("E1", Some("S1"));
    h.service
        .apply_acl_to_episode("E1", Some(&acl_for("ROLE_EPISODE")), None)
        .unwrap();

    assert!(h
        .service
        .apply_acl_to_series("S1", &acl_for("ROLE_SERIES"), false, None)
        .unwrap());

    assert_eq!(h.series.acl("S1"), Some(acl_for("ROLE_SERIES")));
    assert_eq!(h.episode_acl_counts("E1"), (1, 1));
}

#[test]
fn test_series_override_strips_member_episode_acls() {
    let h = Harness::new();
    h.series.create("S1");
    h.ingest("E1", Some("S1"));
    h.ingest("E2", Some("S1"));
    h.ingest("E3", Some("S2"));
    for id in ["E1", "E2", "E3"] {
        h.service
            .apply_acl_to_episode(id, Some(&acl_for("ROLE_EPISODE")), None)
            .unwrap();
    }

    let workflow = ConfiguredWorkflowRef::new("republish-metadata");
    assert!(h
        .service
        .apply_acl_to_series("S1", &acl_for("ROLE_SERIES"), true, Some(&workflow))
        .unwrap());

    assert_eq!(h.episode_acl_counts("E1"), (0, 0));
    assert_eq!(h.episode_acl_counts("E2"), (0, 0));
    assert_eq!(h.episode_acl_counts("E3"), (1, 1));
    assert_eq!(h.distribution.retracted().len(), 2);
    assert_eq!(h.series.acl("S1"), Some(acl_for("ROLE_SERIES")));

    let started = h.workflows.started.lock().unwrap().clone();
    let last = started.last().unwrap();
    assert_eq!(last.1, vec!["E1".to_string(), "E2".to_string()]);
}

#[test]
fn test_unknown_series_returns_false() {
    let h = Harness::new();

    assert!(!h
        .service
        .apply_acl_to_series("S404", &acl_for("ROLE_SERIES"), false, None)
        .unwrap());
    assert!(h.series.acl("S404").is_none());
}

#[test]
fn test_series_and_member_episode_applications_serialize() {
    let h = Harness::new();
    h.series.create("S1");
    h.ingest("E1", Some("S1"));

    let service = h.service.clone();
    let episode = thread::spawn(move || {
        for _ in 0..5 {
            service
                .apply_acl_to_episode("E1", Some(&acl_for("ROLE_EPISODE")), None)
                .unwrap();
        }
    });
    for _ in 0..5 {
        h.service
            .apply_acl_to_series("S1", &acl_for("ROLE_SERIES"), true, None)
            .unwrap();
    }
    episode.join().unwrap();

    // Archive and index never disagree once both callers are done
    let (archived, published) = h.episode_acl_counts("E1");
    assert_eq!(archived, published);
}
