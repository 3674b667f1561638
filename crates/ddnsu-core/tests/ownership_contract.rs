//! Contract Test: Record Ownership
//!
//! A record belongs to DDNSU iff its comment carries the `DDNSU_` prefix.
//!
//! Constraints verified:
//! - Untagged records are never updated or deleted, by reconcile or purge
//! - Matching is by tag, not by name: a rename is an update in place
//! - Records written by the engine carry `DDNSU_<comment>`
//!
//! If this test fails, the engine can destroy records it does not own.

mod common;

use common::*;

#[tokio::test]
async fn reconcile_never_touches_untagged_records() {
    let provider = MockDnsProvider::new();
    let manual = provider.seed("example.com", "www", None);
    let lookalike = provider.seed("example.com", "www", Some("home"));

    let (engine, _rx, _store) = simple_engine(
        &provider,
        HOME,
        test_config(&["example.com"], vec![a_record("www", "home")]),
    );
    engine.run_once().await.unwrap();

    assert_eq!(provider.update_count(), 0);
    assert_eq!(provider.create_count(), 1);

    let records = provider.records("example.com");
    for id in [&manual, &lookalike] {
        let untouched = records.iter().find(|r| &r.id == id).unwrap();
        assert_eq!(untouched.value, "203.0.113.99");
    }
}

#[tokio::test]
async fn purge_deletes_only_tagged_records() {
    let provider = MockDnsProvider::new();
    let manual = provider.seed("example.com", "www", None);
    let foreign = provider.seed("example.com", "mail", Some("managed by hand"));
    provider.seed("example.com", "vpn", Some("DDNSU_vpn"));
    provider.seed("example.com", "@", Some("DDNSU_apex"));

    let (engine, _rx, _store) = simple_engine(
        &provider,
        HOME,
        test_config(&["example.com"], vec![a_record("www", "home")]),
    );
    let report = engine.purge_all().await.unwrap();

    assert!(report.is_clean());
    assert_eq!(report.domains[0].deleted.len(), 2);
    assert_eq!(provider.delete_count(), 2);

    let left: Vec<String> = provider
        .records("example.com")
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(left, vec![manual, foreign]);
}

#[tokio::test]
async fn rename_with_same_comment_updates_in_place() {
    let provider = MockDnsProvider::new();
    let owned = provider.seed("example.com", "old-name", Some("DDNSU_home"));

    let (engine, _rx, _store) = simple_engine(
        &provider,
        HOME,
        test_config(&["example.com"], vec![a_record("new-name", "home")]),
    );
    let report = engine.run_once().await.unwrap();

    assert_eq!(report.reconcile.domains[0].updated, vec!["home".to_string()]);
    assert_eq!(provider.create_count(), 0);
    assert_eq!(provider.delete_count(), 0);

    let tagged = provider.tagged("example.com");
    assert_eq!(tagged.len(), 1);
    assert_eq!(tagged[0].id, owned);
    assert_eq!(tagged[0].name, "new-name");
    assert_eq!(tagged[0].value, HOME.to_string());
}

#[tokio::test]
async fn created_records_carry_the_ownership_tag() {
    let provider = MockDnsProvider::new();
    let (engine, _rx, _store) = simple_engine(
        &provider,
        HOME,
        test_config(&["example.com"], vec![a_record("*", "apex"), a_record("vpn", "vpn")]),
    );
    engine.run_once().await.unwrap();

    let mut comments: Vec<String> = provider
        .tagged("example.com")
        .into_iter()
        .filter_map(|r| r.comment)
        .collect();
    comments.sort();
    assert_eq!(comments, vec!["DDNSU_apex", "DDNSU_vpn"]);
}
