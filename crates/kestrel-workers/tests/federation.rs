mod common;

use chrono::Utc;
use common::{follow, local_account, remote_account, status, Harness, HOST};
use kestrel_types::{Account, Block, Report, StatusFave};
use kestrel_workers::{ActivityKind, ActivityObject};

fn report(reporter: &Account, target: &Account, forwarded: bool) -> Report {
    Report {
        id: "rep1".to_string(),
        uri: format!("https://{HOST}/reports/rep1"),
        account_id: reporter.id.clone(),
        target_account_id: target.id.clone(),
        status_ids: vec!["s1".to_string()],
        comment: "spam".to_string(),
        forwarded,
        created_at: Utc::now(),
        account: None,
        target_account: None,
    }
}

fn fave(liker: &Account, author: &Account) -> StatusFave {
    StatusFave {
        id: "fave1".to_string(),
        uri: format!("{}/likes/1", liker.uri),
        account_id: liker.id.clone(),
        target_account_id: author.id.clone(),
        status_id: "s1".to_string(),
        created_at: Utc::now(),
        account: None,
        target_account: None,
        status: None,
    }
}

#[tokio::test]
async fn report_not_marked_for_forwarding_stays_local() {
    let h = Harness::new();
    let reporter = local_account("reporter");
    let spammer = remote_account("spammer", "remote.example");
    h.put_account(&local_account(HOST));
    h.put_account(&reporter);
    h.put_account(&spammer);
    h.put_status(&status("s1", &spammer));

    h.processor
        .federate()
        .flag(&report(&reporter, &spammer, false))
        .await
        .expect("flag should succeed");

    assert!(h.actor.sent().is_empty());
}

#[tokio::test]
async fn forwarded_report_is_sent_by_the_instance_actor() {
    let h = Harness::new();
    let instance = local_account(HOST);
    let reporter = local_account("reporter");
    let spammer = remote_account("spammer", "remote.example");
    for account in [&instance, &reporter, &spammer] {
        h.put_account(account);
    }
    let post = status("s1", &spammer);
    h.put_status(&post);

    h.processor
        .federate()
        .flag(&report(&reporter, &spammer, true))
        .await
        .expect("flag should succeed");

    let sent = h.actor.sent();
    assert_eq!(sent.len(), 1);
    let (outbox, flag) = &sent[0];
    assert_eq!(outbox.as_str(), instance.outbox_uri);
    assert_eq!(flag.kind, ActivityKind::Flag);
    assert_eq!(flag.actor, instance.uri);
    assert_eq!(flag.bto, vec![spammer.uri.clone()]);
    assert!(flag.to.is_empty());
    assert!(flag.cc.is_empty());
    assert_eq!(
        flag.object,
        ActivityObject::Iris(vec![spammer.uri.clone(), post.uri.clone()])
    );
    assert!(!serialized_contains(flag, &reporter.uri));
}

fn serialized_contains(activity: &kestrel_workers::Activity, needle: &str) -> bool {
    serde_json::to_string(activity)
        .expect("activity should serialize")
        .contains(needle)
}

#[tokio::test]
async fn interactions_between_local_accounts_are_not_federated() {
    let h = Harness::new();
    let alice = local_account("alice");
    let bob = local_account("bob");
    h.put_account(&alice);
    h.put_account(&bob);
    h.put_status(&status("s1", &bob));

    let federate = h.processor.federate();
    federate
        .like(&fave(&alice, &bob))
        .await
        .expect("like should succeed");
    federate
        .follow(&follow("f1", &alice, &bob))
        .await
        .expect("follow should succeed");
    federate
        .block(&Block {
            id: "block1".to_string(),
            uri: format!("{}/blocks/1", alice.uri),
            account_id: alice.id.clone(),
            target_account_id: bob.id.clone(),
            created_at: Utc::now(),
            account: None,
            target_account: None,
        })
        .await
        .expect("block should succeed");

    assert!(h.actor.sent().is_empty());
}

#[tokio::test]
async fn undo_like_embeds_the_whole_like() {
    let h = Harness::new();
    let liker = local_account("liker");
    let author = remote_account("author", "remote.example");
    h.put_account(&liker);
    h.put_account(&author);
    let post = status("s1", &author);
    h.put_status(&post);

    let fave = fave(&liker, &author);
    h.processor
        .federate()
        .undo_like(&fave)
        .await
        .expect("undo like should succeed");

    let sent = h.actor.sent();
    assert_eq!(sent.len(), 1);
    let (outbox, undo) = &sent[0];
    assert_eq!(outbox.as_str(), liker.outbox_uri);
    assert_eq!(undo.kind, ActivityKind::Undo);

    let ActivityObject::Activity(like) = &undo.object else {
        panic!("undo should embed the like, got {:?}", undo.object);
    };
    assert_eq!(like.kind, ActivityKind::Like);
    assert_eq!(like.id, fave.uri);
    assert_eq!(like.actor, liker.uri);
    assert_eq!(like.object, ActivityObject::Iri(post.uri.clone()));
}
