mod common;

use chrono::Utc;
use common::{follow, local_account, remote_account, status, Harness};
use kestrel_db::{follows, notifications};
use kestrel_types::{
    ActivityVerb, ClientMessage, FediMessage, FollowRequest, Mention, Notification,
    NotificationType, ObjectType, Payload, StatusFave, Visibility,
};
use kestrel_workers::StreamEvent;

fn follow_request(id: &str, from: &kestrel_types::Account, to: &kestrel_types::Account) -> FollowRequest {
    FollowRequest {
        id: id.to_string(),
        uri: format!("{}/follow/{id}", from.uri),
        account_id: from.id.clone(),
        target_account_id: to.id.clone(),
        show_reblogs: true,
        notify: false,
        created_at: Utc::now(),
        account: None,
        target_account: None,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_notify_persists_and_streams_once() {
    let h = Harness::new();
    let author = local_account("author");
    let fan = remote_account("fan", "remote.example");
    h.put_account(&author);
    h.put_account(&fan);
    h.put_status(&status("s1", &author));

    let mut rx = h.hub.subscribe("author");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let processor = h.processor.clone();
        let author = author.clone();
        handles.push(tokio::spawn(async move {
            processor
                .surface()
                .notify(NotificationType::Favourite, &author, "fan", "s1")
                .await
        }));
    }
    for handle in handles {
        handle
            .await
            .expect("task should not panic")
            .expect("notify should succeed");
    }

    let stored = h.notifications("author");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].notification_type, NotificationType::Favourite);

    let mut streamed = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, StreamEvent::Notification(_)) {
            streamed += 1;
        }
    }
    assert_eq!(streamed, 1);
}

#[tokio::test]
async fn remote_targets_are_never_notified() {
    let h = Harness::new();
    let local = local_account("local");
    let remote = remote_account("far", "remote.example");
    h.put_account(&local);
    h.put_account(&remote);

    h.processor
        .surface()
        .notify(NotificationType::Follow, &remote, "local", "")
        .await
        .expect("notify should succeed");

    assert!(h.notifications("far").is_empty());
}

#[tokio::test]
async fn follow_of_unlocked_local_account_is_accepted() {
    let h = Harness::new();
    let follower = local_account("follower");
    let target = local_account("target");
    h.put_account(&follower);
    h.put_account(&target);

    let request = follow_request("fr1", &follower, &target);
    {
        let conn = h.pool.get().expect("should get connection");
        follows::put_follow_request(&conn, &request).expect("request insert should succeed");
        notifications::put_notification(
            &conn,
            &Notification {
                id: "n-request".to_string(),
                notification_type: NotificationType::FollowRequest,
                target_account_id: "target".to_string(),
                origin_account_id: "follower".to_string(),
                status_id: String::new(),
                read: false,
                created_at: Utc::now(),
            },
        )
        .expect("notification insert should succeed");
    }

    let msg = ClientMessage::new(
        ActivityVerb::Create,
        ObjectType::Follow,
        Payload::FollowRequest(request),
        follower.clone(),
    )
    .with_target(target.clone());
    h.processor
        .process_from_client(msg)
        .await
        .expect("follow should be processed");

    let conn = h.pool.get().expect("should get connection");
    assert!(follows::is_following(&conn, "follower", "target").expect("query should succeed"));
    assert!(follows::get_follow_request(&conn, "follower", "target")
        .expect("query should succeed")
        .is_none());

    let stored = h.notifications("target");
    assert_eq!(stored.len(), 1, "request notification should be replaced");
    assert_eq!(stored[0].notification_type, NotificationType::Follow);
    assert_eq!(stored[0].origin_account_id, "follower");
    assert!(h.actor.sent().is_empty(), "local follows are not federated");
}

#[tokio::test]
async fn follow_of_locked_account_waits_for_approval() {
    let h = Harness::new();
    let follower = local_account("follower");
    let mut target = local_account("target");
    target.locked = true;
    h.put_account(&follower);
    h.put_account(&target);

    let request = follow_request("fr1", &follower, &target);
    {
        let conn = h.pool.get().expect("should get connection");
        follows::put_follow_request(&conn, &request).expect("request insert should succeed");
    }

    let msg = ClientMessage::new(
        ActivityVerb::Create,
        ObjectType::Follow,
        Payload::FollowRequest(request),
        follower,
    );
    h.processor
        .process_from_client(msg)
        .await
        .expect("follow should be processed");

    let conn = h.pool.get().expect("should get connection");
    assert!(!follows::is_following(&conn, "follower", "target").expect("query should succeed"));
    let stored = h.notifications("target");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].notification_type, NotificationType::FollowRequest);
}

#[tokio::test]
async fn mentions_skip_author_and_muted_threads() {
    let h = Harness::new();
    let author = local_account("author");
    let listener = local_account("listener");
    let muter = local_account("muter");
    for account in [&author, &listener, &muter] {
        h.put_account(account);
    }

    let mut post = status("s1", &author);
    post.visibility = Visibility::Unlisted;
    post.mentions = [&author, &listener, &muter]
        .into_iter()
        .map(|target| Mention {
            id: format!("m-{}", target.id),
            status_id: "s1".to_string(),
            origin_account_id: author.id.clone(),
            target_account_id: target.id.clone(),
            target_account: None,
        })
        .collect();
    h.put_status(&post);
    {
        let conn = h.pool.get().expect("should get connection");
        kestrel_db::statuses::mute_thread(&conn, &post.thread_id, "muter")
            .expect("thread mute should succeed");
    }

    h.processor
        .surface()
        .timeline_and_notify(&post)
        .await
        .expect("fan-out should succeed");

    let heard = h.notifications("listener");
    assert_eq!(heard.len(), 1);
    assert_eq!(heard[0].notification_type, NotificationType::Mention);
    assert!(h.notifications("author").is_empty());
    assert!(h.notifications("muter").is_empty());
}

#[tokio::test]
async fn remote_fave_notifies_local_author() {
    let h = Harness::new();
    let author = local_account("author");
    let fan = remote_account("fan", "remote.example");
    h.put_account(&author);
    h.put_account(&fan);
    h.put_status(&status("s1", &author));

    let fave = StatusFave {
        id: "fave1".to_string(),
        uri: format!("{}/likes/1", fan.uri),
        account_id: fan.id.clone(),
        target_account_id: author.id.clone(),
        status_id: "s1".to_string(),
        created_at: Utc::now(),
        account: None,
        target_account: None,
        status: None,
    };
    let msg = FediMessage::new(
        ActivityVerb::Create,
        ObjectType::Like,
        Payload::StatusFave(fave.clone()),
        fan.clone(),
        author.clone(),
    );
    h.processor
        .process_from_fedi(msg.clone())
        .await
        .expect("like should be processed");
    h.processor
        .process_from_fedi(msg)
        .await
        .expect("redelivered like should be processed");

    let stored = h.notifications("author");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].notification_type, NotificationType::Favourite);
    assert_eq!(stored[0].status_id, "s1");
}

#[tokio::test]
async fn follow_notification_subscribers_hear_new_posts() {
    let h = Harness::new();
    let author = local_account("author");
    let reader = local_account("reader");
    h.put_account(&author);
    h.put_account(&reader);

    let mut subscription = follow("f1", &reader, &author);
    subscription.notify = true;
    h.put_follow(&subscription);

    let mut reply = status("r1", &author);
    reply.in_reply_to_uri = Some("https://remote.example/statuses/9".to_string());
    h.put_status(&reply);
    h.processor
        .surface()
        .timeline_and_notify(&reply)
        .await
        .expect("fan-out should succeed");
    assert!(h.notifications("reader").is_empty(), "replies do not notify subscribers");

    let post = status("s1", &author);
    h.put_status(&post);
    h.processor
        .surface()
        .timeline_and_notify(&post)
        .await
        .expect("fan-out should succeed");

    let stored = h.notifications("reader");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].notification_type, NotificationType::Status);
}
