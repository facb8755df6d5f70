//! Shared domain models and message envelopes for kestrel.
//!
//! This crate provides the types that flow through the event-processing
//! pipeline: accounts, statuses, the relationships between them, the
//! persisted side-effect records (notifications, moves, conversations), and
//! the two envelope shapes consumed by the worker pools.
//!
//! Models are plain data. Relationship fields such as [`Status::account`]
//! are `None` until a store populates them; handlers never assume a model
//! arrives populated.
//!
//! No crate in the workspace depends on anything *except* `kestrel-types`
//! for cross-cutting type definitions.

mod account;
mod envelope;
mod moves;
mod notification;
mod relation;
mod status;

pub use account::Account;
pub use envelope::{
    ActivityVerb, ClientMessage, FediMessage, ObjectType, ParseActivityVerbError,
    ParseObjectTypeError, Payload,
};
pub use moves::Move;
pub use notification::{
    Conversation, Filter, FilterAction, Notification, NotificationType,
    ParseNotificationTypeError,
};
pub use relation::{
    Block, Follow, FollowRequest, List, ParseRepliesPolicyError, RepliesPolicy, Report,
    StatusFave,
};
pub use status::{Mention, ParseVisibilityError, Poll, PollVote, Status, Tag, Visibility};

/// The ActivityStreams public collection IRI.
pub const PUBLIC_COLLECTION: &str = "https://www.w3.org/ns/activitystreams#Public";

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn account(domain: Option<&str>) -> Account {
        Account {
            id: "acct-1".to_string(),
            uri: "https://example.org/users/one".to_string(),
            username: "one".to_string(),
            domain: domain.map(str::to_string),
            inbox_uri: "https://example.org/users/one/inbox".to_string(),
            outbox_uri: "https://example.org/users/one/outbox".to_string(),
            followers_uri: "https://example.org/users/one/followers".to_string(),
            locked: false,
            admin: false,
            also_known_as: vec!["https://old.example/users/one".to_string()],
            moved_to_uri: None,
            move_id: None,
            suspended_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn verb_and_object_type_parse() {
        for verb in [
            ActivityVerb::Create,
            ActivityVerb::Update,
            ActivityVerb::Delete,
            ActivityVerb::Accept,
            ActivityVerb::Reject,
            ActivityVerb::Undo,
            ActivityVerb::Flag,
            ActivityVerb::Move,
        ] {
            assert_eq!(verb.as_str().parse::<ActivityVerb>().ok(), Some(verb));
        }
        assert_eq!("Person".parse::<ObjectType>().ok(), Some(ObjectType::Profile));
        assert!("Tombstone".parse::<ObjectType>().is_err());
    }

    #[test]
    fn notification_type_labels() {
        assert_eq!(NotificationType::AdminReport.as_str(), "admin.report");
        assert_eq!(
            "follow_request".parse::<NotificationType>().ok(),
            Some(NotificationType::FollowRequest)
        );
        assert!("boost".parse::<NotificationType>().is_err());
    }

    #[test]
    fn account_locality_and_aliases() {
        let local = account(None);
        assert!(local.is_local());
        assert!(!local.is_remote());
        assert!(local.is_aliased_to("https://old.example/users/one"));
        assert!(!local.is_aliased_to("https://elsewhere.example/users/one"));

        let remote = account(Some("example.org"));
        assert!(remote.is_remote());
    }

    #[test]
    fn fedi_message_target_uri_falls_back_to_iri() {
        let msg = FediMessage::from_iri(
            ActivityVerb::Create,
            ObjectType::Note,
            "https://example.org/statuses/1",
            account(Some("example.org")),
            account(None),
        );
        assert_eq!(msg.target_uri(), Some("https://example.org/statuses/1"));
        assert!(msg.involves_account("acct-1"));
    }

    #[test]
    fn filter_matching_is_case_insensitive() {
        let filter = Filter {
            id: "f1".to_string(),
            account_id: "acct-1".to_string(),
            phrase: "Spoiler".to_string(),
            action: FilterAction::Hide,
        };
        assert!(filter.matches("big SPOILER ahead"));
        assert!(!filter.matches("nothing to see"));
    }
}
