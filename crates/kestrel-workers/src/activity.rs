//! Outbound ActivityStreams documents.
//!
//! Activities are rebuilt from domain models each time they are sent.
//! `Undo`, `Accept` and `Reject` embed the complete activity they refer to.

use chrono::{DateTime, Utc};
use kestrel_types::{
    Account, Block, Follow, Move, Report, Status, StatusFave, Visibility, PUBLIC_COLLECTION,
};
use serde::{Deserialize, Serialize};

const ACTIVITYSTREAMS_CONTEXT: &str = "https://www.w3.org/ns/activitystreams";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityKind {
    Create,
    Update,
    Delete,
    Follow,
    Accept,
    Reject,
    Undo,
    Like,
    Announce,
    Block,
    Flag,
    Move,
}

impl ActivityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
            Self::Follow => "Follow",
            Self::Accept => "Accept",
            Self::Reject => "Reject",
            Self::Undo => "Undo",
            Self::Like => "Like",
            Self::Announce => "Announce",
            Self::Block => "Block",
            Self::Flag => "Flag",
            Self::Move => "Move",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub actor: String,
    pub object: ActivityObject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bto: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActivityObject {
    Iri(String),
    Iris(Vec<String>),
    Activity(Box<Activity>),
    Note(Box<Note>),
    Person(Box<Person>),
}

/// A status as a `Note`, or a `Question` when it carries a poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub attributed_to: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub one_of: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed: Option<DateTime<Utc>>,
    pub to: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<String>,
    pub published: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub preferred_username: String,
    pub inbox: String,
    pub outbox: String,
    pub followers: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub also_known_as: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moved_to: Option<String>,
}

impl Activity {
    pub fn new(
        kind: ActivityKind,
        id: impl Into<String>,
        actor: impl Into<String>,
        object: ActivityObject,
    ) -> Self {
        Self {
            context: Some(ACTIVITYSTREAMS_CONTEXT.to_string()),
            id: id.into(),
            kind,
            actor: actor.into(),
            object,
            target: None,
            to: Vec::new(),
            cc: Vec::new(),
            bto: Vec::new(),
            published: None,
        }
    }

    pub fn to(mut self, to: Vec<String>) -> Self {
        self.to = to;
        self
    }

    pub fn cc(mut self, cc: Vec<String>) -> Self {
        self.cc = cc;
        self
    }

    pub fn bto(mut self, bto: Vec<String>) -> Self {
        self.bto = bto;
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn published(mut self, at: DateTime<Utc>) -> Self {
        self.published = Some(at);
        self
    }

    /// Wraps this activity as the object of another, dropping the nested
    /// `@context`.
    pub fn embedded(mut self) -> ActivityObject {
        self.context = None;
        ActivityObject::Activity(Box::new(self))
    }
}

/// Audience of a status as `(to, cc)`.
pub fn status_addressing(status: &Status, author: &Account) -> (Vec<String>, Vec<String>) {
    let mentioned: Vec<String> = status
        .mentions
        .iter()
        .filter_map(|m| m.target_account.as_deref().map(|a| a.uri.clone()))
        .collect();

    let (mut to, mut cc) = match status.visibility {
        Visibility::Public => (
            vec![PUBLIC_COLLECTION.to_string()],
            vec![author.followers_uri.clone()],
        ),
        Visibility::Unlisted => (
            vec![author.followers_uri.clone()],
            vec![PUBLIC_COLLECTION.to_string()],
        ),
        Visibility::FollowersOnly | Visibility::MutualsOnly => {
            (vec![author.followers_uri.clone()], Vec::new())
        }
        Visibility::Direct => (Vec::new(), Vec::new()),
    };

    if status.visibility == Visibility::Direct {
        to.extend(mentioned);
    } else {
        cc.extend(mentioned);
    }
    if let Some(reply_to) = status.in_reply_to_account.as_deref() {
        if reply_to.id != author.id && !to.contains(&reply_to.uri) && !cc.contains(&reply_to.uri) {
            cc.push(reply_to.uri.clone());
        }
    }
    (to, cc)
}

pub fn note(status: &Status, author: &Account) -> Note {
    let (to, cc) = status_addressing(status, author);
    let (kind, one_of, closed) = match &status.poll {
        Some(poll) => ("Question", poll.options.clone(), poll.closed_at),
        None => ("Note", Vec::new(), None),
    };
    Note {
        id: status.uri.clone(),
        kind: kind.to_string(),
        attributed_to: author.uri.clone(),
        content: status.content.clone(),
        name: None,
        in_reply_to: status.in_reply_to_uri.clone(),
        one_of,
        closed,
        to,
        cc,
        published: status.created_at,
    }
}

pub fn person(account: &Account) -> Person {
    Person {
        id: account.uri.clone(),
        kind: "Person".to_string(),
        preferred_username: account.username.clone(),
        inbox: account.inbox_uri.clone(),
        outbox: account.outbox_uri.clone(),
        followers: account.followers_uri.clone(),
        also_known_as: account.also_known_as.clone(),
        moved_to: account.moved_to_uri.clone(),
    }
}

pub fn follow(follow: &Follow, follower: &Account, target: &Account) -> Activity {
    Activity::new(
        ActivityKind::Follow,
        follow.uri.clone(),
        follower.uri.clone(),
        ActivityObject::Iri(target.uri.clone()),
    )
    .to(vec![target.uri.clone()])
}

pub fn like(fave: &StatusFave, liker: &Account, status: &Status, author: &Account) -> Activity {
    Activity::new(
        ActivityKind::Like,
        fave.uri.clone(),
        liker.uri.clone(),
        ActivityObject::Iri(status.uri.clone()),
    )
    .to(vec![author.uri.clone()])
}

/// `Announce` of `boost.boost_of` by the booster.
pub fn announce(boost: &Status, booster: &Account, boosted: &Status, boosted_author: &Account) -> Activity {
    let mut cc = vec![boosted_author.uri.clone()];
    let to = match boost.visibility {
        Visibility::Public => vec![PUBLIC_COLLECTION.to_string()],
        Visibility::Unlisted => {
            cc.push(PUBLIC_COLLECTION.to_string());
            vec![booster.followers_uri.clone()]
        }
        _ => vec![booster.followers_uri.clone()],
    };
    if boost.visibility == Visibility::Public {
        cc.push(booster.followers_uri.clone());
    }
    Activity::new(
        ActivityKind::Announce,
        boost.uri.clone(),
        booster.uri.clone(),
        ActivityObject::Iri(boosted.uri.clone()),
    )
    .to(to)
    .cc(cc)
    .published(boost.created_at)
}

pub fn block(block: &Block, blocker: &Account, target: &Account) -> Activity {
    Activity::new(
        ActivityKind::Block,
        block.uri.clone(),
        blocker.uri.clone(),
        ActivityObject::Iri(target.uri.clone()),
    )
    .to(vec![target.uri.clone()])
}

/// `Flag` sent by the instance actor. The target is blind-copied so the
/// report itself is not addressed publicly.
pub fn flag(report: &Report, instance: &Account, target: &Account, status_uris: Vec<String>) -> Activity {
    let mut objects = vec![target.uri.clone()];
    objects.extend(status_uris);
    Activity::new(
        ActivityKind::Flag,
        report.uri.clone(),
        instance.uri.clone(),
        ActivityObject::Iris(objects),
    )
    .bto(vec![target.uri.clone()])
    .published(report.created_at)
}

pub fn move_account(mv: &Move, origin: &Account) -> Activity {
    Activity::new(
        ActivityKind::Move,
        mv.uri.clone(),
        origin.uri.clone(),
        ActivityObject::Iri(mv.origin_uri.clone()),
    )
    .target(mv.target_uri.clone())
    .to(vec![origin.followers_uri.clone()])
    .cc(vec![PUBLIC_COLLECTION.to_string()])
}

/// Wraps `inner` in an activity of `kind`, embedding it in full.
pub fn wrap(kind: ActivityKind, id: impl Into<String>, actor: &Account, inner: Activity, to: Vec<String>) -> Activity {
    Activity::new(kind, id, actor.uri.clone(), inner.embedded()).to(to)
}
