//! Message envelopes handed to the worker pools.
//!
//! An envelope names an activity verb, the type of object acted upon, and
//! carries the domain model for that object as a [`Payload`]. Client
//! envelopes come from local API handlers and always carry a payload.
//! Federation envelopes come from the inbox and may instead carry a
//! dereferenceable IRI when the object was not materialized eagerly.

use serde::{Deserialize, Serialize};

use crate::{
    Account, Block, Follow, FollowRequest, Move, PollVote, Report, Status, StatusFave,
};

/// ActivityStreams activity verbs understood by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityVerb {
    Create,
    Update,
    Delete,
    Accept,
    Reject,
    Undo,
    Flag,
    Move,
}

impl ActivityVerb {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
            Self::Accept => "Accept",
            Self::Reject => "Reject",
            Self::Undo => "Undo",
            Self::Flag => "Flag",
            Self::Move => "Move",
        }
    }
}

impl std::fmt::Display for ActivityVerb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActivityVerb {
    type Err = ParseActivityVerbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Create" => Ok(Self::Create),
            "Update" => Ok(Self::Update),
            "Delete" => Ok(Self::Delete),
            "Accept" => Ok(Self::Accept),
            "Reject" => Ok(Self::Reject),
            "Undo" => Ok(Self::Undo),
            "Flag" => Ok(Self::Flag),
            "Move" => Ok(Self::Move),
            _ => Err(ParseActivityVerbError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown activity verb.
#[derive(Debug, Clone)]
pub struct ParseActivityVerbError(pub String);

impl std::fmt::Display for ParseActivityVerbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown activity verb: {}", self.0)
    }
}

impl std::error::Error for ParseActivityVerbError {}

/// Object types an activity can act upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    Note,
    /// A poll; used for poll votes and poll updates.
    Question,
    /// An account.
    Profile,
    Follow,
    Like,
    Announce,
    Block,
    Flag,
}

impl ObjectType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Note => "Note",
            Self::Question => "Question",
            Self::Profile => "Profile",
            Self::Follow => "Follow",
            Self::Like => "Like",
            Self::Announce => "Announce",
            Self::Block => "Block",
            Self::Flag => "Flag",
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ObjectType {
    type Err = ParseObjectTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Note" => Ok(Self::Note),
            "Question" => Ok(Self::Question),
            "Profile" | "Person" => Ok(Self::Profile),
            "Follow" => Ok(Self::Follow),
            "Like" => Ok(Self::Like),
            "Announce" => Ok(Self::Announce),
            "Block" => Ok(Self::Block),
            "Flag" => Ok(Self::Flag),
            _ => Err(ParseObjectTypeError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown object type.
#[derive(Debug, Clone)]
pub struct ParseObjectTypeError(pub String);

impl std::fmt::Display for ParseObjectTypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown object type: {}", self.0)
    }
}

impl std::error::Error for ParseObjectTypeError {}

/// The domain model an envelope acts upon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "model")]
pub enum Payload {
    Account(Account),
    Status(Status),
    Follow(Follow),
    FollowRequest(FollowRequest),
    StatusFave(StatusFave),
    Block(Block),
    Report(Report),
    Move(Move),
    PollVote(PollVote),
}

impl Payload {
    /// Short name of the variant, for logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Account(_) => "Account",
            Self::Status(_) => "Status",
            Self::Follow(_) => "Follow",
            Self::FollowRequest(_) => "FollowRequest",
            Self::StatusFave(_) => "StatusFave",
            Self::Block(_) => "Block",
            Self::Report(_) => "Report",
            Self::Move(_) => "Move",
            Self::PollVote(_) => "PollVote",
        }
    }

    /// URI of the object itself, when it has one.
    pub fn uri(&self) -> Option<&str> {
        match self {
            Self::Account(a) => Some(&a.uri),
            Self::Status(s) => Some(&s.uri),
            Self::Follow(f) => Some(&f.uri),
            Self::FollowRequest(f) => Some(&f.uri),
            Self::StatusFave(f) => Some(&f.uri),
            Self::Block(b) => Some(&b.uri),
            Self::Report(r) => Some(&r.uri),
            Self::Move(m) => Some(&m.uri),
            Self::PollVote(_) => None,
        }
    }
}

/// An event produced by a local user action.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientMessage {
    pub verb: ActivityVerb,
    pub object_type: ObjectType,
    pub payload: Payload,
    /// The local account performing the action.
    pub origin: Account,
    pub target: Option<Account>,
}

impl ClientMessage {
    pub fn new(
        verb: ActivityVerb,
        object_type: ObjectType,
        payload: Payload,
        origin: Account,
    ) -> Self {
        Self {
            verb,
            object_type,
            payload,
            origin,
            target: None,
        }
    }

    pub fn with_target(mut self, target: Account) -> Self {
        self.target = Some(target);
        self
    }

    /// URI of the object this message acts upon.
    pub fn target_uri(&self) -> Option<&str> {
        self.payload.uri()
    }

    /// Returns true when either the origin or target account is `account_id`.
    pub fn involves_account(&self, account_id: &str) -> bool {
        self.origin.id == account_id
            || self.target.as_ref().is_some_and(|t| t.id == account_id)
    }
}

/// An event delivered by a remote instance.
#[derive(Debug, Clone, PartialEq)]
pub struct FediMessage {
    pub verb: ActivityVerb,
    pub object_type: ObjectType,
    /// The materialized object, if the inbox already built it.
    pub payload: Option<Payload>,
    /// IRI to dereference when `payload` is absent.
    pub deref_iri: Option<String>,
    /// The remote account that sent the activity.
    pub origin: Account,
    /// The local account whose inbox received the activity.
    pub receiving: Account,
    pub target: Option<Account>,
}

impl FediMessage {
    pub fn new(
        verb: ActivityVerb,
        object_type: ObjectType,
        payload: Payload,
        origin: Account,
        receiving: Account,
    ) -> Self {
        Self {
            verb,
            object_type,
            payload: Some(payload),
            deref_iri: None,
            origin,
            receiving,
            target: None,
        }
    }

    /// Builds an envelope whose object must be dereferenced from `iri`.
    pub fn from_iri(
        verb: ActivityVerb,
        object_type: ObjectType,
        iri: impl Into<String>,
        origin: Account,
        receiving: Account,
    ) -> Self {
        Self {
            verb,
            object_type,
            payload: None,
            deref_iri: Some(iri.into()),
            origin,
            receiving,
            target: None,
        }
    }

    pub fn with_target(mut self, target: Account) -> Self {
        self.target = Some(target);
        self
    }

    /// URI of the object this message acts upon.
    pub fn target_uri(&self) -> Option<&str> {
        match &self.payload {
            Some(payload) => payload.uri(),
            None => self.deref_iri.as_deref(),
        }
    }

    /// Returns true when the sending or target account is `account_id`.
    pub fn involves_account(&self, account_id: &str) -> bool {
        self.origin.id == account_id
            || self.target.as_ref().is_some_and(|t| t.id == account_id)
    }
}
