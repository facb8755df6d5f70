use std::fmt;

use kestrel_db::DbError;
use kestrel_types::{ActivityVerb, ObjectType};
use thiserror::Error;

/// Errors returned by message handlers.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("database error: {0}")]
    Db(#[from] DbError),

    /// The payload variant does not match the activity. Producers built a
    /// malformed envelope.
    #[error("{verb} {object_type}: expected {expected} payload, got {found}")]
    UnexpectedPayload {
        expected: &'static str,
        found: &'static str,
        verb: ActivityVerb,
        object_type: ObjectType,
    },

    #[error("unhandled activity {verb} {object_type}")]
    Unhandled {
        verb: ActivityVerb,
        object_type: ObjectType,
    },

    /// A federation message carried neither a payload nor a resolvable IRI.
    #[error("{verb} {object_type}: no model and no dereferenceable IRI")]
    MissingModel {
        verb: ActivityVerb,
        object_type: ObjectType,
    },

    #[error("federation error: {0}")]
    Federation(String),

    #[error("invalid uri: {0}")]
    InvalidUri(#[from] url::ParseError),

    #[error("activity serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Multi(#[from] MultiError),

    #[error("{0}")]
    Other(String),
}

impl WorkerError {
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Errors accumulated across a loop that must not stop at the first failure.
#[derive(Debug, Default)]
pub struct MultiError {
    errors: Vec<WorkerError>,
}

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: WorkerError) {
        self.errors.push(err);
    }

    /// Records `context: err`.
    pub fn push_context(&mut self, context: impl fmt::Display, err: impl fmt::Display) {
        self.errors
            .push(WorkerError::Other(format!("{context}: {err}")));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// `Ok(())` when nothing was recorded.
    pub fn combine(self) -> Result<(), WorkerError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(WorkerError::Multi(self))
        }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_multi_error_combines_to_ok() {
        assert!(MultiError::new().combine().is_ok());
    }

    #[test]
    fn multi_error_joins_messages() {
        let mut errs = MultiError::new();
        errs.push(WorkerError::other("first"));
        errs.push_context("follower a1", "db down");
        assert_eq!(errs.len(), 2);

        let err = errs.combine().expect_err("should be an error");
        assert_eq!(err.to_string(), "first; follower a1: db down");
    }
}
