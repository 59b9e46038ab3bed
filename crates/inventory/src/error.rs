use thiserror::Error;

use pantry_core::OrganizationId;

/// Why an event could not be applied to a snapshot.
///
/// Every variant is fatal for that one event and guarantees the snapshot was
/// left exactly as it was.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AggregateError {
    #[error("unknown event kind: {0}")]
    UnknownEventKind(String),

    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("event for organization {found} applied to snapshot of organization {expected}")]
    OrganizationMismatch {
        expected: OrganizationId,
        found: OrganizationId,
    },
}

impl AggregateError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedEvent(msg.into())
    }
}
