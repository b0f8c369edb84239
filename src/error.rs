//! Error types
//!
//! Contract violations (missing ids, use after close) fail immediately and
//! are never recovered. Poll failures are handled inside the fetch primitive
//! and only surface here when the caller did not opt into isolation.

use thiserror::Error;

use crate::stats::EntityKind;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for monitor operations
#[derive(Debug, Error)]
pub enum Error {
    /// An update carried an empty mandatory identifier field
    #[error("{kind} stats are missing mandatory field `{field}`")]
    MissingId {
        kind: EntityKind,
        field: &'static str,
    },

    /// `make()` was called on a closed sampler
    #[error("Sampler is closed")]
    SamplerClosed,

    /// The accumulator was used after `close()`
    #[error("Accumulator is closed")]
    AccumulatorClosed,

    /// The monitor was used after `close()`
    #[error("Monitor is closed")]
    MonitorClosed,

    /// A collector failed its collection cycle
    #[error("Collector {id} failed: {reason}")]
    Collector { id: String, reason: String },

    /// A sender failed to deliver a batch
    #[error("Sender failed: {0}")]
    Sender(String),

    /// A stats source failed to produce its records
    #[error("Stats source {id} failed: {reason}")]
    Source { id: String, reason: String },

    /// Serialization of a sample or stats record failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error indicates a caller bug rather than an I/O failure
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Error::MissingId { .. }
                | Error::SamplerClosed
                | Error::AccumulatorClosed
                | Error::MonitorClosed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_id_display() {
        let err = Error::MissingId {
            kind: EntityKind::InboundPad,
            field: "padId",
        };
        assert_eq!(
            err.to_string(),
            "inbound pad stats are missing mandatory field `padId`"
        );
        assert!(err.is_contract_violation());
    }

    #[test]
    fn test_io_like_errors_are_not_contract_violations() {
        assert!(!Error::Sender("socket closed".into()).is_contract_violation());
        assert!(!Error::Source {
            id: "router-1".into(),
            reason: "closed".into()
        }
        .is_contract_violation());
    }
}
