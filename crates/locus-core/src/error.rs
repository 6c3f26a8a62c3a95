//! Error types for spatial map operations.
//!
//! Every variant is recoverable by the caller: retry with corrected input,
//! or create the missing map or reference first.

use thiserror::Error;

use crate::coherence::CoherenceIssue;
use crate::id::{ConnectionId, MapId, ReferenceId};

/// Errors from manager operations on a [`SpatialMap`](crate::SpatialMap).
#[derive(Clone, Debug, PartialEq, Error)]
pub enum SpatialError {
    /// The map id is unknown or the map has been discarded.
    #[error("spatial map '{map_id}' not found")]
    MapNotFound {
        /// The missing map.
        map_id: MapId,
    },
    /// No live reference with this id exists in the map.
    #[error("reference '{reference_id}' not found in map '{map_id}'")]
    ReferenceNotFound {
        /// The map searched.
        map_id: MapId,
        /// The missing reference.
        reference_id: ReferenceId,
    },
    /// No connection with this id exists in the map.
    #[error("connection '{connection_id}' not found in map '{map_id}'")]
    ConnectionNotFound {
        /// The map searched.
        map_id: MapId,
        /// The missing connection.
        connection_id: ConnectionId,
    },
    /// A caller-supplied reference id is already live in the map.
    #[error("reference '{reference_id}' already exists in map '{map_id}'")]
    DuplicateReference {
        /// The map written to.
        map_id: MapId,
        /// The clashing id.
        reference_id: ReferenceId,
    },
    /// A pre-flight coherence check rejected the change.
    #[error("coherence validation failed with {} issue(s)", issues.len())]
    ValidationFailure {
        /// Findings that caused the rejection.
        issues: Vec<CoherenceIssue>,
    },
    /// A long-running pass was abandoned through its cancellation token.
    #[error("{operation} cancelled")]
    Cancelled {
        /// Which pass was cancelled.
        operation: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_ids() {
        let e = SpatialError::ReferenceNotFound {
            map_id: MapId::new("m1"),
            reference_id: ReferenceId::new("r9"),
        };
        assert_eq!(e.to_string(), "reference 'r9' not found in map 'm1'");

        let e = SpatialError::ValidationFailure { issues: vec![] };
        assert_eq!(e.to_string(), "coherence validation failed with 0 issue(s)");
    }
}
