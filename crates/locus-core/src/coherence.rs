//! Coherence report types shared by the validator, the manager and errors.

use serde::{Deserialize, Serialize};

use crate::id::{ConnectionId, ReferenceId};

/// Which geometric rule an issue violates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Two references are too close, or a connection spans too far.
    Distance,
    /// Two references' bounding volumes overlap.
    Overlap,
    /// A third reference blocks the line between connected references.
    Visibility,
}

/// How serious an issue is. Only errors break coherence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    /// Tolerated; costs 0.05 of the score.
    Warning,
    /// Breaks coherence; costs 0.2 of the score.
    Error,
}

/// A single finding of a coherence check.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoherenceIssue {
    /// Violated rule.
    pub kind: IssueKind,
    /// Seriousness.
    pub severity: IssueSeverity,
    /// References involved, in a stable order.
    pub reference_ids: Vec<ReferenceId>,
    /// The connection involved, for connection-level checks.
    pub connection_id: Option<ConnectionId>,
    /// Human-readable description.
    pub message: String,
}

impl std::fmt::Display for CoherenceIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} {:?}: {}", self.severity, self.kind, self.message)
    }
}

/// Outcome of validating a whole map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoherenceReport {
    /// True iff there are no error-severity issues.
    pub is_coherent: bool,
    /// `1.0 - 0.2 * errors - 0.05 * warnings`, clamped to `[0, 1]`.
    pub score: f64,
    /// Every finding, pairs first, then connections.
    pub issues: Vec<CoherenceIssue>,
    /// Deduplicated advice, one line per kind of problem found.
    pub recommendations: Vec<String>,
}

impl CoherenceReport {
    /// Penalty per error-severity issue.
    pub const ERROR_PENALTY: f64 = 0.2;
    /// Penalty per warning-severity issue.
    pub const WARNING_PENALTY: f64 = 0.05;

    /// Build a report from issues, deriving score and coherence.
    pub fn from_issues(issues: Vec<CoherenceIssue>, recommendations: Vec<String>) -> Self {
        let errors = issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Error)
            .count();
        let warnings = issues.len() - errors;
        let score = (1.0
            - Self::ERROR_PENALTY * errors as f64
            - Self::WARNING_PENALTY * warnings as f64)
            .clamp(0.0, 1.0);
        Self {
            is_coherent: errors == 0,
            score,
            issues,
            recommendations,
        }
    }

    /// Number of issues of the given severity.
    pub fn count(&self, severity: IssueSeverity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    /// Number of issues of the given kind.
    pub fn count_kind(&self, kind: IssueKind) -> usize {
        self.issues.iter().filter(|i| i.kind == kind).count()
    }
}
