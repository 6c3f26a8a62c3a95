//! The [`CoherenceValidator`].
//!
//! All checks run against an immutable map snapshot. Pair checks cover
//! every unordered pair of references; connection checks cover every
//! connection. Long passes poll a [`CancellationToken`] between
//! comparisons and give up with [`SpatialError::Cancelled`].

use locus_core::{
    CancellationToken, CoherenceIssue, CoherenceReport, IssueKind, IssueSeverity, ReferenceId,
    SpatialConnection, SpatialError, SpatialMap, SpatialReference, SpatialVector,
};
use tracing::debug;

use crate::config::CoherenceConfig;
use crate::error::CoherenceConfigError;
use crate::geometry::{
    angle_at, calculate_distance, mean_radius, pairwise_separation, separation_direction,
};

const ADVICE_TOO_CLOSE: &str = "Increase spacing between references closer than the minimum distance";
const ADVICE_OVERLAP: &str = "Move overlapping references apart or give them smaller sizes";
const ADVICE_TOO_FAR: &str = "Bring connected references closer together";
const ADVICE_BLOCKED: &str = "Reposition references that obstruct the line between connected references";

/// Result of a pre-flight check for a reference about to be added.
#[derive(Clone, Debug, PartialEq)]
pub struct AdditionCheck {
    /// True when the candidate conflicts with no existing reference.
    pub is_valid: bool,
    /// One issue per violated rule per conflicting reference.
    pub issues: Vec<CoherenceIssue>,
    /// Alternative positions, least conflicting first.
    pub suggested_positions: Vec<SpatialVector>,
}

/// Stateless geometric checks over [`SpatialMap`] snapshots.
#[derive(Clone, Debug, Default)]
pub struct CoherenceValidator {
    config: CoherenceConfig,
}

impl CoherenceValidator {
    /// Build a validator with checked thresholds.
    ///
    /// # Errors
    ///
    /// See [`CoherenceConfig::validate`].
    pub fn new(config: CoherenceConfig) -> Result<Self, CoherenceConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Active thresholds.
    pub fn config(&self) -> &CoherenceConfig {
        &self.config
    }

    /// Euclidean distance between two points.
    pub fn calculate_distance(&self, p1: SpatialVector, p2: SpatialVector) -> f64 {
        calculate_distance(p1, p2)
    }

    /// Centre distance below which `r1` and `r2` overlap.
    pub fn overlap_distance(&self, r1: &SpatialReference, r2: &SpatialReference) -> f64 {
        let size = self.config.default_size;
        (mean_radius(r1, size) + mean_radius(r2, size)) * self.config.overlap_threshold
    }

    /// Whether the bounding volumes of `r1` and `r2` overlap.
    pub fn check_overlap(&self, r1: &SpatialReference, r2: &SpatialReference) -> bool {
        calculate_distance(r1.position, r2.position) < self.overlap_distance(r1, r2)
    }

    /// Separation at which `r1` and `r2` neither overlap nor sit closer
    /// than the minimum distance.
    pub fn required_separation(&self, r1: &SpatialReference, r2: &SpatialReference) -> f64 {
        self.overlap_distance(r1, r2).max(self.config.min_distance)
    }

    /// Whether no reference in `others` blocks the line from `r1` to `r2`.
    ///
    /// A reference blocks when the angle it subtends to both endpoints
    /// exceeds the visibility angle and it is nearer to each endpoint than
    /// the endpoints are to each other. `r1` and `r2` themselves are
    /// ignored if they appear in `others`.
    pub fn check_visibility<'a>(
        &self,
        r1: &SpatialReference,
        r2: &SpatialReference,
        others: impl IntoIterator<Item = &'a SpatialReference>,
    ) -> bool {
        self.find_blocker(r1, r2, others).is_none()
    }

    fn find_blocker<'a>(
        &self,
        r1: &SpatialReference,
        r2: &SpatialReference,
        others: impl IntoIterator<Item = &'a SpatialReference>,
    ) -> Option<&'a SpatialReference> {
        let span = calculate_distance(r1.position, r2.position);
        others.into_iter().find(|o| {
            if o.id == r1.id || o.id == r2.id {
                return false;
            }
            let Some(angle) = angle_at(o.position, r1.position, r2.position) else {
                return false;
            };
            angle > self.config.visibility_angle_degrees
                && calculate_distance(o.position, r1.position) < span
                && calculate_distance(o.position, r2.position) < span
        })
    }

    // ── Whole-map validation ────────────────────────────────────

    /// Validate every reference pair and every connection of `map`.
    pub fn validate_spatial_map(&self, map: &SpatialMap) -> CoherenceReport {
        let issues = self.scan(map, &|| false).unwrap_or_default();
        self.report(map, issues)
    }

    /// [`validate_spatial_map`](Self::validate_spatial_map), polling
    /// `token` between comparisons.
    ///
    /// # Errors
    ///
    /// [`SpatialError::Cancelled`] once the token is cancelled.
    pub fn validate_spatial_map_with(
        &self,
        map: &SpatialMap,
        token: &CancellationToken,
    ) -> Result<CoherenceReport, SpatialError> {
        let issues = self
            .scan(map, &|| token.is_cancelled())
            .ok_or(SpatialError::Cancelled {
                operation: "coherence validation",
            })?;
        Ok(self.report(map, issues))
    }

    fn report(&self, map: &SpatialMap, issues: Vec<CoherenceIssue>) -> CoherenceReport {
        let mut recommendations: Vec<String> = Vec::new();
        for issue in &issues {
            let advice = match (issue.kind, issue.connection_id.is_some()) {
                (IssueKind::Distance, false) => ADVICE_TOO_CLOSE,
                (IssueKind::Distance, true) => ADVICE_TOO_FAR,
                (IssueKind::Overlap, _) => ADVICE_OVERLAP,
                (IssueKind::Visibility, _) => ADVICE_BLOCKED,
            };
            if !recommendations.iter().any(|r| r == advice) {
                recommendations.push(advice.to_owned());
            }
        }
        let report = CoherenceReport::from_issues(issues, recommendations);
        debug!(
            map_id = %map.id(),
            issues = report.issues.len(),
            score = report.score,
            coherent = report.is_coherent,
            "validated spatial map"
        );
        report
    }

    /// Collect issues, or `None` if `cancelled` fires first.
    fn scan(&self, map: &SpatialMap, cancelled: &dyn Fn() -> bool) -> Option<Vec<CoherenceIssue>> {
        let refs: Vec<&SpatialReference> = map.references().collect();
        let mut issues = Vec::new();

        for (i, a) in refs.iter().enumerate() {
            for b in &refs[i + 1..] {
                if cancelled() {
                    return None;
                }
                self.check_pair(a, b, &mut issues);
            }
        }

        for connection in map.connections() {
            if cancelled() {
                return None;
            }
            let (Some(source), Some(target)) = (
                map.reference(&connection.source_id),
                map.reference(&connection.target_id),
            ) else {
                continue;
            };
            self.check_connection(connection, source, target, &refs, &mut issues);
        }
        Some(issues)
    }

    fn check_pair(&self, a: &SpatialReference, b: &SpatialReference, issues: &mut Vec<CoherenceIssue>) {
        let distance = calculate_distance(a.position, b.position);
        if distance < self.config.min_distance {
            issues.push(CoherenceIssue {
                kind: IssueKind::Distance,
                severity: IssueSeverity::Warning,
                reference_ids: vec![a.id.clone(), b.id.clone()],
                connection_id: None,
                message: format!(
                    "references '{}' and '{}' are {distance:.3} apart, below the minimum of {}",
                    a.id, b.id, self.config.min_distance
                ),
            });
        }
        let overlap = self.overlap_distance(a, b);
        if distance < overlap {
            issues.push(CoherenceIssue {
                kind: IssueKind::Overlap,
                severity: IssueSeverity::Error,
                reference_ids: vec![a.id.clone(), b.id.clone()],
                connection_id: None,
                message: format!(
                    "references '{}' and '{}' overlap ({distance:.3} < {overlap:.3})",
                    a.id, b.id
                ),
            });
        }
    }

    fn check_connection(
        &self,
        connection: &SpatialConnection,
        source: &SpatialReference,
        target: &SpatialReference,
        refs: &[&SpatialReference],
        issues: &mut Vec<CoherenceIssue>,
    ) {
        let distance = calculate_distance(source.position, target.position);
        if distance > self.config.max_distance {
            issues.push(CoherenceIssue {
                kind: IssueKind::Distance,
                severity: IssueSeverity::Warning,
                reference_ids: vec![source.id.clone(), target.id.clone()],
                connection_id: Some(connection.id.clone()),
                message: format!(
                    "connection '{}' spans {distance:.3}, above the maximum of {}",
                    connection.id, self.config.max_distance
                ),
            });
        }
        if let Some(blocker) = self.find_blocker(source, target, refs.iter().copied()) {
            issues.push(CoherenceIssue {
                kind: IssueKind::Visibility,
                severity: IssueSeverity::Warning,
                reference_ids: vec![source.id.clone(), target.id.clone(), blocker.id.clone()],
                connection_id: Some(connection.id.clone()),
                message: format!(
                    "reference '{}' blocks connection '{}' between '{}' and '{}'",
                    blocker.id, connection.id, source.id, target.id
                ),
            });
        }
    }

    // ── Pre-flight ──────────────────────────────────────────────

    /// Check `candidate` against every reference already in `map`.
    ///
    /// An existing reference with the candidate's id is skipped, so a
    /// live reference can be re-checked in place. Suggested positions push
    /// the candidate away from each conflicting reference along their
    /// separation, to `correction_factor` times the required separation.
    pub fn validate_reference_addition(
        &self,
        map: &SpatialMap,
        candidate: &SpatialReference,
    ) -> AdditionCheck {
        let mut issues = Vec::new();
        let mut suggestions: Vec<SpatialVector> = Vec::new();

        for (seed, existing) in map.references().enumerate() {
            if existing.id == candidate.id {
                continue;
            }
            let before = issues.len();
            self.check_pair(existing, candidate, &mut issues);
            if issues.len() == before {
                continue;
            }
            let direction = separation_direction(existing.position, candidate.position, seed);
            let reach = self.required_separation(existing, candidate) * self.config.correction_factor;
            let position = existing.position + direction * reach;
            if !suggestions.iter().any(|p| p.to_bits() == position.to_bits()) {
                suggestions.push(position);
            }
        }

        // Stable: equally good suggestions keep discovery order.
        suggestions.sort_by_cached_key(|p| self.conflicts_at(map, candidate, *p));

        AdditionCheck {
            is_valid: issues.is_empty(),
            issues,
            suggested_positions: suggestions,
        }
    }

    fn conflicts_at(&self, map: &SpatialMap, candidate: &SpatialReference, at: SpatialVector) -> usize {
        map.references()
            .filter(|r| r.id != candidate.id)
            .filter(|r| calculate_distance(r.position, at) < self.required_separation(r, candidate))
            .count()
    }

    // ── Correction ──────────────────────────────────────────────

    /// New positions resolving every pairwise violation of `map`.
    ///
    /// Each violating pair is pushed apart symmetrically: both references
    /// move half the gap to `correction_factor` times the required
    /// separation. Displacements from all pairs are computed against the
    /// original positions and summed. Only references that move appear in
    /// the result.
    pub fn correction_moves(&self, map: &SpatialMap) -> Vec<(ReferenceId, SpatialVector)> {
        self.corrections(map, &|| false).unwrap_or_default()
    }

    /// [`correction_moves`](Self::correction_moves), polling `token`
    /// between comparisons.
    ///
    /// # Errors
    ///
    /// [`SpatialError::Cancelled`] once the token is cancelled.
    pub fn correction_moves_with(
        &self,
        map: &SpatialMap,
        token: &CancellationToken,
    ) -> Result<Vec<(ReferenceId, SpatialVector)>, SpatialError> {
        self.corrections(map, &|| token.is_cancelled())
            .ok_or(SpatialError::Cancelled {
                operation: "coherence correction",
            })
    }

    /// A corrected copy of `map`; the input is never touched.
    pub fn suggest_coherence_corrections(&self, map: &SpatialMap) -> SpatialMap {
        let mut corrected = map.clone();
        corrected.move_references(self.correction_moves(map));
        corrected
    }

    fn corrections(
        &self,
        map: &SpatialMap,
        cancelled: &dyn Fn() -> bool,
    ) -> Option<Vec<(ReferenceId, SpatialVector)>> {
        let factor = self.config.correction_factor;
        pairwise_separation(
            map,
            |a, b, distance| {
                let required = self.required_separation(a, b);
                (distance < required).then_some(required * factor)
            },
            cancelled,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use locus_core::{
        ComplexityLevel, ConnectionOptions, MapContext, ReferenceDraft, ReferenceType, RelationType,
        SpatialSize, Timestamp,
    };

    fn at(id: &str, x: f64, y: f64) -> SpatialReference {
        ReferenceDraft::new(ReferenceType::Object, SpatialVector::new(x, y, 0.0))
            .with_id(id)
            .into_reference(Timestamp::now())
    }

    fn map_of(refs: &[(&str, f64, f64)]) -> SpatialMap {
        let mut map = SpatialMap::new(MapContext::new("t", "s", ComplexityLevel::Basic));
        for &(id, x, y) in refs {
            map.insert_reference(at(id, x, y)).unwrap();
        }
        map
    }

    fn connect(map: &mut SpatialMap, a: &str, b: &str) {
        let c = ConnectionOptions::default().into_connection(a.into(), b.into(), RelationType::Spatial);
        map.insert_connection(c).unwrap();
    }

    // ── Primitive checks ────────────────────────────────────────

    #[test]
    fn overlap_uses_default_box() {
        let v = CoherenceValidator::default();
        // Default radius 0.15 each: overlap below (0.15 + 0.15) * 0.5.
        assert!(v.check_overlap(&at("a", 0.0, 0.0), &at("b", 0.14, 0.0)));
        assert!(!v.check_overlap(&at("a", 0.0, 0.0), &at("b", 0.16, 0.0)));
    }

    #[test]
    fn overlap_uses_explicit_size() {
        let v = CoherenceValidator::default();
        let mut big = at("a", 0.0, 0.0);
        big.size = Some(SpatialSize::cube(3.0));
        // (1.5 + 0.15) * 0.5 = 0.825
        assert!(v.check_overlap(&big, &at("b", 0.8, 0.0)));
        assert!(!v.check_overlap(&big, &at("b", 0.9, 0.0)));
    }

    #[test]
    fn blocker_between_endpoints_hides_them() {
        let v = CoherenceValidator::default();
        let (a, b) = (at("a", -1.0, 0.0), at("b", 1.0, 0.0));
        let middle = at("m", 0.0, 0.1);
        let aside = at("s", 0.0, 5.0);
        assert!(!v.check_visibility(&a, &b, [&middle]));
        assert!(v.check_visibility(&a, &b, [&aside]));
        // Endpoints in `others` are ignored.
        assert!(v.check_visibility(&a, &b, [&a, &b]));
    }

    #[test]
    fn beyond_endpoint_does_not_block() {
        let v = CoherenceValidator::default();
        let (a, b) = (at("a", -1.0, 0.0), at("b", 1.0, 0.0));
        // Collinear but outside the segment: angle is 0.
        assert!(v.check_visibility(&a, &b, [&at("x", 3.0, 0.0)]));
    }

    // ── Map validation ──────────────────────────────────────────

    #[test]
    fn spread_map_is_perfect() {
        let report = CoherenceValidator::default()
            .validate_spatial_map(&map_of(&[("a", 0.0, 0.0), ("b", 1.0, 0.0), ("c", 0.0, 1.0)]));
        assert!(report.is_coherent);
        assert_eq!(report.score, 1.0);
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn close_pair_warns_without_overlap() {
        let v = CoherenceValidator::new(CoherenceConfig {
            default_size: SpatialSize::cube(0.01),
            ..Default::default()
        })
        .unwrap();
        let report = v.validate_spatial_map(&map_of(&[("a", 0.0, 0.0), ("b", 0.05, 0.0)]));
        assert!(report.is_coherent);
        assert_eq!(report.count_kind(IssueKind::Distance), 1);
        assert!((report.score - 0.95).abs() < 1e-12);
    }

    #[test]
    fn long_connection_warns() {
        let mut map = map_of(&[("a", 0.0, 0.0), ("b", 11.0, 0.0)]);
        connect(&mut map, "a", "b");
        let report = CoherenceValidator::default().validate_spatial_map(&map);
        assert!(report.is_coherent);
        let issue = &report.issues[0];
        assert_eq!(issue.kind, IssueKind::Distance);
        assert!(issue.connection_id.is_some());
        assert_eq!(report.recommendations, vec![ADVICE_TOO_FAR.to_owned()]);
    }

    #[test]
    fn blocked_connection_warns() {
        let mut map = map_of(&[("a", -1.0, 0.0), ("b", 1.0, 0.0), ("m", 0.0, 0.2)]);
        connect(&mut map, "a", "b");
        let report = CoherenceValidator::default().validate_spatial_map(&map);
        assert_eq!(report.count_kind(IssueKind::Visibility), 1);
        assert_eq!(report.issues[0].reference_ids[2], ReferenceId::new("m"));
    }

    #[test]
    fn recommendations_are_deduplicated() {
        let map = map_of(&[("a", 0.0, 0.0), ("b", 0.01, 0.0), ("c", 5.0, 0.0), ("d", 5.01, 0.0)]);
        let report = CoherenceValidator::default().validate_spatial_map(&map);
        assert_eq!(report.count(IssueSeverity::Error), 2);
        assert_eq!(report.recommendations.len(), 2);
    }

    #[test]
    fn cancelled_validation_stops() {
        let token = CancellationToken::new();
        token.cancel();
        let map = map_of(&[("a", 0.0, 0.0), ("b", 1.0, 0.0)]);
        let err = CoherenceValidator::default()
            .validate_spatial_map_with(&map, &token)
            .unwrap_err();
        assert_eq!(
            err,
            SpatialError::Cancelled {
                operation: "coherence validation"
            }
        );
    }

    // ── Pre-flight ──────────────────────────────────────────────

    #[test]
    fn addition_clear_of_others_is_valid() {
        let map = map_of(&[("a", 0.0, 0.0)]);
        let check = CoherenceValidator::default().validate_reference_addition(&map, &at("n", 1.0, 0.0));
        assert!(check.is_valid);
        assert!(check.issues.is_empty());
        assert!(check.suggested_positions.is_empty());
    }

    #[test]
    fn conflicting_addition_gets_pushed_out() {
        let v = CoherenceValidator::default();
        let map = map_of(&[("a", 0.0, 0.0)]);
        let candidate = at("n", 0.05, 0.0);
        let check = v.validate_reference_addition(&map, &candidate);
        assert!(!check.is_valid);
        assert_eq!(check.issues.len(), 2);

        // Pushed along +x to 1.5 * max(0.1, 0.15).
        let p = check.suggested_positions[0];
        assert!((p.x - 0.225).abs() < 1e-9);
        assert!(p.y.abs() < 1e-12);
        let moved = SpatialReference {
            position: p,
            ..candidate
        };
        assert!(v.validate_reference_addition(&map, &moved).is_valid);
    }

    #[test]
    fn coincident_addition_still_gets_a_suggestion() {
        let map = map_of(&[("a", 1.0, 1.0)]);
        let check = CoherenceValidator::default().validate_reference_addition(&map, &at("n", 1.0, 1.0));
        assert!(!check.is_valid);
        let p = check.suggested_positions[0];
        assert!(p.distance_to(SpatialVector::new(1.0, 1.0, 0.0)) > 0.2);
    }

    // ── Correction ──────────────────────────────────────────────

    #[test]
    fn corrections_move_pair_symmetrically() {
        let v = CoherenceValidator::default();
        let map = map_of(&[("a", 0.0, 0.0), ("b", 0.05, 0.0), ("far", 5.0, 5.0)]);
        let corrected = v.suggest_coherence_corrections(&map);

        let a = corrected.reference(&"a".into()).unwrap().position;
        let b = corrected.reference(&"b".into()).unwrap().position;
        assert!((a.x + 0.0875).abs() < 1e-9);
        assert!((b.x - 0.1375).abs() < 1e-9);
        assert!((b.x - a.x - 0.225).abs() < 1e-9);
        assert_eq!(
            corrected.reference(&"far".into()).unwrap().position,
            SpatialVector::new(5.0, 5.0, 0.0)
        );
        assert!(v.validate_spatial_map(&corrected).is_coherent);

        // Input untouched.
        assert_eq!(map.reference(&"a".into()).unwrap().position, SpatialVector::ZERO);
    }

    #[test]
    fn coherent_map_needs_no_moves() {
        let map = map_of(&[("a", 0.0, 0.0), ("b", 1.0, 0.0)]);
        assert!(CoherenceValidator::default().correction_moves(&map).is_empty());
    }
}
