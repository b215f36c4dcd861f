use crate::config::ScoringConfig;
use crate::models::Scope;

/// Convert scope-agnostic raw impact into the bounded, scope-comparable
/// engagement score: `min(cap, raw × factor / threshold)`.
///
/// Zero impact maps to exactly 0.0 in every scope, and any finite impact
/// saturates at the cap, so posts are on equal footing at both the floor
/// and the ceiling regardless of audience size.
pub fn engagement_score(raw_impact: f64, scope: Scope, config: &ScoringConfig) -> f64 {
    if !(raw_impact > 0.0) || !raw_impact.is_finite() {
        if raw_impact < 0.0 {
            tracing::warn!(raw_impact, %scope, "negative raw impact clamped to zero");
        }
        return 0.0;
    }
    let calibration = config.calibration(scope);
    let normalized = raw_impact * calibration.normalization_factor;
    (normalized / calibration.engagement_threshold).min(config.engagement_cap)
}

/// Raw impact in scope `to` that represents the same relative popularity as
/// `raw_impact` does in scope `from`. Used when scores leave their own
/// market (cross-market display) and by the fairness tests.
pub fn equivalent_raw_impact(
    raw_impact: f64,
    from: Scope,
    to: Scope,
    config: &ScoringConfig,
) -> f64 {
    let from_rate = config.calibration(from).points_per_impact();
    let to_rate = config.calibration(to).points_per_impact();
    raw_impact * from_rate / to_rate
}
