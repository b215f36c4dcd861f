use crate::config::ScoringConfig;
use crate::models::ScoreInputs;

/// Sum the base score, time-urgency bonus, engagement score, and review
/// bonus, then clamp into the system-wide score range. The components are
/// owned elsewhere and already validated; the one repair performed here is
/// zero-clamping a negative component, which can only mean corruption.
pub fn final_score(inputs: &ScoreInputs, engagement_score: f64, config: &ScoringConfig) -> f64 {
    let components = [
        ("base_score", inputs.base_score),
        ("time_urgency_bonus", inputs.time_urgency_bonus),
        ("engagement_score", engagement_score),
        ("review_score_bonus", inputs.review_score_bonus),
    ];

    let mut total = 0.0;
    for (name, value) in components {
        if !value.is_finite() || value < 0.0 {
            tracing::warn!(component = name, value, "score component clamped to zero");
            continue;
        }
        total += value;
    }
    total.clamp(config.final_score_min, config.final_score_max)
}
