use std::path::Path;

use crate::models::{DomainError, InteractionKind, Scope};

/// Fixed weights reflecting the intent signal of each interaction kind.
/// A private message implies far higher intent than a bookmark.
#[derive(Debug, Clone, Copy, serde::Deserialize)]
#[serde(default)]
pub struct InteractionWeights {
    pub message: f64,
    pub repost: f64,
    pub share: f64,
    pub bookmark: f64,
}

impl Default for InteractionWeights {
    fn default() -> Self {
        InteractionWeights {
            message: 4.0,
            repost: 3.0,
            share: 2.0,
            bookmark: 1.0,
        }
    }
}

impl InteractionWeights {
    pub fn weight(&self, kind: InteractionKind) -> f64 {
        match kind {
            InteractionKind::Message => self.message,
            InteractionKind::Repost => self.repost,
            InteractionKind::Share => self.share,
            InteractionKind::Bookmark => self.bookmark,
            InteractionKind::View => 0.0,
        }
    }
}

/// Per-scope calibration constants. Wider audiences get a smaller factor
/// and a larger threshold, so the same *relative* popularity lands on the
/// same score regardless of absolute audience size.
#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub struct ScopeCalibration {
    pub normalization_factor: f64,
    pub engagement_threshold: f64,
}

impl ScopeCalibration {
    /// Points of engagement score produced per unit of raw impact,
    /// before the cap.
    pub fn points_per_impact(&self) -> f64 {
        self.normalization_factor / self.engagement_threshold
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: InteractionWeights,
    pub single: ScopeCalibration,
    pub multi: ScopeCalibration,
    pub cluster: ScopeCalibration,
    /// Engagement score saturates here no matter how viral a post goes.
    pub engagement_cap: f64,
    pub default_base_score: f64,
    pub final_score_min: f64,
    pub final_score_max: f64,
    /// Score bands used to grade markets too small for quartiles:
    /// `>= bands[0]` is an A, `>= bands[1]` a B, `>= bands[2]` a C, else D.
    pub small_market_bands: [f64; 3],
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            weights: InteractionWeights::default(),
            single: ScopeCalibration {
                normalization_factor: 1.2,
                engagement_threshold: 0.8,
            },
            multi: ScopeCalibration {
                normalization_factor: 0.8,
                engagement_threshold: 1.2,
            },
            cluster: ScopeCalibration {
                normalization_factor: 0.6,
                engagement_threshold: 1.5,
            },
            engagement_cap: 50.0,
            default_base_score: 25.0,
            final_score_min: 0.0,
            final_score_max: 100.0,
            small_market_bands: [75.0, 50.0, 25.0],
        }
    }
}

impl ScoringConfig {
    pub fn calibration(&self, scope: Scope) -> &ScopeCalibration {
        match scope {
            Scope::Single => &self.single,
            Scope::Multi => &self.multi,
            Scope::Cluster => &self.cluster,
        }
    }

    /// Load a calibration table from a JSON file, falling back to the
    /// compiled-in defaults for absent fields. The result is validated
    /// before use; a broken table is fatal at startup, never defaulted
    /// silently.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: ScoringConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        for scope in Scope::ALL {
            let cal = self.calibration(scope);
            if !(cal.normalization_factor.is_finite() && cal.normalization_factor > 0.0) {
                return Err(DomainError::InvalidConfig(format!(
                    "normalization factor for scope '{scope}' must be finite and positive"
                )));
            }
            if !(cal.engagement_threshold.is_finite() && cal.engagement_threshold > 0.0) {
                return Err(DomainError::InvalidConfig(format!(
                    "engagement threshold for scope '{scope}' must be finite and positive"
                )));
            }
        }
        for (kind, weight) in [
            (InteractionKind::Message, self.weights.message),
            (InteractionKind::Repost, self.weights.repost),
            (InteractionKind::Share, self.weights.share),
            (InteractionKind::Bookmark, self.weights.bookmark),
        ] {
            if !(weight.is_finite() && weight > 0.0) {
                return Err(DomainError::InvalidConfig(format!(
                    "weight for interaction kind '{kind}' must be finite and positive"
                )));
            }
        }
        if !(self.engagement_cap.is_finite() && self.engagement_cap > 0.0) {
            return Err(DomainError::InvalidConfig(
                "engagement cap must be finite and positive".to_string(),
            ));
        }
        if self.final_score_min >= self.final_score_max {
            return Err(DomainError::InvalidConfig(
                "final score range is empty".to_string(),
            ));
        }
        let [a, b, c] = self.small_market_bands;
        if !(a > b && b > c) {
            return Err(DomainError::InvalidConfig(
                "small-market grade bands must be strictly descending".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ScoringConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let mut config = ScoringConfig::default();
        config.multi.engagement_threshold = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn negative_factor_is_rejected() {
        let mut config = ScoringConfig::default();
        config.cluster.normalization_factor = -0.6;
        assert!(config.validate().is_err());
    }

    #[test]
    fn nan_weight_is_rejected() {
        let mut config = ScoringConfig::default();
        config.weights.share = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unordered_bands_are_rejected() {
        let mut config = ScoringConfig::default();
        config.small_market_bands = [50.0, 75.0, 25.0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_overrides_defaults() {
        let parsed: ScoringConfig = serde_json::from_str(
            r#"{"single": {"normalization_factor": 1.0, "engagement_threshold": 1.0}}"#,
        )
        .unwrap();
        assert_eq!(parsed.single.normalization_factor, 1.0);
        assert_eq!(parsed.multi.engagement_threshold, 1.2);
        assert_eq!(parsed.engagement_cap, 50.0);
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn wider_scopes_earn_fewer_points_per_impact() {
        let config = ScoringConfig::default();
        assert!(
            config.single.points_per_impact()
                > config.multi.points_per_impact()
        );
        assert!(
            config.multi.points_per_impact()
                > config.cluster.points_per_impact()
        );
    }
}
