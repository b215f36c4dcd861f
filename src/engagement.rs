use crate::config::InteractionWeights;
use crate::models::EngagementCounts;

/// Weighted raw impact of a post's counters: Σ count × weight over the four
/// scoring kinds. Unbounded and scope-agnostic; views contribute nothing.
///
/// Counters should never be negative, but a corrupted row must not produce
/// a negative score, so offending values are clamped to zero and logged.
pub fn raw_impact(counts: &EngagementCounts, weights: &InteractionWeights) -> f64 {
    let components = [
        ("message_count", counts.messages, weights.message),
        ("repost_count", counts.reposts, weights.repost),
        ("share_count", counts.shares, weights.share),
        ("bookmark_count", counts.bookmarks, weights.bookmark),
    ];

    let mut impact = 0.0;
    for (column, count, weight) in components {
        if count < 0 {
            tracing::warn!(column, count, "negative counter clamped to zero");
            continue;
        }
        impact += count as f64 * weight;
    }
    impact
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights() -> InteractionWeights {
        InteractionWeights::default()
    }

    #[test]
    fn impact_weights_intent_strength() {
        let counts = EngagementCounts {
            messages: 20,
            reposts: 10,
            shares: 15,
            bookmarks: 25,
        };
        // 20*4 + 10*3 + 15*2 + 25*1
        assert_eq!(raw_impact(&counts, &weights()), 165.0);
    }

    #[test]
    fn zero_counts_give_zero_impact() {
        assert_eq!(raw_impact(&EngagementCounts::default(), &weights()), 0.0);
    }

    #[test]
    fn single_kind_vectors_use_only_that_weight() {
        let counts = EngagementCounts {
            messages: 100,
            ..Default::default()
        };
        assert_eq!(raw_impact(&counts, &weights()), 400.0);

        let counts = EngagementCounts {
            bookmarks: 100,
            ..Default::default()
        };
        assert_eq!(raw_impact(&counts, &weights()), 100.0);
    }

    #[test]
    fn negative_counters_are_clamped_not_propagated() {
        let counts = EngagementCounts {
            messages: -50,
            reposts: 2,
            shares: -1,
            bookmarks: 0,
        };
        assert_eq!(raw_impact(&counts, &weights()), 6.0);
    }
}
