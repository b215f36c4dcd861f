use std::hash::{Hash, Hasher};

use uuid::Uuid;

use crate::config::ScoringConfig;
use crate::models::{Grade, MarketKey, RankedPost};

/// Assign relative grades to every post in one market.
///
/// Posts are ranked by final score descending, ties broken by post id so the
/// assignment is pure and reproducible for a given score set. Markets with at
/// least four posts are split into strict quartiles (top 25% → A ... bottom
/// 25% → D). Markets of one to three posts cannot be divided into quartiles
/// at post granularity, so they fall back to fixed score bands over the
/// global 0-100 range (see `ScoringConfig::small_market_bands`); a lone post
/// earns whatever grade its score clears. An empty market grades nothing.
pub fn assign_grades(posts: &[RankedPost], config: &ScoringConfig) -> Vec<(Uuid, Grade)> {
    if posts.is_empty() {
        return Vec::new();
    }

    let mut ranked: Vec<RankedPost> = posts.to_vec();
    ranked.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });

    if ranked.len() < 4 {
        return ranked
            .iter()
            .map(|post| (post.id, band_grade(post.final_score, config)))
            .collect();
    }

    let total = ranked.len();
    ranked
        .iter()
        .enumerate()
        .map(|(rank, post)| {
            let grade = match rank * 4 / total {
                0 => Grade::A,
                1 => Grade::B,
                2 => Grade::C,
                _ => Grade::D,
            };
            (post.id, grade)
        })
        .collect()
}

fn band_grade(final_score: f64, config: &ScoringConfig) -> Grade {
    let [a, b, c] = config.small_market_bands;
    if final_score >= a {
        Grade::A
    } else if final_score >= b {
        Grade::B
    } else if final_score >= c {
        Grade::C
    } else {
        Grade::D
    }
}

/// Advisory-lock key for a market. Two sweeps of the same market must not
/// run concurrently; sweeps of different markets are independent.
pub fn market_lock_key(key: &MarketKey) -> i64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    key.scope.as_str().hash(&mut hasher);
    key.cluster_id.hash(&mut hasher);
    hasher.finish() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Scope;

    fn config() -> ScoringConfig {
        ScoringConfig::default()
    }

    fn market(scores: &[f64]) -> Vec<RankedPost> {
        scores
            .iter()
            .map(|&final_score| RankedPost {
                id: Uuid::new_v4(),
                final_score,
            })
            .collect()
    }

    fn grades_in_score_order(posts: &[RankedPost], assigned: &[(Uuid, Grade)]) -> Vec<Grade> {
        let mut ordered = posts.to_vec();
        ordered.sort_by(|a, b| b.final_score.partial_cmp(&a.final_score).unwrap());
        ordered
            .iter()
            .map(|post| {
                assigned
                    .iter()
                    .find(|(id, _)| *id == post.id)
                    .map(|(_, grade)| *grade)
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn eight_post_market_splits_into_exact_quartiles() {
        let posts = market(&[90.0, 85.0, 80.0, 75.0, 70.0, 65.0, 60.0, 55.0]);
        let assigned = assign_grades(&posts, &config());
        let grades = grades_in_score_order(&posts, &assigned);
        assert_eq!(
            grades,
            [
                Grade::A,
                Grade::A,
                Grade::B,
                Grade::B,
                Grade::C,
                Grade::C,
                Grade::D,
                Grade::D
            ]
        );
    }

    #[test]
    fn every_post_gets_exactly_one_grade() {
        let posts = market(&[10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0]);
        let assigned = assign_grades(&posts, &config());
        assert_eq!(assigned.len(), posts.len());
        for post in &posts {
            assert_eq!(assigned.iter().filter(|(id, _)| *id == post.id).count(), 1);
        }
    }

    #[test]
    fn quartile_proportions_are_even_when_size_divides_by_four() {
        let scores: Vec<f64> = (0..12).map(|i| 30.0 + i as f64).collect();
        let posts = market(&scores);
        let assigned = assign_grades(&posts, &config());
        for grade in [Grade::A, Grade::B, Grade::C, Grade::D] {
            assert_eq!(assigned.iter().filter(|(_, g)| *g == grade).count(), 3);
        }
    }

    #[test]
    fn ties_are_broken_by_post_id_reproducibly() {
        let mut posts = market(&[60.0, 60.0, 60.0, 60.0]);
        posts.sort_by_key(|post| post.id);

        let forward = assign_grades(&posts, &config());
        let mut shuffled = posts.clone();
        shuffled.reverse();
        let backward = assign_grades(&shuffled, &config());
        assert_eq!(forward, backward);

        // With all scores tied, rank order is id order.
        let expected = [Grade::A, Grade::B, Grade::C, Grade::D];
        for (index, post) in posts.iter().enumerate() {
            let (_, grade) = forward.iter().find(|(id, _)| *id == post.id).unwrap();
            assert_eq!(*grade, expected[index]);
        }
    }

    #[test]
    fn lone_post_is_graded_by_score_band() {
        let strong = market(&[90.0]);
        let assigned = assign_grades(&strong, &config());
        assert_eq!(assigned[0].1, Grade::A);

        // A lone post at the default final score of 25 earns a C, not a
        // free A: small markets are held to the fixed bands.
        let fresh = market(&[25.0]);
        let assigned = assign_grades(&fresh, &config());
        assert_eq!(assigned[0].1, Grade::C);

        let weak = market(&[10.0]);
        let assigned = assign_grades(&weak, &config());
        assert_eq!(assigned[0].1, Grade::D);
    }

    #[test]
    fn two_and_three_post_markets_use_bands() {
        let posts = market(&[80.0, 55.0]);
        let assigned = assign_grades(&posts, &config());
        let grades = grades_in_score_order(&posts, &assigned);
        assert_eq!(grades, [Grade::A, Grade::B]);

        let posts = market(&[76.0, 74.0, 20.0]);
        let assigned = assign_grades(&posts, &config());
        let grades = grades_in_score_order(&posts, &assigned);
        assert_eq!(grades, [Grade::A, Grade::B, Grade::D]);
    }

    #[test]
    fn empty_market_grades_nothing() {
        assert!(assign_grades(&[], &config()).is_empty());
    }

    #[test]
    fn lock_keys_are_stable_and_distinct_per_market() {
        let single = MarketKey::new(Scope::Single, None);
        let multi = MarketKey::new(Scope::Multi, None);
        let cluster_a = MarketKey::new(Scope::Cluster, Some(Uuid::new_v4()));
        let cluster_b = MarketKey::new(Scope::Cluster, Some(Uuid::new_v4()));

        assert_eq!(market_lock_key(&single), market_lock_key(&single));
        assert_ne!(market_lock_key(&single), market_lock_key(&multi));
        assert_ne!(market_lock_key(&cluster_a), market_lock_key(&cluster_b));
    }
}
