use std::collections::HashMap;
use std::fmt::Write;

use crate::models::{Grade, MarketKey, PostScores};

#[derive(Debug, Clone)]
pub struct MarketSummary {
    pub key: MarketKey,
    pub post_count: usize,
    pub graded: HashMap<Grade, usize>,
    pub ungraded: usize,
    pub avg_score: f64,
    pub min_score: f64,
    pub max_score: f64,
}

pub fn summarize_markets(posts: &[PostScores]) -> Vec<MarketSummary> {
    let mut by_market: HashMap<MarketKey, Vec<&PostScores>> = HashMap::new();
    for post in posts {
        by_market.entry(post.market_key()).or_default().push(post);
    }

    let mut summaries: Vec<MarketSummary> = by_market
        .into_iter()
        .map(|(key, members)| {
            let mut graded: HashMap<Grade, usize> = HashMap::new();
            let mut ungraded = 0usize;
            let mut total = 0.0;
            let mut min_score = f64::INFINITY;
            let mut max_score = f64::NEG_INFINITY;

            for post in &members {
                match post.relative_grade {
                    Some(grade) => *graded.entry(grade).or_insert(0) += 1,
                    None => ungraded += 1,
                }
                total += post.final_score;
                min_score = min_score.min(post.final_score);
                max_score = max_score.max(post.final_score);
            }

            MarketSummary {
                key,
                post_count: members.len(),
                graded,
                ungraded,
                avg_score: total / members.len() as f64,
                min_score,
                max_score,
            }
        })
        .collect();

    summaries.sort_by(|a, b| {
        b.post_count
            .cmp(&a.post_count)
            .then_with(|| a.key.to_string().cmp(&b.key.to_string()))
    });
    summaries
}

pub fn build_report(posts: &[PostScores]) -> String {
    let summaries = summarize_markets(posts);

    let mut output = String::new();
    let _ = writeln!(output, "# Engagement Grading Report");
    let _ = writeln!(
        output,
        "{} active posts across {} markets",
        posts.len(),
        summaries.len()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Markets");

    if summaries.is_empty() {
        let _ = writeln!(output, "No active posts to report on.");
    } else {
        for summary in &summaries {
            let _ = writeln!(
                output,
                "- {} market: {} posts (avg score {:.2}, range {:.2}-{:.2})",
                summary.key, summary.post_count, summary.avg_score, summary.min_score, summary.max_score
            );
            for grade in [Grade::A, Grade::B, Grade::C, Grade::D] {
                if let Some(count) = summary.graded.get(&grade) {
                    let _ = writeln!(output, "  - {grade}: {count}");
                }
            }
            if summary.ungraded > 0 {
                let _ = writeln!(output, "  - ungraded: {}", summary.ungraded);
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Posts");

    if posts.is_empty() {
        let _ = writeln!(output, "No posts recorded.");
    } else {
        for post in posts.iter().take(10) {
            let grade = post
                .relative_grade
                .map(|g| g.to_string())
                .unwrap_or_else(|| "ungraded".to_string());
            let _ = writeln!(
                output,
                "- {} [{}] score {:.2} (engagement {:.2}, {} interactions) in {}",
                post.title,
                grade,
                post.final_score,
                post.engagement_score,
                post.interaction_count,
                post.market_key()
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EngagementCounts, MarketSize, Scope};
    use uuid::Uuid;

    fn post(title: &str, scope: Scope, final_score: f64, grade: Option<Grade>) -> PostScores {
        PostScores {
            id: Uuid::new_v4(),
            title: title.to_string(),
            scope,
            cluster_id: None,
            market_size: MarketSize::Small,
            counts: EngagementCounts::default(),
            engagement_score: 0.0,
            base_score: 25.0,
            time_urgency_bonus: 0.0,
            review_score_bonus: 0.0,
            final_score,
            relative_grade: grade,
            last_interaction_at: None,
            interaction_count: 0,
        }
    }

    #[test]
    fn summaries_group_by_market_and_count_grades() {
        let posts = vec![
            post("a", Scope::Single, 80.0, Some(Grade::A)),
            post("b", Scope::Single, 40.0, Some(Grade::C)),
            post("c", Scope::Multi, 60.0, None),
        ];
        let summaries = summarize_markets(&posts);
        assert_eq!(summaries.len(), 2);

        let single = summaries
            .iter()
            .find(|s| s.key.scope == Scope::Single)
            .unwrap();
        assert_eq!(single.post_count, 2);
        assert_eq!(single.graded.get(&Grade::A), Some(&1));
        assert_eq!(single.graded.get(&Grade::C), Some(&1));
        assert_eq!(single.ungraded, 0);
        assert_eq!(single.avg_score, 60.0);
        assert_eq!(single.min_score, 40.0);
        assert_eq!(single.max_score, 80.0);

        let multi = summaries
            .iter()
            .find(|s| s.key.scope == Scope::Multi)
            .unwrap();
        assert_eq!(multi.ungraded, 1);
    }

    #[test]
    fn report_lists_markets_and_top_posts() {
        let posts = vec![
            post("Concert tickets", Scope::Single, 91.0, Some(Grade::A)),
            post("Old couch", Scope::Single, 30.0, Some(Grade::D)),
        ];
        let report = build_report(&posts);
        assert!(report.contains("# Engagement Grading Report"));
        assert!(report.contains("single market: 2 posts"));
        assert!(report.contains("Concert tickets [A] score 91.00"));
    }

    #[test]
    fn empty_report_has_placeholders() {
        let report = build_report(&[]);
        assert!(report.contains("No active posts to report on."));
        assert!(report.contains("No posts recorded."));
    }
}
