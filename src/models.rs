use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Boundary errors: unknown variants and broken calibration are rejected
/// eagerly instead of being defaulted, since a silently mis-weighted
/// interaction would corrupt the fairness guarantees downstream.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("unknown interaction kind: {0}")]
    UnknownKind(String),
    #[error("unknown target scope: {0}")]
    UnknownScope(String),
    #[error("unknown relative grade: {0}")]
    UnknownGrade(String),
    #[error("invalid scoring configuration: {0}")]
    InvalidConfig(String),
}

/// Targeting breadth of a post: one campus, a handful, or a whole
/// regional cluster of campuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Single,
    Multi,
    Cluster,
}

impl Scope {
    pub const ALL: [Scope; 3] = [Scope::Single, Scope::Multi, Scope::Cluster];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Single => "single",
            Scope::Multi => "multi",
            Scope::Cluster => "cluster",
        }
    }
}

impl std::str::FromStr for Scope {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(Scope::Single),
            "multi" => Ok(Scope::Multi),
            "cluster" => Ok(Scope::Cluster),
            other => Err(DomainError::UnknownScope(other.to_string())),
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of countable interactions. `View` is ledgered for analytics
/// but carries no weight in scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionKind {
    Message,
    Repost,
    Share,
    Bookmark,
    View,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Message => "message",
            InteractionKind::Repost => "repost",
            InteractionKind::Share => "share",
            InteractionKind::Bookmark => "bookmark",
            InteractionKind::View => "view",
        }
    }

    /// Counter column updated when this kind is recorded; `View` bumps only
    /// the total interaction count.
    pub fn counter_column(&self) -> Option<&'static str> {
        match self {
            InteractionKind::Message => Some("message_count"),
            InteractionKind::Repost => Some("repost_count"),
            InteractionKind::Share => Some("share_count"),
            InteractionKind::Bookmark => Some("bookmark_count"),
            InteractionKind::View => None,
        }
    }
}

impl std::str::FromStr for InteractionKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "message" => Ok(InteractionKind::Message),
            "repost" => Ok(InteractionKind::Repost),
            "share" => Ok(InteractionKind::Share),
            "bookmark" => Ok(InteractionKind::Bookmark),
            "view" => Ok(InteractionKind::View),
            other => Err(DomainError::UnknownKind(other.to_string())),
        }
    }
}

impl std::fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Grade {
    A,
    B,
    C,
    D,
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
        }
    }
}

impl std::str::FromStr for Grade {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" => Ok(Grade::A),
            "B" => Ok(Grade::B),
            "C" => Ok(Grade::C),
            "D" => Ok(Grade::D),
            other => Err(DomainError::UnknownGrade(other.to_string())),
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Grades are only comparable within a market: posts sharing a scope, and
/// for cluster-wide posts, the same cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarketKey {
    pub scope: Scope,
    pub cluster_id: Option<Uuid>,
}

impl MarketKey {
    pub fn new(scope: Scope, cluster_id: Option<Uuid>) -> Self {
        // Cluster identity only partitions cluster-wide markets.
        let cluster_id = match scope {
            Scope::Cluster => cluster_id,
            _ => None,
        };
        MarketKey { scope, cluster_id }
    }
}

impl std::fmt::Display for MarketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.cluster_id {
            Some(cluster) => write!(f, "{}/{}", self.scope, cluster),
            None => f.write_str(self.scope.as_str()),
        }
    }
}

/// Categorical audience bucket stored on the post when targeting is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketSize {
    Small,
    Medium,
    Large,
    Massive,
}

impl MarketSize {
    pub fn from_campus_count(campus_count: i32) -> Self {
        match campus_count {
            i32::MIN..=1 => MarketSize::Small,
            2..=5 => MarketSize::Medium,
            6..=15 => MarketSize::Large,
            _ => MarketSize::Massive,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketSize::Small => "small",
            MarketSize::Medium => "medium",
            MarketSize::Large => "large",
            MarketSize::Massive => "massive",
        }
    }
}

impl std::fmt::Display for MarketSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-post interaction counters as read from the score store.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngagementCounts {
    pub messages: i64,
    pub reposts: i64,
    pub shares: i64,
    pub bookmarks: i64,
}

/// Externally owned score components the Composer treats as opaque.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInputs {
    pub base_score: f64,
    pub time_urgency_bonus: f64,
    pub review_score_bonus: f64,
}

/// The slice of a post the grading sweep needs.
#[derive(Debug, Clone, Copy)]
pub struct RankedPost {
    pub id: Uuid,
    pub final_score: f64,
}

/// Full scoring record for display and reporting.
#[derive(Debug, Clone)]
pub struct PostScores {
    pub id: Uuid,
    pub title: String,
    pub scope: Scope,
    pub cluster_id: Option<Uuid>,
    pub market_size: MarketSize,
    pub counts: EngagementCounts,
    pub engagement_score: f64,
    pub base_score: f64,
    pub time_urgency_bonus: f64,
    pub review_score_bonus: f64,
    pub final_score: f64,
    pub relative_grade: Option<Grade>,
    pub last_interaction_at: Option<DateTime<Utc>>,
    pub interaction_count: i32,
}

impl PostScores {
    pub fn market_key(&self) -> MarketKey {
        MarketKey::new(self.scope, self.cluster_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn scope_round_trips_through_str() {
        for scope in Scope::ALL {
            assert_eq!(Scope::from_str(scope.as_str()).unwrap(), scope);
        }
    }

    #[test]
    fn unknown_scope_is_rejected() {
        assert!(Scope::from_str("galaxy").is_err());
        assert!(Scope::from_str("").is_err());
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(InteractionKind::from_str("like").is_err());
    }

    #[test]
    fn view_has_no_weighted_counter() {
        assert_eq!(InteractionKind::View.counter_column(), None);
        assert_eq!(
            InteractionKind::Message.counter_column(),
            Some("message_count")
        );
    }

    #[test]
    fn market_key_ignores_cluster_outside_cluster_scope() {
        let cluster = Uuid::new_v4();
        let key = MarketKey::new(Scope::Single, Some(cluster));
        assert_eq!(key.cluster_id, None);
        let key = MarketKey::new(Scope::Cluster, Some(cluster));
        assert_eq!(key.cluster_id, Some(cluster));
    }

    #[test]
    fn market_size_buckets_follow_campus_count() {
        assert_eq!(MarketSize::from_campus_count(1), MarketSize::Small);
        assert_eq!(MarketSize::from_campus_count(2), MarketSize::Medium);
        assert_eq!(MarketSize::from_campus_count(5), MarketSize::Medium);
        assert_eq!(MarketSize::from_campus_count(6), MarketSize::Large);
        assert_eq!(MarketSize::from_campus_count(15), MarketSize::Large);
        assert_eq!(MarketSize::from_campus_count(16), MarketSize::Massive);
    }
}
