use std::str::FromStr;

use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::config::ScoringConfig;
use crate::engagement;
use crate::grading;
use crate::models::{
    EngagementCounts, Grade, InteractionKind, MarketKey, MarketSize, PostScores, RankedPost,
    Scope, ScoreInputs,
};
use crate::normalize;
use crate::score;

/// Outcome of a ledger write. A duplicate is a successful no-op, not an
/// error: a user spamming the same action must not inflate a post's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    AlreadyRecorded,
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Initialize scoring fields for a new post. Called by the authoring
/// subsystem at creation time; the post starts at its base score.
pub async fn create_post(
    pool: &PgPool,
    config: &ScoringConfig,
    id: Uuid,
    title: &str,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO engagement_grading.posts (id, title, base_score, final_score)
        VALUES ($1, $2, $3, $3)
        "#,
    )
    .bind(id)
    .bind(title)
    .bind(config.default_base_score)
    .execute(pool)
    .await
    .context("failed to initialize post scoring fields")?;
    Ok(())
}

/// Set a post's targeting once the authoring subsystem decides it. The
/// market-size bucket is derived from the audience, and scores are
/// recomputed because the normalization calibration changed with the scope.
pub async fn set_post_scope(
    pool: &PgPool,
    config: &ScoringConfig,
    post_id: Uuid,
    scope: Scope,
    campus_count: i32,
    cluster_id: Option<Uuid>,
) -> anyhow::Result<()> {
    let key = MarketKey::new(scope, cluster_id);
    let market_size = MarketSize::from_campus_count(campus_count.max(1));

    let mut tx = pool.begin().await?;
    let updated = sqlx::query(
        r#"
        UPDATE engagement_grading.posts
        SET target_scope = $1, cluster_id = $2, campus_count = $3, market_size = $4
        WHERE id = $5
        "#,
    )
    .bind(scope.as_str())
    .bind(key.cluster_id)
    .bind(campus_count.max(1))
    .bind(market_size.as_str())
    .bind(post_id)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        anyhow::bail!("post {post_id} not found");
    }

    recompute_post_scores(&mut tx, config, post_id).await?;
    tx.commit().await?;
    Ok(())
}

/// Append one interaction to the ledger, idempotently.
///
/// The uniqueness constraint on (post_id, user_id, interaction_kind) is the
/// sole concurrency control: of any number of concurrent attempts exactly
/// one inserts, and only that one increments the post counters. Counter
/// update and score recompute share the insert's transaction, so there is
/// no window for lost updates between two users hitting the same post.
pub async fn record_interaction(
    pool: &PgPool,
    config: &ScoringConfig,
    post_id: Uuid,
    user_id: Uuid,
    kind: InteractionKind,
) -> anyhow::Result<RecordOutcome> {
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO engagement_grading.post_interactions (post_id, user_id, interaction_kind)
        VALUES ($1, $2, $3)
        ON CONFLICT (post_id, user_id, interaction_kind) DO NOTHING
        "#,
    )
    .bind(post_id)
    .bind(user_id)
    .bind(kind.as_str())
    .execute(&mut *tx)
    .await
    .context("failed to append to interaction ledger")?;

    if inserted.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(RecordOutcome::AlreadyRecorded);
    }

    // Views are ledgered for analytics only; they bump the interaction
    // total but no weighted counter.
    let update = match kind.counter_column() {
        Some(column) => format!(
            "UPDATE engagement_grading.posts \
             SET {column} = {column} + 1, \
                 interaction_count = interaction_count + 1, \
                 last_interaction_at = NOW() \
             WHERE id = $1"
        ),
        None => "UPDATE engagement_grading.posts \
                 SET interaction_count = interaction_count + 1, \
                     last_interaction_at = NOW() \
                 WHERE id = $1"
            .to_string(),
    };
    let updated = sqlx::query(&update).bind(post_id).execute(&mut *tx).await?;
    if updated.rows_affected() == 0 {
        anyhow::bail!("post {post_id} not found");
    }

    recompute_post_scores(&mut tx, config, post_id).await?;
    tx.commit().await?;
    Ok(RecordOutcome::Recorded)
}

/// Administrative correction: withdraw a previously recorded interaction.
/// Counters never go below zero even if the ledger and counters have
/// drifted.
pub async fn remove_interaction(
    pool: &PgPool,
    config: &ScoringConfig,
    post_id: Uuid,
    user_id: Uuid,
    kind: InteractionKind,
) -> anyhow::Result<bool> {
    let mut tx = pool.begin().await?;

    let deleted = sqlx::query(
        r#"
        DELETE FROM engagement_grading.post_interactions
        WHERE post_id = $1 AND user_id = $2 AND interaction_kind = $3
        "#,
    )
    .bind(post_id)
    .bind(user_id)
    .bind(kind.as_str())
    .execute(&mut *tx)
    .await?;

    if deleted.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    let update = match kind.counter_column() {
        Some(column) => format!(
            "UPDATE engagement_grading.posts \
             SET {column} = GREATEST({column} - 1, 0), \
                 interaction_count = GREATEST(interaction_count - 1, 0) \
             WHERE id = $1"
        ),
        None => "UPDATE engagement_grading.posts \
                 SET interaction_count = GREATEST(interaction_count - 1, 0) \
                 WHERE id = $1"
            .to_string(),
    };
    sqlx::query(&update).bind(post_id).execute(&mut *tx).await?;

    recompute_post_scores(&mut tx, config, post_id).await?;
    tx.commit().await?;
    Ok(true)
}

/// Review-subsystem write. The values are opaque to the Composer; only the
/// recompute cares that the bonus changed.
pub async fn set_review_scores(
    pool: &PgPool,
    config: &ScoringConfig,
    post_id: Uuid,
    review_count: i32,
    average_rating: f64,
    review_score_bonus: f64,
) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;
    let updated = sqlx::query(
        r#"
        UPDATE engagement_grading.posts
        SET review_count = $1, average_rating = $2, review_score_bonus = $3
        WHERE id = $4
        "#,
    )
    .bind(review_count)
    .bind(average_rating)
    .bind(review_score_bonus)
    .bind(post_id)
    .execute(&mut *tx)
    .await?;
    if updated.rows_affected() == 0 {
        anyhow::bail!("post {post_id} not found");
    }
    recompute_post_scores(&mut tx, config, post_id).await?;
    tx.commit().await?;
    Ok(())
}

/// Recompute engagement and final score from the post's current counters,
/// inside the caller's transaction. The engagement score is always the
/// normalizer's output for the stored counters and scope, never hand-edited,
/// and the final score is a pure function of its persisted parts.
async fn recompute_post_scores(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    config: &ScoringConfig,
    post_id: Uuid,
) -> anyhow::Result<()> {
    let row = sqlx::query(
        r#"
        SELECT target_scope, message_count, repost_count, share_count, bookmark_count,
               base_score, time_urgency_bonus, review_score_bonus
        FROM engagement_grading.posts
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(post_id)
    .fetch_one(&mut **tx)
    .await
    .with_context(|| format!("post {post_id} not found for score recompute"))?;

    let scope = Scope::from_str(row.get::<&str, _>("target_scope"))?;
    let counts = EngagementCounts {
        messages: row.get::<i32, _>("message_count") as i64,
        reposts: row.get::<i32, _>("repost_count") as i64,
        shares: row.get::<i32, _>("share_count") as i64,
        bookmarks: row.get::<i32, _>("bookmark_count") as i64,
    };
    let inputs = ScoreInputs {
        base_score: row.get("base_score"),
        time_urgency_bonus: row.get("time_urgency_bonus"),
        review_score_bonus: row.get("review_score_bonus"),
    };

    let raw = engagement::raw_impact(&counts, &config.weights);
    let engagement_score = normalize::engagement_score(raw, scope, config);
    let final_score = score::final_score(&inputs, engagement_score, config);

    sqlx::query(
        r#"
        UPDATE engagement_grading.posts
        SET engagement_score = $1, final_score = $2
        WHERE id = $3
        "#,
    )
    .bind(engagement_score)
    .bind(final_score)
    .bind(post_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Maintenance path: recompute scores for every active post.
pub async fn recompute_all_scores(pool: &PgPool, config: &ScoringConfig) -> anyhow::Result<usize> {
    let rows = sqlx::query("SELECT id FROM engagement_grading.posts WHERE is_active")
        .fetch_all(pool)
        .await?;

    let mut updated = 0usize;
    for row in rows {
        let post_id: Uuid = row.get("id");
        let mut tx = pool.begin().await?;
        recompute_post_scores(&mut tx, config, post_id).await?;
        tx.commit().await?;
        updated += 1;
    }
    Ok(updated)
}

/// Distinct market keys currently holding active posts.
pub async fn fetch_market_keys(pool: &PgPool) -> anyhow::Result<Vec<MarketKey>> {
    let rows = sqlx::query(
        r#"
        SELECT DISTINCT target_scope, cluster_id
        FROM engagement_grading.posts
        WHERE is_active
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut keys = Vec::with_capacity(rows.len());
    for row in rows {
        let scope = Scope::from_str(row.get::<&str, _>("target_scope"))?;
        keys.push(MarketKey::new(scope, row.get("cluster_id")));
    }
    Ok(keys)
}

/// Grade one market, all-or-nothing.
///
/// The whole sweep runs in a single transaction holding a per-market
/// advisory lock, so two sweeps of the same market cannot interleave and a
/// failure leaves no partially-graded market behind. Inactive posts are
/// excluded and keep their last grade for historical display. Because every
/// pass reads each active post under its current market key, a post whose
/// scope changed is regraded against its new market on the next sweep.
pub async fn sweep_market(
    pool: &PgPool,
    config: &ScoringConfig,
    key: &MarketKey,
) -> anyhow::Result<usize> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(grading::market_lock_key(key))
        .execute(&mut *tx)
        .await?;

    let rows = sqlx::query(
        r#"
        SELECT id, final_score
        FROM engagement_grading.posts
        WHERE is_active AND target_scope = $1 AND cluster_id IS NOT DISTINCT FROM $2
        "#,
    )
    .bind(key.scope.as_str())
    .bind(key.cluster_id)
    .fetch_all(&mut *tx)
    .await?;

    let posts: Vec<RankedPost> = rows
        .iter()
        .map(|row| RankedPost {
            id: row.get("id"),
            final_score: row.get("final_score"),
        })
        .collect();

    let assigned = grading::assign_grades(&posts, config);
    for (post_id, grade) in &assigned {
        sqlx::query("UPDATE engagement_grading.posts SET relative_grade = $1 WHERE id = $2")
            .bind(grade.as_str())
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(assigned.len())
}

/// Sweep every market. A failed market is logged and skipped; it never
/// blocks the others.
pub async fn sweep_all_markets(
    pool: &PgPool,
    config: &ScoringConfig,
) -> anyhow::Result<Vec<(MarketKey, usize)>> {
    let keys = fetch_market_keys(pool).await?;
    let mut swept = Vec::with_capacity(keys.len());

    for key in keys {
        match sweep_market(pool, config, &key).await {
            Ok(graded) => {
                tracing::info!(market = %key, graded, "market sweep complete");
                swept.push((key, graded));
            }
            Err(error) => {
                tracing::error!(market = %key, %error, "market sweep failed, skipping");
            }
        }
    }
    Ok(swept)
}

/// All active posts with their full scoring records, best first.
pub async fn fetch_active_posts(pool: &PgPool) -> anyhow::Result<Vec<PostScores>> {
    let rows = sqlx::query(
        r#"
        SELECT id, title, target_scope, cluster_id, market_size,
               message_count, repost_count, share_count, bookmark_count,
               engagement_score, base_score, time_urgency_bonus, review_score_bonus,
               final_score, relative_grade, last_interaction_at, interaction_count
        FROM engagement_grading.posts
        WHERE is_active
        ORDER BY final_score DESC, id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut posts = Vec::with_capacity(rows.len());
    for row in rows {
        let scope = Scope::from_str(row.get::<&str, _>("target_scope"))?;
        let market_size = match row.get::<&str, _>("market_size") {
            "small" => MarketSize::Small,
            "medium" => MarketSize::Medium,
            "large" => MarketSize::Large,
            "massive" => MarketSize::Massive,
            other => anyhow::bail!("unknown market size in store: {other}"),
        };
        let relative_grade = row
            .get::<Option<String>, _>("relative_grade")
            .map(|value| Grade::from_str(&value))
            .transpose()?;

        posts.push(PostScores {
            id: row.get("id"),
            title: row.get("title"),
            scope,
            cluster_id: row.get("cluster_id"),
            market_size,
            counts: EngagementCounts {
                messages: row.get::<i32, _>("message_count") as i64,
                reposts: row.get::<i32, _>("repost_count") as i64,
                shares: row.get::<i32, _>("share_count") as i64,
                bookmarks: row.get::<i32, _>("bookmark_count") as i64,
            },
            engagement_score: row.get("engagement_score"),
            base_score: row.get("base_score"),
            time_urgency_bonus: row.get("time_urgency_bonus"),
            review_score_bonus: row.get("review_score_bonus"),
            final_score: row.get("final_score"),
            relative_grade,
            last_interaction_at: row.get::<Option<DateTime<Utc>>, _>("last_interaction_at"),
            interaction_count: row.get("interaction_count"),
        });
    }
    Ok(posts)
}

/// Bulk interaction backfill from CSV, for operational use. Rows are fed
/// through the same idempotent ledger path as live traffic.
pub async fn import_interactions_csv(
    pool: &PgPool,
    config: &ScoringConfig,
    csv_path: &std::path::Path,
) -> anyhow::Result<(usize, usize)> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        post_id: Uuid,
        user_id: Uuid,
        interaction_kind: String,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;
    let mut duplicates = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let kind = InteractionKind::from_str(&row.interaction_kind)?;
        match record_interaction(pool, config, row.post_id, row.user_id, kind).await? {
            RecordOutcome::Recorded => inserted += 1,
            RecordOutcome::AlreadyRecorded => duplicates += 1,
        }
    }
    Ok((inserted, duplicates))
}

/// Load realistic seed data: a handful of posts across all three scopes,
/// with interactions routed through the real ledger path.
pub async fn seed(pool: &PgPool, config: &ScoringConfig) -> anyhow::Result<()> {
    let cluster = Uuid::parse_str("7e9f2a41-11c8-4a6f-9d35-2f8b6a0c4e19")?;
    let posts = [
        (
            Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?,
            "Textbook bundle: intro economics",
            Scope::Single,
            1,
            None,
        ),
        (
            Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?,
            "Dorm fridge, barely used",
            Scope::Single,
            1,
            None,
        ),
        (
            Uuid::parse_str("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2")?,
            "Ride share to the coast, 4 seats",
            Scope::Multi,
            4,
            None,
        ),
        (
            Uuid::parse_str("a1b2c3d4-5e6f-4a8b-9c0d-1e2f3a4b5c6d")?,
            "Spring concert tickets, pair",
            Scope::Cluster,
            18,
            Some(cluster),
        ),
    ];

    for (id, title, scope, campus_count, cluster_id) in posts {
        let existing = sqlx::query("SELECT id FROM engagement_grading.posts WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        if existing.is_none() {
            create_post(pool, config, id, title).await?;
        }
        set_post_scope(pool, config, id, scope, campus_count, cluster_id).await?;
    }

    let interactions = [
        ("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2", 0u32, InteractionKind::Message, 6),
        ("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2", 100, InteractionKind::Bookmark, 4),
        ("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc", 200, InteractionKind::Share, 3),
        ("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2", 300, InteractionKind::Message, 12),
        ("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2", 400, InteractionKind::Repost, 5),
        ("a1b2c3d4-5e6f-4a8b-9c0d-1e2f3a4b5c6d", 500, InteractionKind::Message, 20),
        ("a1b2c3d4-5e6f-4a8b-9c0d-1e2f3a4b5c6d", 600, InteractionKind::View, 9),
    ];

    for (post, user_base, kind, count) in interactions {
        let post_id = Uuid::parse_str(post)?;
        for offset in 0..count {
            let user_id = Uuid::from_u128(0x5eed_0000_0000_0000_0000u128 + (user_base + offset) as u128);
            record_interaction(pool, config, post_id, user_id, kind).await?;
        }
    }

    Ok(())
}
