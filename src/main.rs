use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod config;
mod db;
mod engagement;
mod grading;
mod models;
mod normalize;
mod report;
mod score;

use config::ScoringConfig;
use models::{InteractionKind, Scope};

#[derive(Parser)]
#[command(name = "engagement-grader")]
#[command(about = "Engagement normalization and relative grading engine for campus marketplace posts", long_about = None)]
struct Cli {
    /// Optional JSON calibration table overriding the built-in defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Initialize scoring fields for a new post
    CreatePost {
        #[arg(long)]
        id: Option<Uuid>,
        #[arg(long)]
        title: String,
    },
    /// Set a post's targeting scope and derive its market size
    SetScope {
        #[arg(long)]
        post: Uuid,
        #[arg(long)]
        scope: Scope,
        #[arg(long, default_value_t = 1)]
        campuses: i32,
        #[arg(long)]
        cluster: Option<Uuid>,
    },
    /// Record a user interaction against a post (idempotent)
    Record {
        #[arg(long)]
        post: Uuid,
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        kind: InteractionKind,
    },
    /// Withdraw a previously recorded interaction (administrative correction)
    Remove {
        #[arg(long)]
        post: Uuid,
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        kind: InteractionKind,
    },
    /// Write review aggregates for a post (review subsystem hook)
    SetReview {
        #[arg(long)]
        post: Uuid,
        #[arg(long)]
        count: i32,
        #[arg(long)]
        rating: f64,
        #[arg(long)]
        bonus: f64,
    },
    /// Import interactions from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Recompute engagement and final scores for all active posts
    Recompute,
    /// Run the relative grading sweep over every market now
    Grade,
    /// Generate a markdown grade-distribution report
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let scoring = match &cli.config {
        Some(path) => ScoringConfig::from_json_file(path)
            .with_context(|| format!("invalid calibration file {}", path.display()))?,
        None => {
            let config = ScoringConfig::default();
            config.validate()?;
            config
        }
    };

    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool, &scoring).await?;
            println!("Seed data inserted.");
        }
        Commands::CreatePost { id, title } => {
            let post_id = id.unwrap_or_else(Uuid::new_v4);
            db::create_post(&pool, &scoring, post_id, &title).await?;
            println!("Post {post_id} initialized at base score {}.", scoring.default_base_score);
        }
        Commands::SetScope {
            post,
            scope,
            campuses,
            cluster,
        } => {
            db::set_post_scope(&pool, &scoring, post, scope, campuses, cluster).await?;
            println!("Post {post} targeting set to {scope} ({campuses} campuses).");
        }
        Commands::Record { post, user, kind } => {
            match db::record_interaction(&pool, &scoring, post, user, kind).await? {
                db::RecordOutcome::Recorded => {
                    println!("Recorded {kind} on post {post}.");
                }
                db::RecordOutcome::AlreadyRecorded => {
                    println!("Already recorded; counters unchanged.");
                }
            }
        }
        Commands::Remove { post, user, kind } => {
            if db::remove_interaction(&pool, &scoring, post, user, kind).await? {
                println!("Removed {kind} from post {post}.");
            } else {
                println!("No such interaction recorded.");
            }
        }
        Commands::SetReview {
            post,
            count,
            rating,
            bonus,
        } => {
            db::set_review_scores(&pool, &scoring, post, count, rating, bonus).await?;
            println!("Review scores updated for post {post}.");
        }
        Commands::Import { csv } => {
            let (inserted, duplicates) =
                db::import_interactions_csv(&pool, &scoring, &csv).await?;
            println!(
                "Imported {inserted} interactions from {} ({duplicates} duplicates skipped).",
                csv.display()
            );
        }
        Commands::Recompute => {
            let updated = db::recompute_all_scores(&pool, &scoring).await?;
            println!("Recomputed scores for {updated} posts.");
        }
        Commands::Grade => {
            let swept = db::sweep_all_markets(&pool, &scoring).await?;
            if swept.is_empty() {
                println!("No active markets to grade.");
            } else {
                for (market, graded) in swept {
                    println!("- {market}: graded {graded} posts");
                }
            }
        }
        Commands::Report { out } => {
            let posts = db::fetch_active_posts(&pool).await?;
            let report = report::build_report(&posts);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
