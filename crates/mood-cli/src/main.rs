use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use url::Url;

use mood_core::config::{DEFAULT_LATEST_LIMIT, DEFAULT_REQUEST_TIMEOUT};
use mood_core::{Session, SyncConfig};
use mood_db::SqliteStore;
use mood_storage::{HttpObjectStorage, LocalObjectStorage, TempStaging};
use mood_types::models::UserId;
use mood_types::remote::ObjectStorage;

mod commands;

/// Command-line client for paired mood posting
#[derive(Parser, Debug)]
#[command(name = "mood")]
#[command(version)]
struct Args {
    /// Identity of the signed-in user
    #[arg(short, long, env = "MOOD_IDENTITY")]
    identity: String,

    /// SQLite file backing the document store
    #[arg(long, default_value = "mood.db", env = "MOOD_DB_PATH")]
    db_path: PathBuf,

    /// Directory for reaction objects when no remote endpoint is set
    #[arg(long, default_value = "objects", env = "MOOD_OBJECT_DIR")]
    object_dir: PathBuf,

    /// Scratch directory for media on its way to storage
    #[arg(long, env = "MOOD_STAGING_DIR")]
    staging_dir: Option<PathBuf>,

    /// Base URL served in front of the object directory
    #[arg(long, env = "MOOD_PUBLIC_BASE_URL")]
    public_base_url: Option<Url>,

    /// Remote object storage endpoint; enables HTTP uploads
    #[arg(long, env = "MOOD_OBJECT_ENDPOINT", requires = "object_bucket")]
    object_endpoint: Option<Url>,

    #[arg(long, env = "MOOD_OBJECT_BUCKET")]
    object_bucket: Option<String>,

    #[arg(long, env = "MOOD_OBJECT_TOKEN", hide_env_values = true)]
    object_token: Option<String>,

    /// Seconds before any remote call is abandoned
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs(), env = "MOOD_TIMEOUT_SECS")]
    timeout_secs: u64,

    /// Size of the "latest" timelines
    #[arg(long, default_value_t = DEFAULT_LATEST_LIMIT, env = "MOOD_LATEST_LIMIT")]
    latest_limit: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the signed-in profile
    Profile,
    /// Latest moods of self and partner
    Overview,
    /// Every mood of one uploader
    All { uploader: String },
    /// Every mood of every uploader
    Feed,
    /// Post a mood with a reaction from the partner's media
    Post { emoji: String, caption: String },
    /// Delete a mood by id
    Delete { id: String },
    /// Show the reaction gallery
    Reactions,
    /// Upload a reaction asset for an emoji
    Upload { emoji: String, file: PathBuf },
    /// Remove a media URL from an emoji's reactions
    RemoveMedia { emoji: String, url: String },
    /// Write the signed-in user's profile document
    SeedProfile {
        #[arg(long)]
        username: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, default_value = "")]
        partner: String,
        #[arg(long)]
        partner_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr so command output stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mood=info,mood_core=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = SyncConfig {
        latest_limit: args.latest_limit,
        request_timeout: Duration::from_secs(args.timeout_secs),
        ..SyncConfig::default()
    };

    let store = Arc::new(
        SqliteStore::open(&args.db_path)
            .with_context(|| format!("open {}", args.db_path.display()))?,
    );
    let staging = Arc::new(match &args.staging_dir {
        Some(dir) => TempStaging::new(dir.clone()).await?,
        None => TempStaging::in_temp_dir().await?,
    });
    let identity = UserId::new(args.identity.clone());
    info!("Signed in as {} ({})", identity, args.db_path.display());

    match (&args.object_endpoint, &args.object_bucket) {
        (Some(endpoint), Some(bucket)) => {
            info!("Object storage: {} bucket {}", endpoint, bucket);
            let objects =
                HttpObjectStorage::new(endpoint.clone(), bucket.clone(), args.object_token.clone());
            run(identity, store, objects, staging, config, args.command).await
        }
        _ => {
            let objects =
                LocalObjectStorage::new(args.object_dir.clone(), args.public_base_url.clone())
                    .await?;
            run(identity, store, objects, staging, config, args.command).await
        }
    }
}

async fn run<O: ObjectStorage>(
    identity: UserId,
    store: Arc<SqliteStore>,
    objects: O,
    staging: Arc<TempStaging>,
    config: SyncConfig,
    command: Command,
) -> Result<()> {
    let session = Session::new(identity, store, Arc::new(objects), staging, config);
    let output = commands::execute(&session, command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
