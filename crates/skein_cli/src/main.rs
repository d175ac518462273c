use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Days;
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use tracing::info;

use skein_core::config::{self, SkeinConfig};
use skein_core::state::utc_today;
use skein_core::text::{Block, WorkDocument, post_chunks};
use skein_core::{BskyClient, DirCorpus, JpegCompressor, RunResult, Runner, StateStore};
use skein_db::StateDb;

#[derive(Parser)]
#[command(name = "skein")]
#[command(about = "Threaded posting and mention replies for a Bluesky bot")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(long, short = 'c', env = "SKEIN_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish one random work document as a thread
    Post,
    /// Answer new mentions once
    Mentions,
    /// Show how a work document would be split, without posting
    Preview {
        /// Work document to segment
        file: PathBuf,
    },
    /// Stop replying to these actors
    Ignore {
        #[arg(required = true)]
        dids: Vec<String>,
    },
    /// Resume replying to an actor
    Unignore { did: String },
    /// List ignored actors
    Ignored,
    /// Show how much state the bot keeps
    Status,
    /// Drop per-day mention records older than the retention window
    Prune {
        /// Days to keep (defaults to mentions.retention_days)
        #[arg(long)]
        keep_days: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .rgb_colors(miette::RgbColors::Preferred)
                .with_cause_chain()
                .context_lines(3)
                .build(),
        )
    }))?;
    miette::set_panic_hook();
    let cli = Cli::parse();

    use tracing_appender::rolling;
    use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("skein")
        .join("logs");
    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = rolling::daily(&log_dir, "skein.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = if cli.debug {
        EnvFilter::new("skein_core=debug,skein_db=debug,skein_cli=debug,skein=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("skein_core=info,skein_db=info,skein_cli=info,skein=info,warn")
        })
    };

    // stdout carries the run result; logs go to stderr
    let terminal_layer = if cli.debug {
        fmt::layer()
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .pretty()
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .compact()
            .boxed()
    };

    let file_env_filter =
        EnvFilter::new("skein_core=debug,skein_db=debug,skein_cli=debug,skein=info,info");
    let file_layer = fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_ansi(false)
        .with_writer(non_blocking);

    tracing_subscriber::registry()
        .with(terminal_layer.with_filter(env_filter))
        .with(file_layer.with_filter(file_env_filter))
        .init();

    info!(
        "Logging initialized. Logs are being written to: {:?}",
        log_dir.join("skein.log")
    );

    let config = if let Some(config_path) = &cli.config {
        info!("Loading config from: {:?}", config_path);
        config::load_config(config_path).await?
    } else {
        info!("Loading config from standard locations");
        config::load_config_from_standard_locations().await?
    };

    match cli.command {
        Commands::Post => {
            let result = runner(&config).run_auto_post().await;
            report(&result)
        }
        Commands::Mentions => {
            let state = Arc::new(StateDb::open(&config.state.path).await?);
            let result = runner(&config).run_mentions(state.clone()).await;
            state.close().await;
            report(&result)
        }
        Commands::Preview { file } => {
            preview(&file, &config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Ignore { dids } => {
            let state = StateDb::open(&config.state.path).await?;
            let added = state.add_ignored(&dids).await?;
            println!("Ignored {} new actor(s)", added);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Unignore { did } => {
            let state = StateDb::open(&config.state.path).await?;
            if state.remove_ignored(&did).await? {
                println!("{} removed from the ignore list", did);
            } else {
                println!("{} was not ignored", did);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Ignored => {
            let state = StateDb::open(&config.state.path).await?;
            for did in state.list_ignored().await? {
                println!("{}", did);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Prune { keep_days } => {
            let keep = keep_days.unwrap_or(config.mentions.retention_days);
            let cutoff = utc_today()
                .checked_sub_days(Days::new(keep.into()))
                .ok_or_else(|| miette::miette!("keep-days {} is out of range", keep))?;
            let state = StateDb::open(&config.state.path).await?;
            let removed = state.prune_before(cutoff).await?;
            println!("Removed {} record(s) from before {}", removed, cutoff);
            let stats = state.stats().await?;
            println!("{} day(s) of mention records remain", stats.tracked_days);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Status => {
            let state = StateDb::open(&config.state.path).await?;
            let stats = state.stats().await?;
            println!("State file:     {}", config.state.path.display());
            println!("Processed:      {}", stats.processed_count);
            println!("Ignored actors: {}", stats.ignored_count);
            println!("Tracked days:   {}", stats.tracked_days);
            state.close().await;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn runner(config: &SkeinConfig) -> Runner {
    Runner::new(
        config.clone(),
        Arc::new(BskyClient::new(&config.account.service)),
        Arc::new(DirCorpus::new(config.corpus.root.clone())),
        Arc::new(JpegCompressor),
    )
}

fn report(result: &RunResult) -> Result<ExitCode> {
    println!("{}", serde_json::to_string(result).into_diagnostic()?);
    Ok(if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn preview(path: &Path, config: &SkeinConfig) -> Result<()> {
    let raw = tokio::fs::read_to_string(path).await.into_diagnostic()?;
    let title = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled");
    let document = WorkDocument::parse(title, &raw);
    let max_len = config.posting.max_chunk_len;

    println!("# {}", document.title);
    if let Some(head) = &document.head {
        println!("\n[head]\n{}", head);
    }
    for (i, block) in document.body.iter().enumerate() {
        match block {
            Block::Text { content } => {
                for (j, text) in post_chunks(content, max_len).iter().enumerate() {
                    println!(
                        "\n[body {}.{}] {} chars\n{}",
                        i,
                        j,
                        text.chars().count(),
                        text
                    );
                }
            }
            Block::Image { reference } => {
                println!("\n[body {}] image {}", i, reference);
            }
        }
    }
    if let Some(closing) = &document.closing {
        println!("\n[closing]\n{}", closing);
    }
    Ok(())
}
