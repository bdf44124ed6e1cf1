//! Binary entry point for the nugs mirror CLI.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use nugs::api::{ArtistMetaService, NugsClient};
use nugs::cache::CacheStore;
use nugs::catalog::{analyze, catalog_update, AnalyzerDeps};
use nugs::config::Config;
use nugs::contracts::{DefaultMediaClassifier, LogNotifier, ProgressSink};
use nugs::error::{NugsError, Result};
use nugs::exec::CommandDownloader;
use nugs::gapfill::{fill, GapFillDeps};
use nugs::model::{ArtistCatalogAnalysis, BatchProgress, GapFillResult, MediaType, StreamParams};
use nugs::names::artist_index_key;
use nugs::remote::{RcloneStorage, StorageProvider, UploadHooks, UploadRequest};
use nugs::watch::{self, WatchDeps};

#[derive(Parser, Debug)]
#[command(
    name = "nugs",
    version,
    about = "Mirror a concert catalog to local and remote storage",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        help = "Config file (default: ~/.config/nugs/config.toml)"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[arg(
        long,
        global = true,
        default_value = "info",
        help = "Log level when NUGS_LOG is unset"
    )]
    log: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the catalog and refresh the local cache
    Update,
    /// Report which of an artist's shows are stored and which are missing
    Analyze {
        /// Artist ID or name (resolved through the cached artists index)
        artist: String,
        #[arg(long, value_enum, help = "Media tier to consider")]
        media: Option<MediaArg>,
    },
    /// Download every missing show for an artist
    Fill {
        artist: String,
        #[arg(long, value_enum, help = "Media tier to consider")]
        media: Option<MediaArg>,
        #[arg(long, help = "Audio format passed to the downloader")]
        audio_format: Option<String>,
        #[arg(long, help = "Video format passed to the downloader")]
        video_format: Option<String>,
    },
    /// Manage and run the watched-artists loop
    Watch {
        #[command(subcommand)]
        command: WatchCommand,
    },
    /// Mirror a local album folder to the remote
    Upload {
        path: PathBuf,
        artist_folder: String,
        #[arg(long, help = "Target the video tier")]
        video: bool,
    },
    /// Show cache freshness and remote reachability
    Status,
}

#[derive(Subcommand, Debug)]
enum WatchCommand {
    /// Add an artist ID to the watch list
    Add { artist_id: String },
    /// Remove an artist ID from the watch list
    Remove { artist_id: String },
    /// Print the watch list
    List,
    /// Run one watch cycle
    Check {
        #[arg(long, value_enum, help = "Media tier to consider")]
        media: Option<MediaArg>,
    },
    /// Run watch cycles until interrupted
    Daemon {
        #[arg(long, value_enum, help = "Media tier to consider")]
        media: Option<MediaArg>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum MediaArg {
    Audio,
    Video,
    Both,
}

impl MediaArg {
    fn media(arg: Option<MediaArg>) -> MediaType {
        match arg {
            Some(MediaArg::Audio) => MediaType::Audio,
            Some(MediaArg::Video) => MediaType::Video,
            Some(MediaArg::Both) => MediaType::Both,
            None => MediaType::Unknown,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = nugs::logging::init(&cli.log) {
        eprintln!("error: {err}");
        return ExitCode::FAILURE;
    }
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(NugsError::Cancelled) => {
            eprintln!("cancelled");
            ExitCode::from(130)
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut cfg = Config::load(cli.config)?;
    let json_mode = matches!(cli.format, OutputFormat::Json);
    let ctx = CancellationToken::new();
    tokio::spawn({
        let ctx = ctx.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                ctx.cancel();
            }
        }
    });

    match cli.command {
        Command::Update => {
            let store = CacheStore::open_default()?;
            let client = NugsClient::from_config(&cfg)?;
            let report = catalog_update(&ctx, &store, &client).await?;
            if json_mode {
                println!("{}", serde_json::to_string_pretty(&report.to_json())?);
            } else {
                print!("{}", report.render_text());
            }
        }
        Command::Analyze { artist, media } => {
            let store = CacheStore::open_default()?;
            let client = NugsClient::from_config(&cfg)?;
            let artist_id = resolve_artist(&store, &artist)?;
            let meta = ArtistMetaService::new(client, store);
            let storage = RcloneStorage;
            let classifier = DefaultMediaClassifier;
            let deps = AnalyzerDeps {
                meta: &meta,
                storage: &storage,
                classifier: &classifier,
            };
            let analysis = analyze(
                &ctx,
                artist_id,
                &cfg,
                MediaArg::media(media),
                json_mode,
                &deps,
            )
            .await?;
            if json_mode {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            } else {
                print!("{}", render_analysis(&analysis));
            }
        }
        Command::Fill {
            artist,
            media,
            audio_format,
            video_format,
        } => {
            let store = CacheStore::open_default()?;
            let client = NugsClient::from_config(&cfg)?;
            let artist_id = resolve_artist(&store, &artist)?;
            let meta = ArtistMetaService::new(client, store);
            let storage = RcloneStorage;
            let classifier = DefaultMediaClassifier;
            let downloader = CommandDownloader;
            let progress = BatchBar::default();
            let deps = GapFillDeps {
                meta: &meta,
                storage: &storage,
                classifier: &classifier,
                downloader: &downloader,
                progress: &progress,
            };
            let params = StreamParams {
                audio_format,
                video_format,
            };
            let result = fill(
                &ctx,
                artist_id,
                &cfg,
                &params,
                MediaArg::media(media),
                json_mode,
                &deps,
            )
            .await?;
            if json_mode {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print!("{}", render_gap_fill(&result));
            }
        }
        Command::Watch { command } => match command {
            WatchCommand::Add { artist_id } => {
                cfg.add_watched(&artist_id)?;
                let path = cfg.persist()?;
                println!("watching artist {artist_id} ({})", path.display());
            }
            WatchCommand::Remove { artist_id } => {
                cfg.remove_watched(&artist_id)?;
                let path = cfg.persist()?;
                println!("stopped watching artist {artist_id} ({})", path.display());
            }
            WatchCommand::List => {
                if cfg.watched_artists.is_empty() {
                    println!("no watched artists");
                }
                for artist_id in &cfg.watched_artists {
                    println!("{artist_id}");
                }
            }
            WatchCommand::Check { media } => {
                let outcome = run_watch_cycle(&ctx, &cfg, media, json_mode, false).await?;
                if json_mode {
                    println!("{}", serde_json::to_string_pretty(&watch_json(&outcome))?);
                } else {
                    print!("{}", render_watch(&outcome));
                }
            }
            WatchCommand::Daemon { media } => {
                run_watch_cycle(&ctx, &cfg, media, json_mode, true).await?;
            }
        },
        Command::Upload {
            path,
            artist_folder,
            video,
        } => {
            let storage = RcloneStorage;
            let req = UploadRequest {
                local_path: path,
                artist_folder,
                is_video: video,
            };
            let hooks = upload_bar_hooks();
            storage.upload(&ctx, &cfg, &req, &hooks).await?;
            println!("upload complete");
        }
        Command::Status => {
            let store = CacheStore::open_default()?;
            match store.read_meta()? {
                Some(meta) => println!(
                    "catalog: {} shows / {} artists, updated {} ({})",
                    meta.total_shows,
                    meta.total_artists,
                    meta.last_updated
                        .format(&time::format_description::well_known::Rfc3339)
                        .unwrap_or_else(|_| meta.last_updated.to_string()),
                    meta.update_duration
                ),
                None => println!("catalog: no cache (run `nugs update`)"),
            }
            if cfg.rclone_enabled {
                let reachable = RcloneStorage.probe(&ctx, &cfg).await?;
                println!(
                    "remote {}: {}",
                    cfg.rclone_remote,
                    if reachable { "reachable" } else { "unreachable" }
                );
            } else {
                println!("remote: disabled");
            }
        }
    }
    Ok(())
}

/// Runs one cycle, or cycles forever in daemon mode.
async fn run_watch_cycle(
    ctx: &CancellationToken,
    cfg: &Config,
    media: Option<MediaArg>,
    json_mode: bool,
    daemon: bool,
) -> Result<watch::WatchOutcome> {
    let store = CacheStore::open_default()?;
    let client = NugsClient::from_config(cfg)?;
    let meta = ArtistMetaService::new(client.clone(), store.clone());
    let storage = RcloneStorage;
    let classifier = DefaultMediaClassifier;
    let downloader = CommandDownloader;
    let notifier = LogNotifier;
    let progress = BatchBar::default();
    let deps = WatchDeps {
        store: &store,
        catalog: &client,
        meta: &meta,
        storage: &storage,
        classifier: &classifier,
        downloader: &downloader,
        notifier: &notifier,
        progress: &progress,
    };
    let params = StreamParams::default();
    let filter = MediaArg::media(media);
    if daemon {
        watch::run_loop(ctx, cfg, &params, filter, json_mode, &deps).await?;
        Ok(watch::WatchOutcome::default())
    } else {
        watch::check(ctx, cfg, &params, filter, json_mode, &deps).await
    }
}

/// Artist IDs pass through; anything else resolves by normalized name
/// through the cached artists index.
fn resolve_artist(store: &CacheStore, input: &str) -> Result<i64> {
    if let Ok(artist_id) = input.trim().parse::<i64>() {
        return Ok(artist_id);
    }
    let index = store.read_artists_index()?;
    index
        .index
        .get(&artist_index_key(input))
        .copied()
        .ok_or_else(|| {
            NugsError::InvalidArgument(format!(
                "unknown artist {input:?}; run `nugs update` or pass a numeric ID"
            ))
        })
}

fn render_analysis(analysis: &ArtistCatalogAnalysis) -> String {
    let mut out = format!(
        "{} (artist {}): {} show(s), {} downloaded ({:.1}%), {} missing ({:.1}%)\n",
        analysis.artist_name,
        analysis.artist_id,
        analysis.total_shows,
        analysis.downloaded,
        analysis.download_pct,
        analysis.missing,
        analysis.missing_pct,
    );
    if analysis.cache_stale_use {
        out.push_str("note: metadata served from a stale cache (refresh failed)\n");
    }
    for show in &analysis.missing_shows {
        out.push_str(&format!(
            "  missing  {}  {}\n",
            show.performance_date, show.container_info
        ));
    }
    out
}

fn render_gap_fill(result: &GapFillResult) -> String {
    let mut out = format!(
        "{}: {} missing, {} downloaded, {} failed, {} remaining{}\n",
        result.artist_name,
        result.total_missing,
        result.downloaded,
        result.failed,
        result.remaining,
        if result.interrupted {
            " (interrupted)"
        } else {
            ""
        },
    );
    for failure in &result.failed_shows {
        out.push_str(&format!(
            "  failed  {}  {}: {} ({})\n",
            failure.performance_date, failure.container_info, failure.error, failure.reason
        ));
    }
    out
}

fn render_watch(outcome: &watch::WatchOutcome) -> String {
    let mut out = String::new();
    if let Some(update) = &outcome.update {
        out.push_str(&update.render_text());
    }
    out.push_str(&format!(
        "watch: {} downloaded, {} failed, {} artist error(s)\n",
        outcome.downloaded,
        outcome.failed,
        outcome.artist_errors.len()
    ));
    for err in &outcome.artist_errors {
        out.push_str(&format!("  {err}\n"));
    }
    out
}

fn watch_json(outcome: &watch::WatchOutcome) -> serde_json::Value {
    serde_json::json!({
        "downloaded": outcome.downloaded,
        "failed": outcome.failed,
        "artistErrors": outcome.artist_errors,
        "results": outcome.results,
        "update": outcome.update.as_ref().map(|update| update.to_json()),
    })
}

/// Batch progress rendered as an indicatif bar. Set at the start of a
/// gap-fill run, cleared at the end.
#[derive(Default)]
struct BatchBar {
    bar: Mutex<Option<ProgressBar>>,
}

impl ProgressSink for BatchBar {
    fn set_batch(&self, state: Option<BatchProgress>) {
        let mut slot = self.bar.lock().unwrap_or_else(|err| err.into_inner());
        match state {
            Some(batch) => {
                let bar = ProgressBar::new(batch.total_albums as u64);
                if let Ok(style) =
                    ProgressStyle::with_template("{bar:30} {pos}/{len} albums {msg}")
                {
                    bar.set_style(style);
                }
                bar.set_position(batch.complete as u64);
                *slot = Some(bar);
            }
            None => {
                if let Some(bar) = slot.take() {
                    bar.finish_and_clear();
                }
            }
        }
    }
}

fn upload_bar_hooks() -> UploadHooks {
    let bar = ProgressBar::new(100);
    if let Ok(style) = ProgressStyle::with_template("{bar:30} {pos}% {msg}") {
        bar.set_style(style);
    }
    let progress_bar = bar.clone();
    let complete_bar = bar.clone();
    UploadHooks {
        on_pre_upload: Some(Box::new(move |total_bytes| {
            bar.set_message(format!("{total_bytes} bytes"));
        })),
        on_progress: Some(Box::new(move |update| {
            progress_bar.set_position(u64::from(update.percent));
            progress_bar.set_message(format!(
                "{} / {} @ {}",
                update.uploaded, update.total, update.speed
            ));
        })),
        on_complete: Some(Box::new(move || {
            complete_bar.finish_and_clear();
        })),
        on_delete_after_upload: Some(Box::new(|path| {
            println!("verified; removing local copy {}", path.display());
        })),
    }
}
