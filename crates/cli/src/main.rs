use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use cli::app::{App, ClipParams, CropParams};
use cli::server;
use cli::watch::WatchEvent;
use serde_json::{Map, Value};
use slicer_core::config;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Quiet period after a burst of filesystem events before the directory is listed again.
const RELIST_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "slicer")]
#[command(about = "Recent-clip browser and encoder front end", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the most recent videos in a directory and cache their thumbnails
    List {
        dir: PathBuf,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Export a time range of a video
    Export {
        source: PathBuf,
        #[arg(long)]
        start: f64,
        #[arg(long)]
        end: f64,
        #[arg(long, default_value = "")]
        title: String,
        /// Container extension, e.g. mp4, mkv, gif
        #[arg(long)]
        ext: Option<String>,
        /// Encoder choice, optionally with `:muted`
        #[arg(long)]
        codec: Option<String>,
        #[arg(long)]
        resolution: Option<String>,
        /// Target bitrate such as `8000` or `8000k`
        #[arg(long)]
        bitrate: Option<String>,
    },
    /// Export a cropped region over a time range
    Crop {
        source: PathBuf,
        #[arg(long)]
        start: f64,
        #[arg(long)]
        end: f64,
        #[arg(long)]
        x: u32,
        #[arg(long)]
        y: u32,
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
        #[arg(long, default_value = "")]
        title: String,
    },
    /// Show or change persisted settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Put a file reference on the clipboard
    Copy { path: PathBuf },
    /// Stage a local file the way an upload from the UI is staged
    Stage {
        file: PathBuf,
        #[arg(long)]
        name: Option<String>,
    },
    /// Print change events for a directory until interrupted
    Watch { dir: Option<PathBuf> },
    /// Run the content server and keep the watch location listed
    Serve,
}

#[derive(Subcommand)]
enum SettingsAction {
    Show,
    SetWatch { dir: String },
    SetSave { dir: String },
    /// `key=value` pairs; numbers and non-JSON values are kept as strings
    Set {
        #[arg(required = true)]
        pairs: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;
    init_tracing(&cfg.log.level);

    let app = Arc::new(App::from_config(cfg)?);
    let result = run(app.clone(), cli.command).await;
    app.shutdown().await;
    result
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(app: Arc<App>, command: Commands) -> Result<()> {
    match command {
        Commands::List { dir, json } => {
            let entries = app.list_recent_videos(&dir).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                let cache = app.cache();
                for e in &entries {
                    let thumb = if cache.contains(&e.identity) { "thumb" } else { "-" };
                    println!("{}\t{}\t{}\t{}", e.identity, thumb, e.name, e.path.display());
                }
            }
        }
        Commands::Export {
            source,
            start,
            end,
            title,
            ext,
            codec,
            resolution,
            bitrate,
        } => {
            let outcome = app
                .export_clip(ClipParams {
                    source,
                    title,
                    start,
                    end,
                    extension: ext,
                    codec,
                    resolution,
                    bitrate,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Crop {
            source,
            start,
            end,
            x,
            y,
            width,
            height,
            title,
        } => {
            let outcome = app
                .crop_video(CropParams {
                    source,
                    title,
                    start,
                    end,
                    x,
                    y,
                    width,
                    height,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Settings { action } => run_settings(&app, action).await?,
        Commands::Copy { path } => {
            app.copy_to_clipboard(&path).await?;
            println!("copied {}", path.display());
        }
        Commands::Stage { file, name } => {
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let name = match name {
                Some(n) => n,
                None => file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            };
            let staged = app.handle_file_upload(&bytes, &name).await?;
            println!("{}", staged.display());
        }
        Commands::Watch { dir } => run_watch(&app, dir).await?,
        Commands::Serve => run_serve(app).await?,
    }
    Ok(())
}

async fn run_settings(app: &App, action: SettingsAction) -> Result<()> {
    match action {
        SettingsAction::Show => {}
        SettingsAction::SetWatch { dir } => app.set_watch_location(&dir).await?,
        SettingsAction::SetSave { dir } => app.set_save_location(&dir)?,
        SettingsAction::Set { pairs } => {
            let patch = parse_pairs(&pairs)?;
            let report = app.save_export_settings(&patch)?;
            if !report.rejected.is_empty() {
                eprintln!("rejected (wrong type): {}", report.rejected.join(", "));
            }
            if !report.unknown.is_empty() {
                eprintln!("unknown fields: {}", report.unknown.join(", "));
            }
        }
    }
    println!("{}", serde_json::to_string_pretty(&app.export_settings()?)?);
    Ok(())
}

fn parse_pairs(pairs: &[String]) -> Result<Map<String, Value>> {
    let mut patch = Map::new();
    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            bail!("expected key=value, got {pair:?}");
        };
        // Every numeric-looking setting (`bitrate=8000`) is stored as text.
        let value = match serde_json::from_str(raw) {
            Ok(Value::Number(_)) | Err(_) => Value::String(raw.to_string()),
            Ok(v) => v,
        };
        patch.insert(key.trim().to_string(), value);
    }
    Ok(patch)
}

async fn run_watch(app: &App, dir: Option<PathBuf>) -> Result<()> {
    let mut events = app.subscribe_watch_events();
    let dir = match dir {
        Some(dir) => {
            app.set_watch_location(&dir.to_string_lossy()).await?;
            dir
        }
        None => match app.resume_watching().await? {
            Some(dir) => dir,
            None => bail!("no directory given and no watch location saved"),
        },
    };
    eprintln!("watching {} (ctrl-c to stop)", dir.display());
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event) => println!("{}", event.name()),
                Err(RecvError::Lagged(n)) => warn!(skipped = n, "watch events dropped"),
                Err(RecvError::Closed) => break,
            },
        }
    }
    Ok(())
}

async fn run_serve(app: Arc<App>) -> Result<()> {
    let bind = app.config().server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding {bind}"))?;

    if let Some(dir) = app.resume_watching().await? {
        if let Err(e) = app.list_recent_videos(&dir).await {
            warn!(dir = %dir.display(), error = %e, "initial listing failed");
        }
    }
    let relister = tokio::spawn(relist_on_change(app.clone(), app.subscribe_watch_events()));

    server::serve(listener, app.cache(), async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutting down");
    })
    .await?;
    relister.abort();
    Ok(())
}

/// Lists the watched directory again after each burst of change events.
async fn relist_on_change(app: Arc<App>, mut events: broadcast::Receiver<WatchEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => debug!(event = event.name(), "change detected"),
            Err(RecvError::Lagged(n)) => debug!(skipped = n, "change events lagged"),
            Err(RecvError::Closed) => break,
        }
        tokio::time::sleep(RELIST_DEBOUNCE).await;
        loop {
            match events.try_recv() {
                Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        let Some(dir) = app.watching().await else {
            continue;
        };
        match app.list_recent_videos(&dir).await {
            Ok(entries) => info!(dir = %dir.display(), count = entries.len(), "relisted after change"),
            Err(e) => warn!(dir = %dir.display(), error = %e, "relisting failed"),
        }
    }
}
