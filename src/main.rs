//! MarkFlow - a desktop markdown note-taking app.
//!
//! # Usage
//!
//! ```bash
//! markflow notes.md
//! markflow --theme dark --auto-save-interval 10000
//! markflow --no-window --port 8080
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use markflow::autosave::spawn_auto_save;
use markflow::config::{
    Config, ConfigLayer, ThemeMode, clear_config, global_config_path, load_config_layer_or_default,
    local_config_path, save_config_layer,
};
use markflow::instance::{
    Acquisition, InstanceLock, OpeningQueue, runtime_dir, wait_for_published_url,
};
use markflow::server;
use markflow::session::Session;
use markflow::shell::{self, Surface};
use markflow::watcher::spawn_queue_watcher;

/// How long a second invocation waits for a starting instance to publish its URL.
const URL_WAIT: Duration = Duration::from_secs(5);
const RUNTIME_SHUTDOWN: Duration = Duration::from_secs(2);

/// A desktop markdown note-taking app
#[derive(Parser, Debug)]
#[command(name = "markflow", version, about, long_about = None)]
struct Cli {
    /// Markdown file to open
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Extra config file, applied over the global and local ones
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Color theme for the editor and exports
    #[arg(long, value_enum)]
    theme: Option<ThemeMode>,

    /// Disable auto-save
    #[arg(long)]
    no_auto_save: bool,

    /// Milliseconds between auto-saves
    #[arg(long, value_name = "MS")]
    auto_save_interval: Option<u64>,

    /// Port for the local server (0 picks a free port)
    #[arg(long, default_value_t = 0)]
    port: u16,

    /// Directory for the instance lock and opening queue
    #[arg(long, value_name = "DIR")]
    runtime_dir: Option<PathBuf>,

    /// Run the server without opening a window
    #[arg(long)]
    no_window: bool,

    /// Save current command-line settings as defaults in the global config
    #[arg(long)]
    save: bool,

    /// Remove the saved global config
    #[arg(long)]
    clear: bool,

    /// Verbose logging
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn config_layer(&self) -> ConfigLayer {
        ConfigLayer {
            theme: self.theme,
            auto_save: self.no_auto_save.then_some(false),
            auto_save_interval: self.auto_save_interval,
            editor: None,
        }
    }
}

fn init_logging(debug: bool) {
    let default = if debug {
        "warn,markflow=debug"
    } else {
        "warn,markflow=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Global file < local file < `--config` < command-line flags.
fn load_config(cli: &Cli) -> Result<Config> {
    let global_path = global_config_path();
    let cli_layer = cli.config_layer();

    if cli.clear {
        clear_config(&global_path)?;
        tracing::info!(path = %global_path.display(), "cleared saved settings");
    }
    if cli.save {
        save_config_layer(&global_path, &cli_layer)?;
        tracing::info!(path = %global_path.display(), "saved settings");
    }

    let file_layer = if cli.clear {
        ConfigLayer::default()
    } else {
        load_config_layer_or_default(&global_path)
            .union(&load_config_layer_or_default(&local_config_path()))
    };
    let explicit = cli
        .config
        .as_deref()
        .map(load_config_layer_or_default)
        .unwrap_or_default();

    Ok(file_layer.union(&explicit).union(&cli_layer).resolve())
}

fn validate_file(path: &Path) -> Result<()> {
    let metadata =
        std::fs::metadata(path).with_context(|| format!("File not found: {}", path.display()))?;
    if !metadata.is_file() {
        anyhow::bail!("Not a regular file: {}", path.display());
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let config = load_config(&cli)?;
    if let Some(file) = &cli.file {
        validate_file(file)?;
    }

    let dir = cli.runtime_dir.clone().unwrap_or_else(runtime_dir);
    match InstanceLock::acquire(&dir).context("Failed to check for a running instance")? {
        Acquisition::Acquired(lock) => run_primary(&cli, config, lock),
        Acquisition::AlreadyRunning { url } => hand_off(&cli, &dir, url),
    }
}

/// Pass the file, or a window request, to the instance that already runs.
fn hand_off(cli: &Cli, dir: &Path, url: Option<String>) -> Result<()> {
    if let Some(file) = &cli.file {
        println!("Waiting for opening.txt to be available...");
        OpeningQueue::new(dir)
            .push(file)
            .context("The running instance did not accept the file; it might be busy")?;
        println!("Opening {} in the running MarkFlow instance", file.display());
        return Ok(());
    }

    let url = url
        .or_else(|| wait_for_published_url(dir, URL_WAIT))
        .context("MarkFlow is already running but has not published its address")?;
    match Surface::select(cli.no_window) {
        Surface::Headless => println!("MarkFlow is running at {url}"),
        Surface::Browser => shell::open_browser(&url),
        Surface::Window => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(1)
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;
            shell::run(&url, Surface::Window, runtime.handle()).context("Window error")?;
        }
    }
    Ok(())
}

fn run_primary(cli: &Cli, config: Config, mut lock: InstanceLock) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let auto_save = config.auto_save.then(|| config.auto_save_interval());
    let surface = Surface::select(cli.no_window);
    let session = Session::new(config).with_native_dialogs(surface == Surface::Window);
    match &cli.file {
        Some(file) => {
            session
                .open_path(file)
                .with_context(|| format!("Failed to open {}", file.display()))?;
        }
        None => {
            session.new_tab(None);
        }
    }

    let server::Bound { listener, url } = runtime
        .block_on(server::bind(cli.port))
        .with_context(|| format!("Failed to bind port {}", cli.port))?;
    lock.publish_url(&url)
        .context("Failed to publish server address")?;

    let tasks = {
        let _guard = runtime.enter();
        let server_session = session.clone();
        let mut tasks = vec![
            tokio::spawn(async move {
                if let Err(err) = server::serve(listener, server_session).await {
                    tracing::error!(%err, "server stopped");
                }
            }),
            spawn_queue_watcher(session.clone(), OpeningQueue::new(lock.runtime_dir())),
        ];
        if let Some(interval) = auto_save {
            tasks.push(spawn_auto_save(session.clone(), interval));
        }
        tasks
    };

    let result = shell::run(&url, surface, runtime.handle());

    for task in &tasks {
        task.abort();
    }
    if auto_save.is_some() {
        let report = session.auto_save();
        if !report.saved.is_empty() {
            tracing::info!(count = report.saved.len(), "saved changes on exit");
        }
    }
    if session.workspace().has_unsaved_changes() {
        tracing::warn!("exiting with unsaved changes");
    }
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN);
    drop(lock);

    result.context("Window error")
}
