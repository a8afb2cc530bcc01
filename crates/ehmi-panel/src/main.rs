//! `ehmi` — terminal control panel for EVA ICS embedded HMI dashboards.
//!
//! Built on [ratatui](https://ratatui.rs). The dashboard layout is served
//! by the HMI service for a client key; `ehmi-core`'s
//! [`Session`](ehmi_core::Session) keeps every entry bound to live item
//! states and turns key presses into actions.
//!
//! Logs are written to a file (default `/tmp/ehmi.log`) to avoid
//! corrupting the terminal UI.
//!
//! Entry point: CLI argument parsing, tracing setup, panic hooks, and app launch.

mod action;
mod app;
mod component;
mod data_bridge;
mod event;
mod screens;
mod theme;
mod tui;
mod widgets;

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{Result, bail};
use secrecy::SecretString;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use ehmi_config::{Colors, ConfigError, Profile};
use ehmi_core::{Session, SessionConfig};

use crate::app::App;
use crate::theme::Theme;

/// Terminal control panel for an EVA ICS HMI dashboard.
#[derive(Parser, Debug)]
#[command(name = "ehmi", version, about)]
struct Cli {
    /// HMI service URL (e.g., https://plant.local:7727)
    #[arg(short = 'u', long, env = "EHMI_URL")]
    url: Option<String>,

    /// Client key the dashboard is served for
    #[arg(short = 'k', long, env = "EHMI_CLIENT_KEY", hide_env_values = true)]
    client_key: Option<String>,

    /// Config profile to use
    #[arg(short = 'p', long, env = "EHMI_PROFILE")]
    profile: Option<String>,

    /// Background color override (name or #rrggbb)
    #[arg(long)]
    bg: Option<String>,

    /// Foreground color override (name or #rrggbb)
    #[arg(long)]
    fg: Option<String>,

    /// Log file path
    #[arg(long, default_value = "/tmp/ehmi.log")]
    log_file: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Set up file-based tracing. We MUST NOT log to stdout/stderr — that would
/// corrupt the panel. The returned guard must live as long as the app so
/// logs are flushed.
fn setup_tracing(cli: &Cli) -> WorkerGuard {
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("ehmi={level},ehmi_core={level},ehmi_api={level}"))
    });

    let log_dir = cli
        .log_file
        .parent()
        .unwrap_or(std::path::Path::new("/tmp"));
    let log_filename = cli
        .log_file
        .file_name()
        .unwrap_or(std::ffi::OsStr::new("ehmi.log"));

    let file_appender = tracing_appender::rolling::never(log_dir, log_filename);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true),
        )
        .init();

    guard
}

/// Merge CLI flags over the selected config profile.
///
/// Priority: CLI flags > environment > config file. With `--url` and no
/// explicit `--profile`, a missing profile is not an error.
fn resolve_session(cli: &Cli) -> Result<(SessionConfig, Colors)> {
    let config = ehmi_config::load_config()?;

    let (name, mut profile) = match config.profile(cli.profile.as_deref()) {
        Ok((name, profile)) => (name, profile.clone()),
        Err(ConfigError::UnknownProfile { profile, .. })
            if cli.url.is_some() && cli.profile.is_none() =>
        {
            (profile, Profile::default())
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(url) = &cli.url {
        profile.url.clone_from(url);
    }
    if profile.url.is_empty() {
        bail!(
            "no HMI URL: pass --url or set `url` for profile '{name}' in {}",
            ehmi_config::config_path().display()
        );
    }
    if cli.bg.is_some() {
        profile.colors.bg.clone_from(&cli.bg);
    }
    if cli.fg.is_some() {
        profile.colors.fg.clone_from(&cli.fg);
    }

    let client_key = match &cli.client_key {
        Some(key) => SecretString::from(key.clone()),
        None => ehmi_config::resolve_client_key(&profile, &name)?,
    };

    let session_config =
        ehmi_config::profile_to_session_config(&profile, &name, &config.defaults, client_key)?;
    Ok((session_config, profile.colors))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Install panic/error hooks BEFORE entering the terminal
    tui::install_hooks()?;

    let _log_guard = setup_tracing(&cli);

    let (session_config, colors) = resolve_session(&cli)?;
    info!(url = %session_config.url, "starting ehmi panel");

    // Colors apply before the dashboard is fetched.
    let theme = Theme::with_overrides(colors.bg.as_deref(), colors.fg.as_deref());
    let session = Session::new(session_config)?;

    let mut app = App::new(session, theme);
    app.run().await?;

    Ok(())
}
