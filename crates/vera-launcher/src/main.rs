mod cli;
mod windows;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use vera_session::config::{load_settings, SessionSettings};
use vera_session::paths::default_config_dir;
use vera_session::{
    activate, Activation, CoordinatorHandle, FileLockStore, LocalBus, LockStore, Role,
    SessionContext, StaticIdentity, UserIdentity,
};

use crate::cli::{Cli, Commands};
use crate::windows::InProcessWindows;

/// Exit code when another launcher already owns the session.
const EXIT_ALREADY_RUNNING: u8 = 3;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config_dir = match cli.config_dir.map(Ok).unwrap_or_else(default_config_dir) {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("Cannot determine config directory: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Run {
            user,
            token,
            duration_secs,
        } => run(&config_dir, user, token, duration_secs).await,
        Commands::Status => status(&config_dir),
        Commands::ClearLock => clear_lock(&config_dir),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(
    config_dir: &Path,
    user: Option<String>,
    token: Option<String>,
    duration_secs: Option<u64>,
) -> Result<ExitCode, BoxError> {
    let settings = load_settings(config_dir)?;
    let identity = Arc::new(StaticIdentity::new(signed_in_user(user, token)));

    let ctx = SessionContext::builder()
        .transport(Arc::new(LocalBus::new()))
        .lock_store(Arc::new(FileLockStore::new(config_dir)))
        .build();
    let windows = Arc::new(InProcessWindows::new(&ctx, settings.heartbeat_interval()));

    let handle = match activate(
        &ctx,
        settings.coordinator.clone(),
        identity,
        windows.clone(),
    )? {
        Activation::Active(handle) => handle,
        Activation::AlreadyRunning => {
            println!("A VERA launcher is already running for {}", config_dir.display());
            return Ok(ExitCode::from(EXIT_ALREADY_RUNNING));
        }
    };

    log::info!(
        "Launcher running with {} window(s), config at {}",
        windows.roles().len(),
        config_dir.display()
    );

    wait_for_shutdown(&handle, &settings, duration_secs, tokio::signal::ctrl_c()).await;

    // Windows go first so their WindowClosed reaches the launcher's bus.
    windows.close_all();
    ctx.termination.fire();
    handle.dispose();

    Ok(ExitCode::SUCCESS)
}

fn signed_in_user(user: Option<String>, token: Option<String>) -> Option<UserIdentity> {
    match (user, token) {
        (Some(name), Some(credential)) => Some(UserIdentity::new(name, credential)),
        _ => None,
    }
}

/// Wait for the shutdown signal or the optional deadline, logging the
/// registry now and then.
///
/// `signal` is polled as one future for the whole wait, so a signal that
/// arrives while a report runs is still seen.
async fn wait_for_shutdown<S>(
    handle: &CoordinatorHandle,
    settings: &SessionSettings,
    duration_secs: Option<u64>,
    signal: S,
) where
    S: Future<Output = std::io::Result<()>>,
{
    let deadline = async {
        match duration_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    tokio::pin!(signal);

    let mut report = tokio::time::interval(settings.coordinator.watchdog_interval());
    report.tick().await;

    loop {
        tokio::select! {
            result = &mut signal => {
                if let Err(e) = result {
                    log::error!("Failed to listen for the shutdown signal: {}", e);
                }
                log::info!("Shutting down");
                return;
            }
            _ = &mut deadline => {
                log::info!("Run duration elapsed, shutting down");
                return;
            }
            _ = report.tick() => {
                report_and_reopen(handle);
            }
        }
    }
}

/// Log which windows are alive and, when `reopenEvicted` is set, reopen
/// the missing ones. Returns the roles reopened.
fn report_and_reopen(handle: &CoordinatorHandle) -> Vec<Role> {
    let alive: Vec<String> = handle
        .registry()
        .iter()
        .map(|entry| entry.role.to_string())
        .collect();
    log::debug!("Alive windows: [{}]", alive.join(", "));

    if !handle.config().reopen_evicted {
        return Vec::new();
    }
    let reopened = handle.open_windows();
    if !reopened.is_empty() {
        log::info!("Reopened {} window(s)", reopened.len());
    }
    reopened
}

fn status(config_dir: &Path) -> Result<ExitCode, BoxError> {
    let lock = FileLockStore::new(config_dir);
    let settings = load_settings(config_dir)?;

    if lock.is_held()? {
        println!("running (lock at {})", lock.path().display());
    } else {
        println!("not running");
    }
    println!("settings: {}", settings_path(config_dir).display());
    println!("{}", serde_json::to_string_pretty(&settings)?);

    Ok(ExitCode::SUCCESS)
}

fn clear_lock(config_dir: &Path) -> Result<ExitCode, BoxError> {
    let lock = FileLockStore::new(config_dir);
    if !lock.is_held()? {
        println!("No launcher lock at {}", lock.path().display());
        return Ok(ExitCode::SUCCESS);
    }

    lock.release()?;
    log::warn!("Removed launcher lock {}", lock.path().display());
    println!("Cleared {}", lock.path().display());
    Ok(ExitCode::SUCCESS)
}

fn settings_path(config_dir: &Path) -> PathBuf {
    config_dir.join(vera_session::config::SETTINGS_FILE)
}
