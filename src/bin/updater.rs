//! Command-line driver for the updater.

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use ytconv::UpdaterConfig;
use ytconv::update::schedule::{now_epoch_secs, plan_app_run, plan_binary_run};
use ytconv::update::{
    AppUpdateJob, CheckOutcome, FlowEvent, FlowState, HttpClient, PlannedRun, UpdateFlow,
    UpdateJob, YtDlpUpdateJob, apply_staged_update,
};

/// Keeps YouTube Converter and its yt-dlp binary up to date.
#[derive(Parser)]
#[command(name = "ytconv-updater", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Check for a newer application release without installing.
    Check,

    /// Download and stage the newest application release.
    Update,

    /// Update the yt-dlp binary.
    Ytdlp {
        /// Only report the installed and latest versions.
        #[arg(long)]
        check: bool,
    },

    /// Copy a staged update over the installation and optionally relaunch.
    Apply {
        /// Installation root holding `_update_staging/`.
        install_root: PathBuf,

        /// Executable to start once the update is applied.
        #[arg(long)]
        relaunch: Option<PathBuf>,

        /// Wait before copying so the application can exit.
        #[arg(long, default_value_t = 1500)]
        delay_ms: u64,
    },

    /// Run whatever checks the configured schedules say are due.
    Due {
        /// Print the plan without running it.
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(UpdaterConfig::default_config_path);
    let mut config = UpdaterConfig::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    match cli.command {
        Command::Check => {
            let state = run_flow(app_job(&config), false);
            config.app.schedule.mark_checked(now_epoch_secs());
            save(&config, &config_path)?;
            finish(state)
        }
        Command::Update => {
            let state = run_flow(app_job(&config), true);
            config.app.schedule.mark_checked(now_epoch_secs());
            save(&config, &config_path)?;
            finish(state)
        }
        Command::Ytdlp { check } => {
            let state = run_flow(ytdlp_job(&config), !check);
            config.ytdlp.schedule.mark_checked(now_epoch_secs());
            save(&config, &config_path)?;
            finish(state)
        }
        Command::Apply {
            install_root,
            relaunch,
            delay_ms,
        } => apply(install_root, relaunch, delay_ms),
        Command::Due { dry_run } => run_due(&mut config, &config_path, dry_run),
    }
}

fn http(config: &UpdaterConfig) -> Arc<dyn HttpClient> {
    Arc::new(config.http_client())
}

fn app_job(config: &UpdaterConfig) -> Arc<dyn UpdateJob> {
    Arc::new(AppUpdateJob::new(
        http(config),
        &config.http.api_base,
        &config.app.repo,
        config.app.channel,
        config.paths(),
    ))
}

fn ytdlp_job(config: &UpdaterConfig) -> Arc<dyn UpdateJob> {
    Arc::new(YtDlpUpdateJob::new(
        http(config),
        &config.http.api_base,
        config.ytdlp.branch,
        &config.paths(),
    ))
}

/// Drive one run to completion, printing events as they arrive.
fn run_flow(job: Arc<dyn UpdateJob>, do_install: bool) -> FlowState {
    let mut flow = UpdateFlow::new(job);
    let events = flow.events();
    flow.start(do_install);
    loop {
        flow.wait(Duration::from_millis(200));
        if !flow.is_running() {
            flow.pump();
        }
        for event in events.try_iter() {
            print_event(&event);
        }
        if !flow.is_running() {
            break;
        }
    }
    flow.state()
}

fn print_event(event: &FlowEvent) {
    match event {
        FlowEvent::Status(line) => println!("{line}"),
        FlowEvent::StateChanged(state) => info!("state: {state}"),
        FlowEvent::Outcome(CheckOutcome::Available(update)) => {
            println!("update available: {} -> {}", update.local, update.remote);
            if !update.changelog.is_empty() {
                println!("\n{}\n", update.changelog.trim());
            }
        }
        FlowEvent::Outcome(CheckOutcome::UpToDate { version }) => {
            println!("up to date ({version})");
        }
        FlowEvent::Outcome(CheckOutcome::Installed { version }) => {
            println!("installed {version}");
        }
        FlowEvent::Outcome(CheckOutcome::Failed(reason)) => println!("check failed: {reason}"),
        FlowEvent::RestartRequired => println!("restart YouTube Converter to finish updating"),
    }
}

fn finish(state: FlowState) -> anyhow::Result<()> {
    match state {
        FlowState::Error => bail!("update failed"),
        FlowState::Canceled => bail!("update canceled"),
        _ => Ok(()),
    }
}

fn save(config: &UpdaterConfig, path: &std::path::Path) -> anyhow::Result<()> {
    config
        .save_to_file(path)
        .with_context(|| format!("saving {}", path.display()))
}

fn apply(
    install_root: PathBuf,
    relaunch: Option<PathBuf>,
    delay_ms: u64,
) -> anyhow::Result<()> {
    std::thread::sleep(Duration::from_millis(delay_ms));
    let paths = ytconv::UpdatePaths::from_root(install_root);
    match apply_staged_update(&paths)? {
        Some(version) => println!("applied update {version}"),
        None => println!("no staged update"),
    }
    if let Some(exe) = relaunch {
        std::process::Command::new(&exe)
            .current_dir(&paths.install_root)
            .spawn()
            .with_context(|| format!("relaunching {}", exe.display()))?;
    }
    Ok(())
}

fn run_due(
    config: &mut UpdaterConfig,
    config_path: &std::path::Path,
    dry_run: bool,
) -> anyhow::Result<()> {
    let now = now_epoch_secs();
    let app_plan = plan_app_run(&config.app.schedule, config.app.action, now);
    let ytdlp_plan = plan_binary_run(&config.ytdlp.schedule, config.ytdlp.enabled, now);
    println!("app: {app_plan:?}, yt-dlp: {ytdlp_plan:?}");
    if dry_run {
        return Ok(());
    }

    let mut failed = false;
    if app_plan != PlannedRun::Skip {
        let state = run_flow(app_job(config), app_plan == PlannedRun::Install);
        config.app.schedule.mark_checked(now_epoch_secs());
        failed |= state == FlowState::Error;
    }
    if ytdlp_plan != PlannedRun::Skip {
        let state = run_flow(ytdlp_job(config), ytdlp_plan == PlannedRun::Install);
        config.ytdlp.schedule.mark_checked(now_epoch_secs());
        failed |= state == FlowState::Error;
    }
    save(config, config_path)?;
    if failed {
        bail!("one or more updates failed");
    }
    Ok(())
}
