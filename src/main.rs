use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::task::spawn_blocking;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use cdp_driver::{ChromeDriver, DriverConfig, DriverError, PageDriver, StorageState};
use imgur_sweep::config::{SweepConfig, CONFIG_FILE};
use imgur_sweep::login;
use imgur_sweep::session::{self, DEFAULT_STORAGE_FILE};
use imgur_sweep::setup::{run_wizard, WizardOutcome};
use imgur_sweep::sweep::{posts_url, run_sweep, SweepSummary};

/// imgur-sweep - bulk-delete your own Imgur posts through a real Chrome session
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable debug mode
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep posts from the account (the default when no command is given)
    Run(RunArgs),
    /// Log in interactively and save the session for later runs
    Login(LoginArgs),
    /// Walk through configuration without sweeping anything
    Setup,
}

#[derive(Args, Default)]
struct RunArgs {
    /// Force dry-run mode regardless of the saved configuration
    #[arg(long)]
    dry_run: bool,

    /// Override the per-run item budget
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    max_items: Option<u32>,

    /// Force a headless browser
    #[arg(long)]
    headless: bool,

    /// Skip the wizard and use the saved configuration as-is
    #[arg(long)]
    yes: bool,
}

#[derive(Args)]
struct LoginArgs {
    /// Where to write the captured session
    #[arg(long, value_name = "FILE")]
    storage_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.debug)?;

    info!("Starting imgur-sweep v{}", env!("CARGO_PKG_VERSION"));
    debug!("Build {} ({})", env!("GIT_HASH"), env!("BUILD_DATE"));

    let cancel = CancellationToken::new();
    spawn_interrupt_watcher(cancel.clone());

    let config_path = cli.config.unwrap_or_else(|| PathBuf::from(CONFIG_FILE));

    let result = match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => cmd_run(&config_path, args, &cancel).await,
        Commands::Login(args) => cmd_login(&config_path, args, &cancel).await,
        Commands::Setup => cmd_setup(&config_path, &cancel).await,
    };

    match result {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

/// First Ctrl+C asks the sweep to stop after the current post; a second
/// one exits immediately.
fn spawn_interrupt_watcher(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        eprintln!();
        eprintln!("⛔ Ctrl+C received. Finishing the current post; press again to exit now.");
        cancel.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
}

async fn cmd_run(config_path: &Path, args: RunArgs, cancel: &CancellationToken) -> Result<()> {
    let mut cfg = obtain_config(config_path, args.yes, cancel).await?;

    // Flags tighten the saved config, they never loosen it.
    if args.dry_run {
        cfg.dry_run = true;
    }
    if let Some(n) = args.max_items {
        cfg.max_items = n;
    }
    if args.headless {
        cfg.headless = true;
    }

    let state = session::load_storage_state(&cfg.storage_file)
        .with_context(|| format!("loading session from {}", cfg.storage_file.display()))?;

    print_banner(&cfg);

    let mut driver = launch_driver(cfg.headless).await?;
    prepare_session(&driver, &state, &cfg.username).await?;

    if signed_out(&driver).await? {
        if args.yes {
            driver.close().await;
            bail!("the saved session is no longer signed in; run `imgur-sweep login`");
        }
        println!("⚠️  The saved session looks signed out. Let's refresh it.");
        driver.close().await;
        tokio::time::sleep(Duration::from_millis(500)).await;

        login::run_login(driver_config(false), &cfg.storage_file, cancel).await?;
        let state = session::load_storage_state(&cfg.storage_file)
            .with_context(|| format!("loading session from {}", cfg.storage_file.display()))?;

        driver = launch_driver(cfg.headless).await?;
        prepare_session(&driver, &state, &cfg.username).await?;
        if signed_out(&driver).await? {
            driver.close().await;
            bail!("still signed out after a fresh login");
        }
    }

    let start = Instant::now();
    let result = run_sweep(&driver, &cfg, cancel).await;
    driver.close().await;
    let summary = result?;

    print_summary(&cfg, &summary, start.elapsed());
    Ok(())
}

async fn cmd_login(config_path: &Path, args: LoginArgs, cancel: &CancellationToken) -> Result<()> {
    let storage_file = args
        .storage_file
        .unwrap_or_else(|| storage_dir(config_path).join(DEFAULT_STORAGE_FILE));
    login::run_login(driver_config(false), &storage_file, cancel).await
}

async fn cmd_setup(config_path: &Path, cancel: &CancellationToken) -> Result<()> {
    let cfg = obtain_config(config_path, false, cancel).await?;
    println!();
    println!(
        "✓ Setup complete for {}. Run `imgur-sweep run` to start.",
        cfg.username
    );
    Ok(())
}

/// Loads the saved config, then either validates it as-is (`--yes`) or
/// walks the wizard, looping through login when no session file exists yet.
async fn obtain_config(
    config_path: &Path,
    assume_yes: bool,
    cancel: &CancellationToken,
) -> Result<SweepConfig> {
    let existing = match SweepConfig::load(config_path) {
        Ok(found) => found,
        Err(e) => {
            warn!("Ignoring unreadable config: {e}");
            None
        }
    };

    if assume_yes {
        let cfg = existing.with_context(|| {
            format!(
                "no configuration at {}; run `imgur-sweep setup` first",
                config_path.display()
            )
        })?;
        if !cfg.is_complete() {
            bail!("the saved configuration is incomplete; run `imgur-sweep setup`");
        }
        if !cfg.storage_file.exists() {
            bail!(
                "session file {} not found; run `imgur-sweep login`",
                cfg.storage_file.display()
            );
        }
        return Ok(cfg);
    }

    loop {
        let wizard_existing = existing.clone();
        let dir = storage_dir(config_path);
        let path = config_path.to_path_buf();
        let outcome = spawn_blocking(move || run_wizard(wizard_existing, &dir, &path))
            .await
            .context("setup prompt task failed")??;

        match outcome {
            WizardOutcome::Ready(cfg) => return Ok(cfg),
            WizardOutcome::LoginRequested { storage_file } => {
                login::run_login(driver_config(false), &storage_file, cancel).await?;
            }
        }
    }
}

/// Session files live next to the config file.
fn storage_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Browser settings for this run. The Chrome profile lives in the user
/// cache directory so it survives between runs without cluttering the
/// working directory.
fn driver_config(headless: bool) -> DriverConfig {
    let mut cfg = DriverConfig::default();
    cfg.headless = headless;
    if std::env::var_os("IMGUR_SWEEP_PROFILE").is_none() {
        if let Some(cache) = dirs::cache_dir() {
            cfg.user_data_dir = cache.join("imgur-sweep").join("chrome-profile");
        }
    }
    cfg
}

async fn launch_driver(headless: bool) -> Result<ChromeDriver> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Starting browser...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let driver = ChromeDriver::launch(driver_config(headless)).await;
    spinner.finish_and_clear();
    driver.context("launching Chrome")
}

/// Restores cookies, opens the posts grid, then seeds localStorage and
/// reloads so the app boots with the whole session in place.
async fn prepare_session(
    driver: &ChromeDriver,
    state: &StorageState,
    username: &str,
) -> Result<()> {
    driver
        .restore_cookies(state)
        .await
        .context("restoring cookies")?;

    let grid = posts_url(username);
    driver
        .navigate(&grid)
        .await
        .context("opening the posts grid")?;

    if let Some(entries) = state.local_storage_for("https://imgur.com") {
        if !entries.is_empty() {
            driver
                .seed_local_storage(entries)
                .await
                .context("seeding localStorage")?;
            driver
                .navigate(&grid)
                .await
                .context("reloading the posts grid")?;
        }
    }
    Ok(())
}

/// A visible "Sign in" control on the profile grid means the restored
/// session did not take.
async fn signed_out(driver: &ChromeDriver) -> Result<bool, DriverError> {
    Ok(driver
        .find_control_exact("a, button", "Sign in")
        .await?
        .is_some())
}

fn print_banner(cfg: &SweepConfig) {
    let title = if cfg.dry_run { "Dry-Run" } else { "Delete" };
    let mode = if cfg.dry_run {
        "🧪 DRY RUN ENABLED"
    } else {
        "🗑️  DELETION MODE (IRREVERSIBLE)"
    };
    println!();
    println!("============================== Imgur Bulk {title} ==============================");
    println!("  👤  Username: {}", cfg.username);
    println!("  🚩  Mode:     {mode}");
    println!("  🧮  Limit:    {} item(s) this run", cfg.max_items);
    println!("  🖥️  Headless: {}", if cfg.headless { "Yes" } else { "No" });
    println!();
    println!("👉 Press Ctrl+C in this terminal at ANY time to stop safely.");
    println!("===========================================================================");
    println!();
}

fn print_summary(cfg: &SweepConfig, summary: &SweepSummary, elapsed: Duration) {
    println!();
    if summary.interrupted {
        println!("⛔ Interrupted by user.");
    }
    let label = if cfg.dry_run { "Simulated" } else { "Actual" };
    println!(
        "✅ Done in {}. {} items processed: {}",
        humantime::format_duration(Duration::from_secs(elapsed.as_secs())),
        label,
        summary.attempted
    );
    println!(
        "   {} deleted, {} albums ungrouped, {} failed",
        summary.deleted, summary.ungrouped, summary.failed
    );
}
