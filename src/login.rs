//! Interactive login and session capture.
//!
//! Opens a visible browser on the sign-in page, waits for the user to log
//! in by hand (including 2FA), then snapshots cookies and localStorage to
//! a session file the sweep can restore later.

use std::io::{self, BufRead};
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use cdp_driver::{ChromeDriver, DriverConfig, PageDriver};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::task::spawn_blocking;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::session;

const SIGNIN_URL: &str = "https://imgur.com/signin";

pub async fn run_login(
    mut driver_cfg: DriverConfig,
    storage_path: &Path,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    // The whole point is logging in by hand, so the window must be visible.
    driver_cfg.headless = false;

    println!();
    println!("=============== Imgur Login & Session Save ===============");
    println!();

    let spinner = launch_spinner("Starting browser...");
    let driver = match ChromeDriver::launch(driver_cfg).await {
        Ok(driver) => {
            spinner.finish_and_clear();
            driver
        }
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e).context("launching the browser for login");
        }
    };

    println!("Opening the Imgur sign-in page...");
    driver
        .navigate(SIGNIN_URL)
        .await
        .context("opening the sign-in page")?;

    println!();
    println!("🖱️  Please log in manually in the opened browser window");
    println!("   (complete 2FA if needed).");
    println!("   When you're fully logged in (e.g. you can see your profile avatar),");
    println!("   come back here and press ENTER.");
    println!();

    let wait_for_enter = spawn_blocking(|| {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line).map(|_| ())
    });

    tokio::select! {
        _ = cancel.cancelled() => {
            driver.close().await;
            bail!("login cancelled");
        }
        pressed = wait_for_enter => {
            pressed
                .context("waiting for confirmation")?
                .context("reading from stdin")?;
        }
    }

    let state = driver
        .capture_session()
        .await
        .context("capturing the logged-in session")?;
    if state.cookies.is_empty() {
        debug!("Captured session has no cookies; the login may not have completed");
    }
    session::save_storage_state(storage_path, &state)
        .with_context(|| format!("writing session to {}", storage_path.display()))?;

    println!();
    println!("✅ Session saved to '{}'", storage_path.display());

    driver.close().await;
    Ok(())
}

fn launch_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}
