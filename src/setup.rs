//! Interactive configuration wizard.
//!
//! Walks through session file, username, dry-run, budget and headless
//! choices, seeding every prompt from the saved config so a re-run is
//! mostly hitting Enter. Saves the result before returning it.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use dialoguer::{Confirm, Input, Select};

use crate::config::SweepConfig;
use crate::session::{self, DEFAULT_STORAGE_FILE};

/// What the wizard decided. `LoginRequested` means no session file exists
/// yet and the user asked to create one; the caller runs the login flow
/// and starts the wizard over.
#[derive(Debug)]
pub enum WizardOutcome {
    Ready(SweepConfig),
    LoginRequested { storage_file: PathBuf },
}

/// Prompt defaults, resolved from the saved config when there is one.
struct WizardDefaults {
    username: Option<String>,
    storage_file: Option<PathBuf>,
    dry_run: bool,
    max_items: u32,
    headless: Option<bool>,
}

impl WizardDefaults {
    fn from_existing(existing: Option<&SweepConfig>) -> Self {
        match existing {
            Some(cfg) => Self {
                username: Some(cfg.username.clone()).filter(|u| !u.trim().is_empty()),
                storage_file: Some(cfg.storage_file.clone())
                    .filter(|p| !p.as_os_str().is_empty()),
                dry_run: cfg.dry_run,
                max_items: cfg.max_items.max(1),
                headless: Some(cfg.headless),
            },
            None => Self {
                username: None,
                storage_file: None,
                dry_run: true,
                max_items: 10,
                headless: None,
            },
        }
    }

    /// Headless default: honour the saved preference, otherwise follow the
    /// mode. Dry runs have nothing to watch, real deletions are worth
    /// seeing.
    fn headless_default(&self, dry_run: bool) -> bool {
        self.headless.unwrap_or(dry_run)
    }
}

pub fn run_wizard(
    existing: Option<SweepConfig>,
    dir: &Path,
    config_path: &Path,
) -> anyhow::Result<WizardOutcome> {
    println!();
    println!("=============== Imgur Sweep Setup ===============");
    println!();

    if let Some(saved) = existing.as_ref() {
        print_saved_settings(saved);
        if saved.is_complete() && saved.storage_file.exists() {
            let reuse = Confirm::new()
                .with_prompt("Use these saved settings without editing?")
                .default(true)
                .interact()?;
            if reuse {
                return Ok(WizardOutcome::Ready(saved.clone()));
            }
            println!("Using saved values as defaults. Edit as needed.");
        } else if !saved.storage_file.as_os_str().is_empty() && !saved.storage_file.exists() {
            println!("⚠️  Saved session file not found. Reconfiguring.");
        }
        println!();
    }

    let defaults = WizardDefaults::from_existing(existing.as_ref());

    let candidates = session::find_storage_files(dir);
    if candidates.is_empty() {
        println!("⚠️  No session file found in {}.", dir.display());
        let login = Confirm::new()
            .with_prompt("Would you like to log in now?")
            .default(true)
            .interact()?;
        if login {
            return Ok(WizardOutcome::LoginRequested {
                storage_file: dir.join(DEFAULT_STORAGE_FILE),
            });
        }
        bail!("a session file is required; run `imgur-sweep login` first");
    }

    let storage_file = choose_storage_file(&candidates, defaults.storage_file.as_deref())?;
    println!("✓ Using session file: {}", storage_file.display());
    println!();

    let username = choose_username(&storage_file, defaults.username.as_deref())?;

    let dry_run = Confirm::new()
        .with_prompt("🧪 Enable dry-run mode? (no deletions, just simulation)")
        .default(defaults.dry_run)
        .interact()?;

    let dry_run = if dry_run {
        true
    } else {
        println!();
        println!("⚠️  Real deletions cannot be undone.");
        let confirmed = Confirm::new()
            .with_prompt("Are you SURE you want to proceed with REAL deletions?")
            .default(true)
            .interact()?;
        if !confirmed {
            println!("Switching to dry-run mode for safety.");
        }
        !confirmed
    };

    let max_items: u32 = Input::new()
        .with_prompt("How many posts to process this run?")
        .default(defaults.max_items)
        .validate_with(|v: &u32| {
            if *v >= 1 {
                Ok(())
            } else {
                Err("must be at least 1")
            }
        })
        .interact_text()?;

    let headless = Confirm::new()
        .with_prompt(if dry_run {
            "Run the browser headless? (recommended for dry runs)"
        } else {
            "Run the browser headless? (no window to watch)"
        })
        .default(defaults.headless_default(dry_run))
        .interact()?;

    let config = SweepConfig {
        username,
        storage_file,
        dry_run,
        max_items,
        headless,
    };

    println!();
    print_saved_settings(&config);
    let proceed = Confirm::new()
        .with_prompt("Proceed with these settings?")
        .default(true)
        .interact()?;
    if !proceed {
        bail!("setup aborted");
    }

    config
        .save(config_path)
        .with_context(|| format!("saving configuration to {}", config_path.display()))?;
    println!("✓ Configuration saved to {}", config_path.display());

    Ok(WizardOutcome::Ready(config))
}

fn print_saved_settings(cfg: &SweepConfig) {
    println!("  👤  Username: {}", cfg.username);
    if cfg.dry_run {
        println!("  🚩  Mode:     🧪 DRY RUN");
    } else {
        println!("  🚩  Mode:     🗑️  DELETION MODE");
    }
    println!("  🧮  Limit:    {} item(s)", cfg.max_items);
    println!("  🖥️  Headless: {}", if cfg.headless { "Yes" } else { "No" });
    println!("  📁  Session:  {}", cfg.storage_file.display());
}

/// Picks a session file. A saved choice that still exists wins unless the
/// user asks to switch; otherwise a single candidate is used as-is and
/// multiple candidates go through a selection menu.
fn choose_storage_file(
    candidates: &[PathBuf],
    saved: Option<&Path>,
) -> anyhow::Result<PathBuf> {
    if let Some(saved) = saved {
        if let Some(saved_idx) = candidates.iter().position(|c| c == saved) {
            println!("✓ Found saved session file: {}", saved.display());
            if candidates.len() == 1 {
                return Ok(saved.to_path_buf());
            }
            let switch = Confirm::new()
                .with_prompt("Use a different session file?")
                .default(false)
                .interact()?;
            if !switch {
                return Ok(saved.to_path_buf());
            }
            return select_from(candidates, saved_idx);
        }
    }

    if candidates.len() == 1 {
        return Ok(candidates[0].clone());
    }
    println!("Multiple session files found:");
    select_from(candidates, 0)
}

fn select_from(candidates: &[PathBuf], preselect: usize) -> anyhow::Result<PathBuf> {
    let items: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
    let choice = Select::new()
        .with_prompt("Select a session file")
        .items(&items)
        .default(preselect)
        .interact()?;
    Ok(candidates[choice].clone())
}

/// Recovers the username from the session file when possible, asking only
/// for confirmation; falls back to a free-form prompt otherwise.
fn choose_username(storage_file: &Path, saved: Option<&str>) -> anyhow::Result<String> {
    let detected = session::load_storage_state(storage_file)
        .ok()
        .as_ref()
        .and_then(session::extract_username);

    if let Some(detected) = detected {
        match saved {
            Some(saved) if saved.eq_ignore_ascii_case(&detected) => {
                println!("✓ Detected username: {detected} (matches saved config)");
            }
            Some(saved) => {
                println!("✓ Detected username: {detected}");
                println!("  (saved username was: {saved})");
            }
            None => println!("✓ Detected username: {detected}"),
        }
        let keep = Confirm::new()
            .with_prompt("Use this username?")
            .default(true)
            .interact()?;
        if keep {
            return Ok(detected);
        }
        return prompt_username(saved.unwrap_or(&detected));
    }

    match saved {
        Some(saved) => prompt_username(saved),
        None => {
            let username: String = Input::new()
                .with_prompt("Enter your Imgur username")
                .validate_with(|s: &String| {
                    if s.trim().is_empty() {
                        Err("username is required")
                    } else {
                        Ok(())
                    }
                })
                .interact_text()?;
            Ok(username.trim().to_string())
        }
    }
}

fn prompt_username(default: &str) -> anyhow::Result<String> {
    let username: String = Input::new()
        .with_prompt("Enter your Imgur username")
        .default(default.to_string())
        .validate_with(|s: &String| {
            if s.trim().is_empty() {
                Err("username is required")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    Ok(username.trim().to_string())
}
