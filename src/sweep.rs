//! The deletion loop.
//!
//! One pass over the account: rescan the grid, pick the first tile not yet
//! attempted, open it, delete (or simulate), return to the grid, repeat.
//! Rescanning after every post keeps the order honest while the grid
//! reflows, at the cost of one extra page load per item.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::Context;
use cdp_driver::{DriverError, DriverErrorKind, PageDriver};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SweepConfig;
use crate::grid::{self, Post, PostKind};

const IMGUR_BASE: &str = "https://imgur.com";

/// Consecutive fruitless scrolls tolerated before the run stops.
pub const SCROLL_RETRY_LIMIT: u32 = 5;

// Pacing. The site renders lazily and rate-limits aggressive clients, so
// every interaction gets a beat to settle.
const SETTLE_DELAY: Duration = Duration::from_millis(400);
const TAB_DELAY: Duration = Duration::from_millis(500);
const POST_LOAD_DELAY: Duration = Duration::from_millis(800);
const ALBUM_LOAD_DELAY: Duration = Duration::from_millis(1200);
const MODAL_DELAY: Duration = Duration::from_millis(600);
const CONFIRM_DELAY: Duration = Duration::from_millis(1000);
const SCROLL_DELAY: Duration = Duration::from_millis(1200);
const VERIFY_DELAY: Duration = Duration::from_millis(1500);
const POST_GAP: Duration = Duration::from_millis(300);
const CLICK_REGISTER: Duration = Duration::from_millis(300);

/// Tally of one run. `attempted` counts every post the loop opened,
/// including ones that ended up in `failed`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub attempted: u32,
    pub deleted: u32,
    pub ungrouped: u32,
    pub failed: u32,
    pub interrupted: bool,
}

enum DeleteOutcome {
    Deleted,
    Ungrouped,
    Failed,
}

pub fn posts_url(username: &str) -> String {
    format!("{IMGUR_BASE}/user/{username}/posts")
}

/// Runs the sweep until the item budget is spent, the grid runs dry, or
/// `cancel` fires. Soft failures are counted and skipped; driver errors
/// that mean the browser is gone abort the run.
pub async fn run_sweep(
    driver: &dyn PageDriver,
    cfg: &SweepConfig,
    cancel: &CancellationToken,
) -> anyhow::Result<SweepSummary> {
    let mut summary = SweepSummary::default();
    let mut attempted_hrefs: HashSet<String> = HashSet::new();
    let mut seen_heights: HashSet<i64> = HashSet::new();
    let mut scroll_retries = 0u32;

    goto_posts_grid(driver, &cfg.username)
        .await
        .context("opening the posts grid")?;

    while summary.attempted < cfg.max_items {
        if cancel.is_cancelled() {
            info!("Stop requested, finishing up");
            summary.interrupted = true;
            break;
        }

        let posts = grid::scan(driver).await.context("scanning the posts grid")?;
        let next = posts
            .into_iter()
            .find(|p| !attempted_hrefs.contains(&p.href));

        let Some(post) = next else {
            if scroll_retries >= SCROLL_RETRY_LIMIT {
                info!("No new posts after {SCROLL_RETRY_LIMIT} scrolls, stopping");
                break;
            }
            let height = driver.page_height().await.context("reading page height")?;
            if !seen_heights.insert(height.round() as i64) {
                info!("Page height stopped growing, no more posts to load");
                break;
            }
            debug!("Grid empty at height {height}, scrolling for more");
            driver
                .scroll_to_bottom()
                .await
                .context("scrolling for more posts")?;
            scroll_retries += 1;
            sleep(SCROLL_DELAY).await;
            continue;
        };

        attempted_hrefs.insert(post.href.clone());
        scroll_retries = 0;
        summary.attempted += 1;
        info!(
            "Post {}/{}: {} ({:?})",
            summary.attempted, cfg.max_items, post.href, post.kind
        );

        match delete_post(driver, &post, cfg.dry_run).await {
            Ok(DeleteOutcome::Deleted) => summary.deleted += 1,
            Ok(DeleteOutcome::Ungrouped) => summary.ungrouped += 1,
            Ok(DeleteOutcome::Failed) => summary.failed += 1,
            Err(e) if e.is_fatal() => {
                return Err(e).context(format!("deleting {}", post.href));
            }
            Err(e) => {
                warn!("Skipping {} after error: {}", post.href, e);
                summary.failed += 1;
            }
        }

        sleep(POST_GAP).await;
        goto_posts_grid(driver, &cfg.username)
            .await
            .context("returning to the posts grid")?;
    }

    Ok(summary)
}

/// Loads the profile grid, switches to the All tab and rewinds to the top
/// so the scan starts from the first row.
async fn goto_posts_grid(driver: &dyn PageDriver, username: &str) -> Result<(), DriverError> {
    driver.navigate(&posts_url(username)).await?;
    sleep(SETTLE_DELAY).await;
    select_all_tab(driver).await?;
    sleep(SETTLE_DELAY).await;
    driver.scroll_to_top().await?;
    Ok(())
}

/// Clicks the "All" tab if the profile shows one. Profiles without tabs
/// already list everything, so not finding it is fine.
async fn select_all_tab(driver: &dyn PageDriver) -> Result<(), DriverError> {
    for selector in ["[role=\"tab\"]", "a", "button"] {
        match driver.find_control_exact(selector, "All").await {
            Ok(Some(tab)) => {
                driver.click(tab.x, tab.y).await?;
                sleep(TAB_DELAY).await;
                return Ok(());
            }
            Ok(None) => continue,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => debug!("Tab lookup via {selector} failed: {e}"),
        }
    }
    debug!("No All tab found, assuming the grid already shows everything");
    Ok(())
}

async fn delete_post(
    driver: &dyn PageDriver,
    post: &Post,
    dry_run: bool,
) -> Result<DeleteOutcome, DriverError> {
    let url = format!("{IMGUR_BASE}{}", post.href);
    driver.navigate(&url).await?;
    sleep(POST_LOAD_DELAY).await;

    match post.kind {
        PostKind::Album => delete_album(driver, &url, dry_run).await,
        PostKind::Image => delete_image(driver, &url, dry_run).await,
    }
}

/// Albums are not deleted outright: the "Delete post" flow ungroups them,
/// releasing the member images back onto the grid as standalone posts that
/// later passes pick up one by one.
async fn delete_album(
    driver: &dyn PageDriver,
    url: &str,
    dry_run: bool,
) -> Result<DeleteOutcome, DriverError> {
    sleep(ALBUM_LOAD_DELAY).await;

    let Some(opener) = driver
        .find_control("button, a, [role=\"button\"]", "Delete post")
        .await?
    else {
        warn!("No album delete control on {url}");
        return Ok(DeleteOutcome::Failed);
    };

    if dry_run {
        info!("[dry-run] Would ungroup album {url} via {:?}", opener.text);
        return Ok(DeleteOutcome::Ungrouped);
    }

    driver.click(opener.x, opener.y).await?;
    sleep(MODAL_DELAY).await;

    for label in ["Delete Post Only", "Delete Post"] {
        if let Some(confirm) = driver
            .find_control("button, [role=\"button\"]", label)
            .await?
        {
            driver.click(confirm.x, confirm.y).await?;
            sleep(CONFIRM_DELAY).await;
            info!("Ungrouped album {url}");
            return Ok(DeleteOutcome::Ungrouped);
        }
    }

    // The opener click sometimes completes the ungroup on its own.
    warn!("No confirm button after opening album dialog on {url}");
    Ok(DeleteOutcome::Ungrouped)
}

async fn delete_image(
    driver: &dyn PageDriver,
    url: &str,
    dry_run: bool,
) -> Result<DeleteOutcome, DriverError> {
    let Some(button) = driver
        .find_control_exact("button, [role=\"button\"]", "Delete image")
        .await?
    else {
        return delete_via_menu(driver, url, dry_run).await;
    };

    driver.click(button.x, button.y).await?;
    sleep(MODAL_DELAY).await;

    if dry_run {
        dismiss_dialog(driver).await?;
        info!("[dry-run] Would delete image {url}");
        return Ok(DeleteOutcome::Deleted);
    }

    let Some(confirm) = driver
        .find_control("button, [role=\"button\"]", "Yes, Delete It")
        .await?
    else {
        warn!("Delete dialog opened but no confirm button on {url}");
        return Ok(DeleteOutcome::Failed);
    };

    driver.click(confirm.x, confirm.y).await?;
    sleep(CONFIRM_DELAY).await;
    info!("Deleted image {url}");
    Ok(DeleteOutcome::Deleted)
}

/// Fallback for layouts without an inline delete button: overflow menu,
/// "Delete image" entry, account-deletion confirm, then a revisit to check
/// the post is actually gone.
async fn delete_via_menu(
    driver: &dyn PageDriver,
    url: &str,
    dry_run: bool,
) -> Result<DeleteOutcome, DriverError> {
    let mut menu = driver
        .find_control(
            r#"button[aria-label*="more" i], button[aria-label*="options" i], button[aria-label*="menu" i]"#,
            "",
        )
        .await?;
    if menu.is_none() {
        menu = driver.find_control_exact("button", "\u{22ef}").await?;
    }
    if menu.is_none() {
        menu = driver.find_control_exact("button", "...").await?;
    }
    let Some(menu) = menu else {
        warn!("No delete button and no overflow menu on {url}");
        return Ok(DeleteOutcome::Failed);
    };

    if dry_run {
        info!("[dry-run] Would delete {url} through the overflow menu");
        return Ok(DeleteOutcome::Deleted);
    }

    driver.click(menu.x, menu.y).await?;
    sleep(MODAL_DELAY).await;

    let Some(item) = driver
        .find_control("[role=\"menuitem\"], button, a", "Delete image")
        .await?
    else {
        warn!("Overflow menu has no delete entry on {url}");
        return Ok(DeleteOutcome::Failed);
    };
    driver.click(item.x, item.y).await?;
    sleep(CONFIRM_DELAY).await;

    let Some(confirm) = driver
        .find_control("button, a, [role=\"button\"]", "Delete from account")
        .await?
    else {
        warn!("No account-deletion confirm on {url}");
        return Ok(DeleteOutcome::Failed);
    };
    driver.click(confirm.x, confirm.y).await?;
    sleep(CONFIRM_DELAY).await;

    for label in ["Yes, Delete It", "Delete", "Confirm"] {
        if driver
            .click_control("button, [role=\"button\"]", label)
            .await?
        {
            sleep(CLICK_REGISTER).await;
            break;
        }
    }

    sleep(VERIFY_DELAY).await;
    if verify_deleted(driver, url).await? {
        info!("Deleted {url} through the overflow menu");
        Ok(DeleteOutcome::Deleted)
    } else {
        warn!("Post {url} still reachable after menu deletion");
        Ok(DeleteOutcome::Failed)
    }
}

/// Closes a confirmation dialog without confirming it.
async fn dismiss_dialog(driver: &dyn PageDriver) -> Result<(), DriverError> {
    for label in ["Cancel", "Close"] {
        if driver
            .click_control("button, [role=\"button\"]", label)
            .await?
        {
            sleep(CLICK_REGISTER).await;
            info!("Dismissed confirmation dialog");
            return Ok(());
        }
    }
    debug!("No dialog to dismiss");
    Ok(())
}

/// Revisits `url` and decides whether the post is gone. A navigation
/// timeout counts as gone; so does an error page or a redirect elsewhere.
async fn verify_deleted(driver: &dyn PageDriver, url: &str) -> Result<bool, DriverError> {
    match driver.navigate(url).await {
        Ok(()) => {}
        Err(e) if e.kind == DriverErrorKind::NavTimeout => return Ok(true),
        Err(e) => return Err(e),
    }
    sleep(SETTLE_DELAY).await;

    let value = driver
        .eval("document.body ? document.body.innerText : ''")
        .await?;
    let body = value.as_str().unwrap_or_default();
    if looks_deleted(body) {
        return Ok(true);
    }

    let current = driver.current_url().await?;
    Ok(!current.contains(url))
}

pub(crate) fn looks_deleted(body_text: &str) -> bool {
    let lower = body_text.to_lowercase();
    ["404", "not found", "page doesn't exist"]
        .iter()
        .any(|marker| lower.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posts_url_targets_the_profile_grid() {
        assert_eq!(
            posts_url("catpics99"),
            "https://imgur.com/user/catpics99/posts"
        );
    }

    #[test]
    fn error_pages_read_as_deleted() {
        assert!(looks_deleted("Zoinks! 404. You broke the internet."));
        assert!(looks_deleted("Page Not Found"));
        assert!(looks_deleted("that page doesn't exist anymore"));
        assert!(!looks_deleted("Fresh memes for you"));
        assert!(!looks_deleted(""));
    }
}
