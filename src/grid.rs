//! Post discovery on the profile grid.
//!
//! The grid page renders posts as anchor tiles. We collect every visible
//! anchor with its viewport position, keep the ones whose href looks like a
//! post, and order them the way a person reads the grid: top row first,
//! left to right inside a row.

use cdp_driver::PageDriver;
use serde::Deserialize;
use std::collections::HashSet;

/// Paths that match the loose post pattern but are site chrome.
const BAD_PREFIXES: [&str; 10] = [
    "/upload",
    "/notifications",
    "/settings",
    "/account/",
    "/user/",
    "/t/",
    "/topics",
    "/privacy",
    "/terms",
    "/arcade",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PostKind {
    Image,
    Album,
}

/// One post tile: canonical href plus its on-screen position.
#[derive(Clone, Debug, PartialEq)]
pub struct Post {
    pub href: String,
    pub kind: PostKind,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Deserialize)]
struct RawAnchor {
    href: String,
    x: f64,
    y: f64,
}

/// Collects candidate post anchors with their bounding-box positions.
/// Anchors with a zero-sized box are hidden and skipped.
const SCAN_JS: &str = r#"
(() => {
    const selector = [
        'a[href^="/gallery/"]',
        'a[href^="/a/"]',
        'a[href^="/post/"]',
        'a[href^="/image/"]',
        'a[href^="/"]',
    ].join(', ');
    const out = [];
    for (const a of document.querySelectorAll(selector)) {
        const r = a.getBoundingClientRect();
        if (r.width <= 0 || r.height <= 0) continue;
        const href = a.getAttribute('href');
        if (!href) continue;
        out.push({ href: href, x: r.x, y: r.y });
    }
    return out;
})()
"#;

/// True when a relative href plausibly points at one of the account's posts.
fn is_post_href(href: &str) -> bool {
    if !href.starts_with('/') {
        return false;
    }
    if BAD_PREFIXES.iter().any(|p| href.starts_with(p)) {
        return false;
    }
    let tail = &href[1..];
    if tail.starts_with("gallery/")
        || tail.starts_with("a/")
        || tail.starts_with("post/")
        || tail.starts_with("image/")
    {
        return true;
    }
    // Bare post hashes: at least five leading alphanumeric characters.
    tail.chars().take_while(|c| c.is_ascii_alphanumeric()).count() >= 5
}

fn classify(href: &str) -> PostKind {
    if href.starts_with("/a/") || href.starts_with("/gallery/") {
        PostKind::Album
    } else {
        PostKind::Image
    }
}

/// Filters raw anchors down to posts and imposes the visual reading order.
///
/// Positions are rounded to whole pixels before comparing so sub-pixel
/// layout jitter cannot reshuffle a row. The sort is stable and duplicate
/// hrefs keep their first (topmost) occurrence.
fn order_posts(anchors: Vec<RawAnchor>) -> Vec<Post> {
    let mut posts: Vec<Post> = anchors
        .into_iter()
        .filter_map(|a| {
            let href = a.href.split(['#', '?']).next().unwrap_or("").to_string();
            if !is_post_href(&href) {
                return None;
            }
            let kind = classify(&href);
            Some(Post {
                href,
                kind,
                x: a.x,
                y: a.y,
            })
        })
        .collect();

    posts.sort_by_key(|p| (p.y.round() as i64, p.x.round() as i64));

    let mut seen = HashSet::new();
    posts.retain(|p| seen.insert(p.href.clone()));
    posts
}

/// Scans the current page for post tiles, ordered top row first then left
/// to right.
pub async fn scan(driver: &dyn PageDriver) -> Result<Vec<Post>, cdp_driver::DriverError> {
    let value = driver.eval(SCAN_JS).await?;
    let anchors: Vec<RawAnchor> = serde_json::from_value(value).map_err(|e| {
        cdp_driver::DriverError::new(cdp_driver::DriverErrorKind::Internal)
            .with_hint(format!("grid scan returned unexpected shape: {e}"))
    })?;
    Ok(order_posts(anchors))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor(href: &str, x: f64, y: f64) -> RawAnchor {
        RawAnchor {
            href: href.to_string(),
            x,
            y,
        }
    }

    #[test]
    fn recognizes_post_hrefs() {
        assert!(is_post_href("/gallery/abc"));
        assert!(is_post_href("/a/xYz12"));
        assert!(is_post_href("/post/123456"));
        assert!(is_post_href("/image/AbCdE"));
        assert!(is_post_href("/AbCd3fG"));

        assert!(!is_post_href("/upload"));
        assert!(!is_post_href("/user/someone"));
        assert!(!is_post_href("/t/funny"));
        assert!(!is_post_href("/abc"));
        assert!(!is_post_href("https://imgur.com/AbCd3fG"));
        assert!(!is_post_href("/sign-in$x"));
    }

    #[test]
    fn classifies_albums_by_prefix() {
        assert_eq!(classify("/a/xYz12"), PostKind::Album);
        assert_eq!(classify("/gallery/abc12"), PostKind::Album);
        assert_eq!(classify("/post/abc12"), PostKind::Image);
        assert_eq!(classify("/AbCd3fG"), PostKind::Image);
    }

    #[test]
    fn strips_query_and_fragment() {
        let posts = order_posts(vec![anchor("/AbCd3fG?query=1#frag", 0.0, 0.0)]);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].href, "/AbCd3fG");
    }

    #[test]
    fn orders_rows_top_down_then_left_to_right() {
        let posts = order_posts(vec![
            anchor("/row2col1", 10.0, 300.0),
            anchor("/row1col2", 250.0, 100.0),
            anchor("/row1col1", 10.0, 100.0),
            anchor("/row2col2", 250.0, 300.0),
        ]);
        let hrefs: Vec<_> = posts.iter().map(|p| p.href.as_str()).collect();
        assert_eq!(hrefs, vec!["/row1col1", "/row1col2", "/row2col1", "/row2col2"]);
    }

    #[test]
    fn subpixel_jitter_does_not_break_rows() {
        let posts = order_posts(vec![
            anchor("/right1", 250.0, 100.4),
            anchor("/left99", 10.0, 99.8),
        ]);
        let hrefs: Vec<_> = posts.iter().map(|p| p.href.as_str()).collect();
        assert_eq!(hrefs, vec!["/left99", "/right1"]);
    }

    #[test]
    fn duplicate_hrefs_keep_first_occurrence() {
        let posts = order_posts(vec![
            anchor("/AbCd3fG", 10.0, 100.0),
            anchor("/other12", 250.0, 100.0),
            anchor("/AbCd3fG", 10.0, 300.0),
        ]);
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].href, "/AbCd3fG");
        assert!((posts[0].y - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn chrome_links_are_filtered_out() {
        let posts = order_posts(vec![
            anchor("/upload", 0.0, 0.0),
            anchor("/settings", 0.0, 10.0),
            anchor("/AbCd3fG", 0.0, 20.0),
        ]);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].href, "/AbCd3fG");
    }
}
