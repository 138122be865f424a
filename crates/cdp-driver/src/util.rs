use chromiumoxide::async_process::Child;
use futures::io::{AsyncBufReadExt, BufReader};
use futures::stream::StreamExt;
use tokio::time::{timeout, Duration};

use crate::error::{DriverError, DriverErrorKind};

const WS_URL_DEADLINE: Duration = Duration::from_secs(20);

/// Waits for a freshly launched Chrome to announce its DevTools websocket
/// endpoint on stderr and returns that URL.
pub async fn await_devtools_url(child: &mut Child) -> Result<String, DriverError> {
    let stderr = child.stderr.take().ok_or_else(|| {
        DriverError::new(DriverErrorKind::LaunchFailed)
            .with_hint("chrome process has no stderr handle")
    })?;

    let mut lines = BufReader::new(stderr).lines();
    let mut preview = Vec::new();

    let scan = async {
        while let Some(line) = lines.next().await {
            let line = line.map_err(|err| {
                DriverError::new(DriverErrorKind::LaunchFailed)
                    .with_hint(format!("reading chrome stderr: {err}"))
            })?;
            if let Some(url) = devtools_url_in(&line) {
                return Ok(url.to_string());
            }
            if preview.len() < 8 {
                preview.push(line);
            }
        }
        Err(
            DriverError::new(DriverErrorKind::LaunchFailed).with_hint(format!(
                "chrome exited before announcing its devtools endpoint; stderr began: {}",
                preview.join(" | ")
            )),
        )
    };

    match timeout(WS_URL_DEADLINE, scan).await {
        Ok(result) => result,
        Err(_) => Err(DriverError::new(DriverErrorKind::LaunchFailed)
            .with_hint("timed out waiting for the devtools websocket url")),
    }
}

/// Pulls the websocket URL out of Chrome's `DevTools listening on ws://...`
/// stderr line, if this is that line.
fn devtools_url_in(line: &str) -> Option<&str> {
    let url = line
        .trim_start()
        .strip_prefix("DevTools listening on ")?
        .trim();
    if (url.starts_with("ws://") || url.starts_with("wss://"))
        && url.contains("/devtools/browser/")
    {
        Some(url)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::devtools_url_in;

    #[test]
    fn finds_the_announcement_line() {
        let line =
            "DevTools listening on ws://127.0.0.1:33063/devtools/browser/0b4f9a42-8f2d-4c5e";
        assert_eq!(
            devtools_url_in(line),
            Some("ws://127.0.0.1:33063/devtools/browser/0b4f9a42-8f2d-4c5e")
        );
    }

    #[test]
    fn ignores_unrelated_stderr_noise() {
        assert_eq!(
            devtools_url_in("[1016/150958.281:ERROR:gpu_init.cc(523)] Passthrough not supported"),
            None
        );
        assert_eq!(devtools_url_in("DevTools listening on http://not-a-socket"), None);
        assert_eq!(devtools_url_in(""), None);
    }
}
