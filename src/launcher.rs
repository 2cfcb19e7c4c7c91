//! Chrome process launcher: starts a local Chrome/Chromium binary with a
//! remote-debugging port and waits for its devtools websocket endpoint to
//! appear on stderr.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::debug;
use uuid::Uuid;

use crate::config::{ChromeChannel, Config};
use crate::error::CdpError;

const STARTUP_TIMEOUT: Duration = Duration::from_secs(20);

/// A running Chrome process and the websocket URL of its devtools endpoint.
/// The child is killed when this value is dropped.
pub struct ChromeProcess {
    _child: Child,
    pub ws_url: String,
}

impl ChromeProcess {
    pub async fn launch(config: &Config) -> Result<Self, CdpError> {
        let binary = resolve_binary(config)?;
        let profile_dir = std::env::temp_dir().join(format!("bidicdp-{}", Uuid::new_v4()));

        let mut cmd = Command::new(&binary);
        cmd.arg("--remote-debugging-port=0")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg(format!("--user-data-dir={}", profile_dir.display()))
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);
        if config.headless {
            cmd.arg("--headless=new");
        }
        if config.accept_insecure_certs {
            cmd.arg("--ignore-certificate-errors");
        }
        for arg in &config.chrome_args {
            cmd.arg(arg);
        }

        debug!(binary = %binary.display(), "launching chrome");
        let mut child = cmd
            .spawn()
            .map_err(|err| CdpError::Launch(format!("failed to spawn {}: {err}", binary.display())))?;
        let ws_url = wait_for_ws_url(&mut child).await?;
        Ok(Self { _child: child, ws_url })
    }
}

/// Reads Chrome's stderr until it prints its devtools websocket endpoint, or
/// times out.
async fn wait_for_ws_url(child: &mut Child) -> Result<String, CdpError> {
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| CdpError::Launch("chrome stderr was not piped".to_string()))?;
    let mut lines = BufReader::new(stderr).lines();

    let read = async {
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(%line, "chrome stderr");
            if let Some(url) = line.strip_prefix("DevTools listening on ") {
                return Ok(url.trim().to_string());
            }
        }
        Err(CdpError::Launch(
            "chrome exited before printing its devtools endpoint".to_string(),
        ))
    };

    match tokio::time::timeout(STARTUP_TIMEOUT, read).await {
        Ok(result) => result,
        Err(_) => Err(CdpError::Launch(
            "timed out waiting for chrome to print its devtools endpoint".to_string(),
        )),
    }
}

/// Picks a Chrome/Chromium binary: an explicit `--chrome-binary`, then
/// `$CHROME`, then a channel-appropriate list of well-known binary names.
fn resolve_binary(config: &Config) -> Result<std::path::PathBuf, CdpError> {
    if let Some(path) = &config.chrome_binary {
        return Ok(path.into());
    }
    if let Ok(path) = std::env::var("CHROME") {
        if std::path::Path::new(&path).exists() {
            return Ok(path.into());
        }
    }

    let candidates: &[&str] = match config.channel {
        ChromeChannel::Stable => &["google-chrome-stable", "google-chrome", "chromium", "chromium-browser", "chrome"],
        ChromeChannel::Beta => &["google-chrome-beta", "google-chrome-stable", "chromium"],
        ChromeChannel::Dev => &["google-chrome-unstable", "google-chrome-dev", "chromium"],
        ChromeChannel::Canary => &["google-chrome-canary", "chromium"],
    };
    for name in candidates {
        if let Ok(path) = which::which(name) {
            return Ok(path);
        }
    }

    Err(CdpError::Launch(
        "could not locate a Chrome/Chromium executable; pass --chrome-binary or set $CHROME".to_string(),
    ))
}
