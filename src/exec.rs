//! Downloader collaborator that delegates to an external program.
//!
//! The media pipeline itself lives outside this tool; the configured
//! command is invoked once per container with the container ID as its last
//! argument.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::Config;
use crate::contracts::Downloader;
use crate::error::{NugsError, Result, NO_CONTENT};
use crate::model::{BatchProgress, StreamParams};

/// Runs `cfg.downloader_command` per album.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandDownloader;

#[async_trait]
impl Downloader for CommandDownloader {
    async fn album(
        &self,
        ctx: &CancellationToken,
        container_id: i64,
        cfg: &Config,
        params: &StreamParams,
        batch: BatchProgress,
    ) -> Result<()> {
        let mut parts = cfg.downloader_command.split_whitespace();
        let program = parts.next().ok_or_else(|| {
            NugsError::DownloadFailed("no downloader_command configured".into())
        })?;
        let mut cmd = Command::new(program);
        cmd.args(parts);
        if let Some(format) = &params.audio_format {
            cmd.arg("--format").arg(format);
        }
        if let Some(format) = &params.video_format {
            cmd.arg("--video-format").arg(format);
        }
        cmd.arg(container_id.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            container_id,
            album = batch.current_album,
            of = batch.total_albums,
            "invoking downloader"
        );
        let output = tokio::select! {
            _ = ctx.cancelled() => return Err(NugsError::Cancelled),
            output = cmd.output() => output?,
        };
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        if stderr.contains(NO_CONTENT) {
            return Err(NugsError::no_content());
        }
        Err(NugsError::DownloadFailed(format!(
            "downloader exited with {}: {}",
            output.status,
            tail(stderr, 5)
        )))
    }
}

/// Last `n` lines of child stderr, enough context without the whole log.
fn tail(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
