//! Storage provider that shells out to the rclone CLI.
//!
//! Child stdout and stderr are streamed line by line; stats lines feed the
//! progress parser, everything else accumulates in a diagnostic buffer that
//! is surfaced on failure. Children are killed on cancellation.

use std::collections::BTreeSet;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{NugsError, Result};
use crate::remote::progress::{parse_progress_line, strip_ansi};
use crate::remote::{validate_path_input, StorageProvider, UploadHooks, UploadRequest};

/// rclone's exit code for "directory not found".
const NOT_FOUND_EXIT: i32 = 3;

/// Per-call ceiling for targeted existence checks.
const PATH_EXISTS_TIMEOUT: Duration = Duration::from_secs(30);

/// Ceiling for the remote reachability probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// [`StorageProvider`] backed by an external rclone binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct RcloneStorage;

impl RcloneStorage {
    /// `<remote>:<basePath>` for the requested media tier.
    fn base_uri(cfg: &Config, is_video: bool) -> String {
        let base = if is_video {
            &cfg.rclone_video_path
        } else {
            &cfg.rclone_path
        };
        format!("{}:{}", cfg.rclone_remote, base)
    }

    fn command(cfg: &Config) -> Command {
        let mut cmd = Command::new(&cfg.rclone_binary);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Quick reachability check against the remote root. Not part of the
    /// provider contract; used by `nugs status`.
    pub async fn probe(&self, ctx: &CancellationToken, cfg: &Config) -> Result<bool> {
        if !cfg.rclone_enabled {
            return Ok(false);
        }
        let mut cmd = Self::command(cfg);
        cmd.arg("lsd").arg(format!("{}:", cfg.rclone_remote));
        let output = run_with_timeout(ctx, cmd, PROBE_TIMEOUT).await?;
        Ok(output.status.success())
    }
}

#[async_trait]
impl StorageProvider for RcloneStorage {
    async fn upload(
        &self,
        ctx: &CancellationToken,
        cfg: &Config,
        req: &UploadRequest,
        hooks: &UploadHooks,
    ) -> Result<()> {
        if !cfg.rclone_enabled {
            return Ok(());
        }
        validate_path_input(&req.local_path.to_string_lossy())?;
        validate_path_input(&req.artist_folder)?;

        let total_bytes = tree_size(&req.local_path);
        if total_bytes > 0 {
            if let Some(hook) = &hooks.on_pre_upload {
                hook(total_bytes);
            }
        }

        let dest = format!(
            "{}/{}",
            Self::base_uri(cfg, req.is_video),
            req.artist_folder
        );
        let mut cmd = Self::command(cfg);
        cmd.arg("copy")
            .arg("--progress")
            .args(["--stats", "1s"])
            .arg("--transfers")
            .arg(cfg.rclone_transfers.to_string())
            .arg(&req.local_path)
            .arg(&dest);
        let mut child = cmd.spawn()?;

        let (tx, mut rx) = mpsc::channel::<String>(64);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(stream_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(stream_lines(stderr, tx.clone()));
        }
        drop(tx);

        let mut diagnostics: Vec<String> = Vec::new();
        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    let _ = child.kill().await;
                    return Err(NugsError::Cancelled);
                }
                line = rx.recv() => match line {
                    Some(line) => {
                        if let Some(update) = parse_progress_line(&line) {
                            if let Some(hook) = &hooks.on_progress {
                                hook(update);
                            }
                        } else {
                            let text = strip_ansi(&line);
                            let text = text.trim();
                            if !text.is_empty() {
                                debug!(line = %text, "uploader output");
                                diagnostics.push(text.to_string());
                            }
                        }
                    }
                    None => break,
                },
            }
        }

        let status = tokio::select! {
            _ = ctx.cancelled() => {
                let _ = child.kill().await;
                return Err(NugsError::Cancelled);
            }
            status = child.wait() => status?,
        };
        if !status.success() {
            return Err(NugsError::UploadFailed(format!(
                "rclone exited with {status}: {}",
                diagnostics.join("\n")
            )));
        }
        if let Some(hook) = &hooks.on_complete {
            hook();
        }

        if cfg.delete_after_upload {
            verify_then_delete(ctx, cfg, req, hooks, &dest).await?;
        }
        Ok(())
    }

    async fn path_exists(
        &self,
        ctx: &CancellationToken,
        cfg: &Config,
        remote_path: &str,
        is_video: bool,
    ) -> Result<bool> {
        if !cfg.rclone_enabled {
            return Ok(false);
        }
        validate_path_input(remote_path)?;
        let uri = format!("{}/{}", Self::base_uri(cfg, is_video), remote_path);
        let mut cmd = Self::command(cfg);
        cmd.arg("lsf").arg(&uri);
        let output = run_with_timeout(ctx, cmd, PATH_EXISTS_TIMEOUT).await?;
        if output.status.success() {
            return Ok(true);
        }
        match output.status.code() {
            Some(NOT_FOUND_EXIT) => Ok(false),
            code => Err(NugsError::StorageCheckFailed {
                code,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }

    async fn list_artist_folders(
        &self,
        ctx: &CancellationToken,
        cfg: &Config,
        artist_folder: &str,
        is_video: bool,
    ) -> Result<BTreeSet<String>> {
        if !cfg.rclone_enabled {
            return Ok(BTreeSet::new());
        }
        validate_path_input(artist_folder)?;
        let uri = format!("{}/{}", Self::base_uri(cfg, is_video), artist_folder);
        let mut cmd = Self::command(cfg);
        cmd.arg("lsf").arg("--dirs-only").arg(&uri);

        let output = tokio::select! {
            _ = ctx.cancelled() => return Err(NugsError::Cancelled),
            output = cmd.output() => output?,
        };
        if output.status.success() {
            let folders = String::from_utf8_lossy(&output.stdout)
                .lines()
                .map(|line| line.trim())
                .map(|line| line.strip_suffix('/').unwrap_or(line))
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect();
            return Ok(folders);
        }
        match output.status.code() {
            Some(NOT_FOUND_EXIT) => Ok(BTreeSet::new()),
            code => Err(NugsError::StorageListFailed(format!(
                "rclone lsf exited with {code:?}: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }
}

/// Verify the copy one-way, announce, then remove the local tree. A failed
/// verify keeps everything; any refactor that reorders these steps is a
/// correctness regression.
async fn verify_then_delete(
    ctx: &CancellationToken,
    cfg: &Config,
    req: &UploadRequest,
    hooks: &UploadHooks,
    dest: &str,
) -> Result<()> {
    let mut cmd = RcloneStorage::command(cfg);
    cmd.arg("check")
        .arg("--one-way")
        .arg(&req.local_path)
        .arg(dest);
    let output = tokio::select! {
        _ = ctx.cancelled() => return Err(NugsError::Cancelled),
        output = cmd.output() => output?,
    };
    if !output.status.success() {
        return Err(NugsError::VerifyFailed(format!(
            "rclone check exited with {}: {}\n{}",
            output.status,
            String::from_utf8_lossy(&output.stdout).trim(),
            String::from_utf8_lossy(&output.stderr).trim(),
        )));
    }
    if let Some(hook) = &hooks.on_delete_after_upload {
        hook(&req.local_path);
    }
    tokio::fs::remove_dir_all(&req.local_path).await?;
    Ok(())
}

async fn run_with_timeout(
    ctx: &CancellationToken,
    mut cmd: Command,
    limit: Duration,
) -> Result<std::process::Output> {
    tokio::select! {
        _ = ctx.cancelled() => Err(NugsError::Cancelled),
        result = tokio::time::timeout(limit, cmd.output()) => match result {
            Ok(output) => Ok(output?),
            Err(_) => Err(NugsError::StorageCheckFailed {
                code: None,
                stderr: format!("timed out after {}", humantime::format_duration(limit)),
            }),
        },
    }
}

async fn stream_lines<R: AsyncRead + Unpin>(reader: R, tx: mpsc::Sender<String>) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(line).await.is_err() {
            break;
        }
    }
}

/// Total size of the files under `path`; unreadable entries are skipped.
fn tree_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum()
}
