//! Small concurrency utilities shared by the analyzer and the gap-fill
//! executor: bounded fan-out with stable ordering, signal-to-token
//! bridging, rate-limited diagnostics, and render pacing.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Worker width used for presence classification.
pub const CLASSIFY_POOL_WIDTH: usize = 8;

/// Runs `f` over `items` with at most `width` futures in flight.
///
/// Results come back in input order regardless of completion order; the
/// slots are keyed by index, not by finish time.
pub async fn bounded_map<T, R, F, Fut>(items: Vec<T>, width: usize, f: F) -> Vec<R>
where
    F: Fn(usize, T) -> Fut,
    Fut: Future<Output = R>,
{
    use futures::StreamExt;

    let tagged = items.into_iter().enumerate().map(|(index, item)| {
        let fut = f(index, item);
        async move { (index, fut.await) }
    });
    let mut indexed: Vec<(usize, R)> = futures::stream::iter(tagged)
        .buffer_unordered(width.max(1))
        .collect()
        .await;
    indexed.sort_unstable_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, result)| result).collect()
}

/// Bridges the first interrupt signal into a child cancellation token.
///
/// The first Ctrl-C cancels the child token and records the interruption so
/// callers can surface it distinctly from an outer cancellation; a second
/// Ctrl-C terminates the process.
pub struct InterruptGuard {
    token: CancellationToken,
    interrupted: Arc<AtomicBool>,
    listener: JoinHandle<()>,
}

impl InterruptGuard {
    /// Installs the signal listener and returns the bridged guard.
    pub fn install(parent: &CancellationToken) -> InterruptGuard {
        let token = parent.child_token();
        let interrupted = Arc::new(AtomicBool::new(false));
        let listener = tokio::spawn({
            let token = token.clone();
            let interrupted = Arc::clone(&interrupted);
            async move {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                interrupted.store(true, Ordering::SeqCst);
                token.cancel();
                warn!("interrupt received, finishing current item; press Ctrl-C again to abort");
                if tokio::signal::ctrl_c().await.is_ok() {
                    std::process::exit(130);
                }
            }
        });
        InterruptGuard {
            token,
            interrupted,
            listener,
        }
    }

    /// Token to hand to interruptible work.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Whether an interrupt signal fired (as opposed to an outer cancel).
    pub fn interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

/// Rate limiter for remote existence-check warnings.
///
/// The first [`WARN_LIMIT`] failures are logged, the next one logs a
/// suppression notice, everything after that is silent. The counter spans
/// the process lifetime so large batches do not re-flood between runs.
pub struct WarnLimiter {
    count: AtomicU32,
}

/// Failures logged before suppression kicks in.
pub const WARN_LIMIT: u32 = 3;

/// Decision for one warning occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarnAction {
    Print,
    Suppress,
    Silent,
}

impl WarnLimiter {
    /// A fresh limiter; tests use their own instances.
    pub const fn new() -> WarnLimiter {
        WarnLimiter {
            count: AtomicU32::new(0),
        }
    }

    /// Records one occurrence and returns how to report it.
    pub fn observe(&self) -> WarnAction {
        let n = self.count.fetch_add(1, Ordering::Relaxed) + 1;
        if n <= WARN_LIMIT {
            WarnAction::Print
        } else if n == WARN_LIMIT + 1 {
            WarnAction::Suppress
        } else {
            WarnAction::Silent
        }
    }
}

impl Default for WarnLimiter {
    fn default() -> Self {
        WarnLimiter::new()
    }
}

/// Process-wide limiter for remote check warnings. Never reset.
pub static REMOTE_CHECK_WARNS: WarnLimiter = WarnLimiter::new();

/// Logs a remote existence-check failure through the process-wide limiter.
pub fn warn_remote_check_error(what: &str, err: &crate::error::NugsError) {
    match REMOTE_CHECK_WARNS.observe() {
        WarnAction::Print => warn!(%what, %err, "remote existence check failed"),
        WarnAction::Suppress => {
            warn!("further remote existence check warnings suppressed")
        }
        WarnAction::Silent => {}
    }
}

/// Minimum-interval gate for progress rendering.
pub struct RenderGate {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RenderGate {
    /// Gate that admits at most one render per `min_interval`.
    pub fn new(min_interval: Duration) -> RenderGate {
        RenderGate {
            min_interval,
            last: Mutex::new(None),
        }
    }

    /// True when enough time has passed since the last admitted render.
    pub fn should_render(&self) -> bool {
        let mut last = self.last.lock().unwrap_or_else(|err| err.into_inner());
        let now = Instant::now();
        match *last {
            Some(prev) if now.duration_since(prev) < self.min_interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}
