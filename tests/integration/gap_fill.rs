//! Gap-fill executor: result totals, failure capture with diagnostics, and
//! idempotent re-runs.

#![allow(missing_docs)]

mod support;

use nugs::config::Config;
use nugs::contracts::{DefaultMediaClassifier, NullProgress};
use nugs::error::NugsError;
use nugs::gapfill::{fill, GapFillDeps};
use nugs::model::{MediaType, StreamParams};
use nugs::names::{album_folder_name, sanitize};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

use support::{show, ScriptedDownloader, ScriptedMeta, StaticStorage};

fn cfg_with_out(out: &std::path::Path) -> Config {
    Config {
        out_path: out.to_path_buf(),
        ..Config::default()
    }
}

#[tokio::test]
async fn totals_account_for_every_missing_show() {
    let out = tempdir().unwrap();
    let cfg = cfg_with_out(out.path());
    let shows = [
        show(1, "Billy Strings", "Show A", "2025-03-01"),
        show(2, "Billy Strings", "Show B", "2025-02-01"),
        show(3, "Billy Strings", "Show C", "2025-01-01"),
    ];
    let meta = ScriptedMeta::with_shows(500, &shows);
    let storage = StaticStorage::default();
    let classifier = DefaultMediaClassifier;
    let mut downloader = ScriptedDownloader::default();
    downloader.failing.insert(2);
    let progress = NullProgress;
    let deps = GapFillDeps {
        meta: &meta,
        storage: &storage,
        classifier: &classifier,
        downloader: &downloader,
        progress: &progress,
    };
    let ctx = CancellationToken::new();

    let result = fill(
        &ctx,
        500,
        &cfg,
        &StreamParams::default(),
        MediaType::Both,
        false,
        &deps,
    )
    .await
    .expect("per-show failures do not fail the call");

    assert_eq!(result.total_missing, 3);
    assert_eq!(result.downloaded, 2);
    assert_eq!(result.failed, 1);
    assert_eq!(result.attempted, result.downloaded + result.failed);
    assert_eq!(
        result.remaining,
        result.total_missing - result.attempted
    );
    assert!(!result.interrupted);

    assert_eq!(result.failed_shows.len(), 1);
    let failure = &result.failed_shows[0];
    assert_eq!(failure.container_id, 2);
    assert!(failure.error.contains("scripted download failure"));
    assert_eq!(
        failure.reason,
        "No content found at expected local/remote paths"
    );
    assert!(!failure.diagnostic.local_audio_exists);
}

#[tokio::test]
async fn downloads_run_newest_first_and_sequentially() {
    let out = tempdir().unwrap();
    let cfg = cfg_with_out(out.path());
    let shows = [
        show(1, "Billy Strings", "Oldest", "2024-01-01"),
        show(2, "Billy Strings", "Newest", "2025-06-01"),
        show(3, "Billy Strings", "Middle", "2025-01-01"),
    ];
    let meta = ScriptedMeta::with_shows(500, &shows);
    let storage = StaticStorage::default();
    let classifier = DefaultMediaClassifier;
    let downloader = ScriptedDownloader::default();
    let progress = NullProgress;
    let deps = GapFillDeps {
        meta: &meta,
        storage: &storage,
        classifier: &classifier,
        downloader: &downloader,
        progress: &progress,
    };
    let ctx = CancellationToken::new();

    fill(
        &ctx,
        500,
        &cfg,
        &StreamParams::default(),
        MediaType::Both,
        false,
        &deps,
    )
    .await
    .unwrap();
    assert_eq!(*downloader.calls.lock().unwrap(), vec![2, 3, 1]);
}

#[tokio::test]
async fn second_run_finds_nothing_missing() {
    let out = tempdir().unwrap();
    let cfg = cfg_with_out(out.path());
    let shows = [
        show(1, "Billy Strings", "Show A", "2025-01-01"),
        show(2, "Billy Strings", "Show B", "2025-02-01"),
    ];
    let meta = ScriptedMeta::with_shows(500, &shows);
    let storage = StaticStorage::default();
    let classifier = DefaultMediaClassifier;

    // Successful downloads materialize the album folders the classifier
    // will find on the next pass.
    let artist_dir = out.path().join(sanitize("Billy Strings"));
    let mut downloader = ScriptedDownloader::default();
    for s in &shows {
        downloader.creates.insert(
            s.container_id,
            artist_dir.join(album_folder_name("Billy Strings", &s.container_info)),
        );
    }
    let progress = NullProgress;
    let deps = GapFillDeps {
        meta: &meta,
        storage: &storage,
        classifier: &classifier,
        downloader: &downloader,
        progress: &progress,
    };
    let ctx = CancellationToken::new();

    let first = fill(
        &ctx,
        500,
        &cfg,
        &StreamParams::default(),
        MediaType::Both,
        false,
        &deps,
    )
    .await
    .unwrap();
    assert_eq!(first.downloaded, 2);
    assert_eq!(first.remaining, 0);

    let second = fill(
        &ctx,
        500,
        &cfg,
        &StreamParams::default(),
        MediaType::Both,
        false,
        &deps,
    )
    .await
    .unwrap();
    assert_eq!(second.total_missing, 0);
    assert_eq!(second.downloaded, 0);
    assert_eq!(second.remaining, 0);
    assert_eq!(downloader.call_count(), 2, "nothing re-downloaded");
}

#[tokio::test]
async fn analyzer_failure_propagates() {
    let out = tempdir().unwrap();
    let cfg = cfg_with_out(out.path());
    let meta = ScriptedMeta::default();
    let storage = StaticStorage::default();
    let classifier = DefaultMediaClassifier;
    let downloader = ScriptedDownloader::default();
    let progress = NullProgress;
    let deps = GapFillDeps {
        meta: &meta,
        storage: &storage,
        classifier: &classifier,
        downloader: &downloader,
        progress: &progress,
    };
    let ctx = CancellationToken::new();

    let err = fill(
        &ctx,
        999,
        &cfg,
        &StreamParams::default(),
        MediaType::Both,
        false,
        &deps,
    )
    .await
    .expect_err("no shows for the artist");
    assert!(matches!(err, NugsError::InvalidArgument(_)));
    assert_eq!(downloader.call_count(), 0);
}
