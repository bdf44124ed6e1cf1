//! Watch orchestrator behavior: empty list, per-artist failure isolation,
//! pre-cancellation, and the notification protocol.

#![allow(missing_docs)]

mod support;

use nugs::cache::CacheStore;
use nugs::config::Config;
use nugs::contracts::{DefaultMediaClassifier, NullProgress};
use nugs::error::NugsError;
use nugs::model::{MediaType, StreamParams};
use nugs::watch::{check, WatchDeps};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

use support::{
    artist_page, recent_item, show, snapshot, RecordingNotifier, ScriptedCatalog, ScriptedDownloader,
    ScriptedMeta, StaticStorage,
};

fn cfg_watching(out: &std::path::Path, artists: &[&str]) -> Config {
    Config {
        out_path: out.to_path_buf(),
        watched_artists: artists.iter().map(|s| s.to_string()).collect(),
        ..Config::default()
    }
}

#[tokio::test]
async fn empty_watch_list_is_a_no_op() {
    let cache = tempdir().unwrap();
    let out = tempdir().unwrap();
    let store = CacheStore::at(cache.path().to_path_buf()).unwrap();
    let catalog = ScriptedCatalog::default();
    let meta = ScriptedMeta::default();
    let storage = StaticStorage::default();
    let classifier = DefaultMediaClassifier;
    let downloader = ScriptedDownloader::default();
    let notifier = RecordingNotifier::default();
    let progress = NullProgress;
    let deps = WatchDeps {
        store: &store,
        catalog: &catalog,
        meta: &meta,
        storage: &storage,
        classifier: &classifier,
        downloader: &downloader,
        notifier: &notifier,
        progress: &progress,
    };
    let cfg = cfg_watching(out.path(), &[]);
    let ctx = CancellationToken::new();

    let outcome = check(&ctx, &cfg, &StreamParams::default(), MediaType::Both, false, &deps)
        .await
        .unwrap();
    assert_eq!(catalog.call_count(), 0, "catalog fetcher must not be called");
    assert_eq!(outcome.downloaded, 0);
    assert!(notifier.messages().is_empty());
}

#[tokio::test]
async fn per_artist_failures_are_isolated() {
    let cache = tempdir().unwrap();
    let out = tempdir().unwrap();
    let store = CacheStore::at(cache.path().to_path_buf()).unwrap();
    let catalog = ScriptedCatalog::returning(snapshot(vec![recent_item(
        1, 500, "Phish", "2025-01-01", "A",
    )]));
    let mut meta = ScriptedMeta::default();
    meta.failing.insert(1125);
    // Artist 461 answers with a page carrying zero shows.
    meta.pages.insert(461, vec![artist_page(&[])]);
    let storage = StaticStorage::default();
    let classifier = DefaultMediaClassifier;
    let downloader = ScriptedDownloader::default();
    let notifier = RecordingNotifier::default();
    let progress = NullProgress;
    let deps = WatchDeps {
        store: &store,
        catalog: &catalog,
        meta: &meta,
        storage: &storage,
        classifier: &classifier,
        downloader: &downloader,
        notifier: &notifier,
        progress: &progress,
    };
    let cfg = cfg_watching(out.path(), &["1125", "461"]);
    let ctx = CancellationToken::new();

    let outcome = check(&ctx, &cfg, &StreamParams::default(), MediaType::Both, false, &deps)
        .await
        .expect("per-artist failures are non-fatal");
    assert_eq!(meta.call_count(), 2, "both artists must be attempted");
    assert_eq!(outcome.artist_errors.len(), 2);
    assert!(outcome.artist_errors[0].starts_with("1125:"));
    assert!(outcome.artist_errors[1].contains("no shows for artist 461"));

    // Errors only: one summary at error priority, bodies joined.
    let messages = notifier.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0, "Nugs Watch Error");
    assert_eq!(messages[0].2, 7);
    assert!(messages[0].1.contains("1125:"));
}

#[tokio::test]
async fn pre_cancelled_ctx_does_no_work() {
    let cache = tempdir().unwrap();
    let out = tempdir().unwrap();
    let store = CacheStore::at(cache.path().to_path_buf()).unwrap();
    let catalog = ScriptedCatalog::default();
    let meta = ScriptedMeta::default();
    let storage = StaticStorage::default();
    let classifier = DefaultMediaClassifier;
    let downloader = ScriptedDownloader::default();
    let notifier = RecordingNotifier::default();
    let progress = NullProgress;
    let deps = WatchDeps {
        store: &store,
        catalog: &catalog,
        meta: &meta,
        storage: &storage,
        classifier: &classifier,
        downloader: &downloader,
        notifier: &notifier,
        progress: &progress,
    };
    let cfg = cfg_watching(out.path(), &["1125", "461", "1045"]);
    let ctx = CancellationToken::new();
    ctx.cancel();

    let err = check(&ctx, &cfg, &StreamParams::default(), MediaType::Both, false, &deps)
        .await
        .expect_err("cancelled before any work");
    assert!(matches!(err, NugsError::Cancelled));
    assert_eq!(meta.call_count(), 0);
    assert_eq!(catalog.call_count(), 0);
    assert!(notifier.messages().is_empty());
}

#[tokio::test]
async fn multi_artist_downloads_notify_per_artist_then_summarize() {
    let cache = tempdir().unwrap();
    let out = tempdir().unwrap();
    let store = CacheStore::at(cache.path().to_path_buf()).unwrap();
    let catalog = ScriptedCatalog::default();
    let mut meta = ScriptedMeta::default();
    meta.pages.insert(
        100,
        vec![artist_page(&[show(11, "Artist Hundred", "Show H", "2025-01-01")])],
    );
    meta.pages.insert(
        200,
        vec![artist_page(&[show(21, "Artist Two Hundred", "Show T", "2025-01-02")])],
    );
    let storage = StaticStorage::default();
    let classifier = DefaultMediaClassifier;
    let downloader = ScriptedDownloader::default();
    let notifier = RecordingNotifier::default();
    let progress = NullProgress;
    let deps = WatchDeps {
        store: &store,
        catalog: &catalog,
        meta: &meta,
        storage: &storage,
        classifier: &classifier,
        downloader: &downloader,
        notifier: &notifier,
        progress: &progress,
    };
    let cfg = cfg_watching(out.path(), &["100", "200"]);
    let ctx = CancellationToken::new();

    let outcome = check(&ctx, &cfg, &StreamParams::default(), MediaType::Both, false, &deps)
        .await
        .unwrap();
    assert_eq!(outcome.downloaded, 2);
    assert_eq!(downloader.call_count(), 2);

    // Per-artist notifications fire in watch-list order, summary last.
    let messages = notifier.messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].0, "Nugs Watch");
    assert!(messages[0].1.contains("for Artist Hundred"));
    assert_eq!(messages[0].2, 5);
    assert!(messages[1].1.contains("for Artist Two Hundred"));
    assert_eq!(messages[2].1, "2 new show(s) downloaded");
}

#[tokio::test]
async fn single_artist_run_emits_summary_only() {
    let cache = tempdir().unwrap();
    let out = tempdir().unwrap();
    let store = CacheStore::at(cache.path().to_path_buf()).unwrap();
    let catalog = ScriptedCatalog::default();
    let meta = ScriptedMeta::with_shows(100, &[show(11, "Artist Hundred", "Show H", "2025-01-01")]);
    let storage = StaticStorage::default();
    let classifier = DefaultMediaClassifier;
    let downloader = ScriptedDownloader::default();
    let notifier = RecordingNotifier::default();
    let progress = NullProgress;
    let deps = WatchDeps {
        store: &store,
        catalog: &catalog,
        meta: &meta,
        storage: &storage,
        classifier: &classifier,
        downloader: &downloader,
        notifier: &notifier,
        progress: &progress,
    };
    let cfg = cfg_watching(out.path(), &["100"]);
    let ctx = CancellationToken::new();

    let outcome = check(&ctx, &cfg, &StreamParams::default(), MediaType::Both, false, &deps)
        .await
        .unwrap();
    assert_eq!(outcome.downloaded, 1);

    let messages = notifier.messages();
    assert_eq!(messages.len(), 1, "single-artist runs summarize only");
    assert_eq!(messages[0].1, "1 new show(s) downloaded");
}

#[tokio::test]
async fn catalog_fetch_failure_is_non_fatal() {
    let cache = tempdir().unwrap();
    let out = tempdir().unwrap();
    let store = CacheStore::at(cache.path().to_path_buf()).unwrap();
    let catalog = ScriptedCatalog {
        fail: true,
        ..ScriptedCatalog::default()
    };
    let meta = ScriptedMeta::with_shows(100, &[show(11, "Artist Hundred", "Show H", "2025-01-01")]);
    let storage = StaticStorage::default();
    let classifier = DefaultMediaClassifier;
    let downloader = ScriptedDownloader::default();
    let notifier = RecordingNotifier::default();
    let progress = NullProgress;
    let deps = WatchDeps {
        store: &store,
        catalog: &catalog,
        meta: &meta,
        storage: &storage,
        classifier: &classifier,
        downloader: &downloader,
        notifier: &notifier,
        progress: &progress,
    };
    let cfg = cfg_watching(out.path(), &["100"]);
    let ctx = CancellationToken::new();

    let outcome = check(&ctx, &cfg, &StreamParams::default(), MediaType::Both, false, &deps)
        .await
        .expect("watch continues with cached catalog");
    assert!(outcome.update.is_none());
    assert_eq!(outcome.downloaded, 1, "gap-fill still ran");
}
