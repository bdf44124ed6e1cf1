//! Storage provider behavior against a stubbed uploader binary: listing,
//! targeted existence, upload hooks, and the verify-then-delete ordering.

#![cfg(unix)]
#![allow(missing_docs)]

use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use nugs::config::Config;
use nugs::error::NugsError;
use nugs::remote::{RcloneStorage, StorageProvider, UploadHooks, UploadRequest};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

/// Writes an executable stub that plays the uploader binary.
fn stub_binary(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    let mut file = fs::File::create(&path).unwrap();
    writeln!(file, "#!/bin/sh").unwrap();
    writeln!(file, "{body}").unwrap();
    drop(file);
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn remote_cfg(binary: &Path) -> Config {
    Config {
        rclone_enabled: true,
        rclone_binary: binary.display().to_string(),
        rclone_remote: "stub".into(),
        rclone_path: "Music/Nugs".into(),
        rclone_video_path: "Videos/Nugs".into(),
        ..Config::default()
    }
}

fn album_tree(dir: &Path) -> PathBuf {
    let album = dir.join("Billy Strings - Show A");
    fs::create_dir_all(&album).unwrap();
    fs::write(album.join("01 Track.flac"), vec![0u8; 64]).unwrap();
    fs::write(album.join("02 Track.flac"), vec![0u8; 64]).unwrap();
    album
}

#[tokio::test]
async fn listing_trims_slashes_and_blank_lines() {
    let dir = tempdir().unwrap();
    let binary = stub_binary(
        dir.path(),
        "fake-rclone",
        r#"printf 'Show A/\n  Show B/  \n\n'"#,
    );
    let cfg = remote_cfg(&binary);
    let ctx = CancellationToken::new();

    let folders = RcloneStorage
        .list_artist_folders(&ctx, &cfg, "Billy Strings", false)
        .await
        .unwrap();
    assert_eq!(
        folders.into_iter().collect::<Vec<_>>(),
        vec!["Show A".to_string(), "Show B".to_string()]
    );
}

#[tokio::test]
async fn listing_not_found_is_empty() {
    let dir = tempdir().unwrap();
    let binary = stub_binary(dir.path(), "fake-rclone", "exit 3");
    let cfg = remote_cfg(&binary);
    let ctx = CancellationToken::new();

    let folders = RcloneStorage
        .list_artist_folders(&ctx, &cfg, "Billy Strings", false)
        .await
        .unwrap();
    assert!(folders.is_empty());
}

#[tokio::test]
async fn listing_other_failures_surface() {
    let dir = tempdir().unwrap();
    let binary = stub_binary(dir.path(), "fake-rclone", "echo 'quota exceeded' >&2; exit 7");
    let cfg = remote_cfg(&binary);
    let ctx = CancellationToken::new();

    let err = RcloneStorage
        .list_artist_folders(&ctx, &cfg, "Billy Strings", false)
        .await
        .unwrap_err();
    match err {
        NugsError::StorageListFailed(message) => assert!(message.contains("quota exceeded")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn path_exists_maps_exit_codes() {
    let dir = tempdir().unwrap();
    let ctx = CancellationToken::new();

    let found = stub_binary(dir.path(), "rclone-found", "exit 0");
    assert!(RcloneStorage
        .path_exists(&ctx, &remote_cfg(&found), "A/B", false)
        .await
        .unwrap());

    let missing = stub_binary(dir.path(), "rclone-missing", "exit 3");
    assert!(!RcloneStorage
        .path_exists(&ctx, &remote_cfg(&missing), "A/B", false)
        .await
        .unwrap());

    let broken = stub_binary(dir.path(), "rclone-broken", "echo nope >&2; exit 5");
    let err = RcloneStorage
        .path_exists(&ctx, &remote_cfg(&broken), "A/B", false)
        .await
        .unwrap_err();
    match err {
        NugsError::StorageCheckFailed { code, stderr } => {
            assert_eq!(code, Some(5));
            assert_eq!(stderr, "nope");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn invalid_paths_are_rejected_before_spawning() {
    let dir = tempdir().unwrap();
    // A stub that would blow up if it ever ran.
    let binary = stub_binary(dir.path(), "fake-rclone", "exit 99");
    let cfg = remote_cfg(&binary);
    let ctx = CancellationToken::new();

    let err = RcloneStorage
        .path_exists(&ctx, &cfg, "a/../b", false)
        .await
        .unwrap_err();
    assert!(matches!(err, NugsError::InvalidPath(_)));

    let err = RcloneStorage
        .list_artist_folders(&ctx, &cfg, "bad\nname", false)
        .await
        .unwrap_err();
    assert!(matches!(err, NugsError::InvalidPath(_)));
}

#[tokio::test]
async fn upload_streams_progress_and_fires_hooks_in_order() {
    let dir = tempdir().unwrap();
    let album = album_tree(dir.path());
    let binary = stub_binary(
        dir.path(),
        "fake-rclone",
        r#"echo 'Transferred:    64 B / 128 B, 50%, 10 B/s, ETA 6s'
echo 'Transferred:    128 B / 128 B, 100%, 10 B/s, ETA 0s'
exit 0"#,
    );
    let cfg = remote_cfg(&binary);
    let ctx = CancellationToken::new();

    let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let pre = Arc::clone(&events);
    let prog = Arc::clone(&events);
    let done = Arc::clone(&events);
    let hooks = UploadHooks {
        on_pre_upload: Some(Box::new(move |total| {
            pre.lock().unwrap().push(format!("pre:{total}"));
        })),
        on_progress: Some(Box::new(move |update| {
            prog.lock().unwrap().push(format!("progress:{}", update.percent));
        })),
        on_complete: Some(Box::new(move || {
            done.lock().unwrap().push("complete".into());
        })),
        on_delete_after_upload: None,
    };
    RcloneStorage
        .upload(
            &ctx,
            &cfg,
            &UploadRequest {
                local_path: album,
                artist_folder: "Billy Strings".into(),
                is_video: false,
            },
            &hooks,
        )
        .await
        .unwrap();

    let events = events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec!["pre:128", "progress:50", "progress:100", "complete"]
    );
}

#[tokio::test]
async fn upload_failure_carries_diagnostic_lines() {
    let dir = tempdir().unwrap();
    let album = album_tree(dir.path());
    let binary = stub_binary(
        dir.path(),
        "fake-rclone",
        r#"echo 'Transferred: 1 B / 128 B, 1%, 1 B/s'
echo 'ERROR: insufficient permissions' >&2
exit 1"#,
    );
    let cfg = remote_cfg(&binary);
    let ctx = CancellationToken::new();

    let err = RcloneStorage
        .upload(
            &ctx,
            &cfg,
            &UploadRequest {
                local_path: album.clone(),
                artist_folder: "Billy Strings".into(),
                is_video: false,
            },
            &UploadHooks::default(),
        )
        .await
        .unwrap_err();
    match err {
        NugsError::UploadFailed(message) => {
            assert!(message.contains("insufficient permissions"));
            assert!(!message.contains("Transferred:"), "progress is not diagnostics");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(album.exists(), "failed upload never deletes local files");
}

#[tokio::test]
async fn verify_failure_keeps_local_tree() {
    let dir = tempdir().unwrap();
    let album = album_tree(dir.path());
    // copy succeeds, check fails
    let binary = stub_binary(
        dir.path(),
        "fake-rclone",
        r#"case "$1" in
  copy) exit 0;;
  check) echo '1 differences found' >&2; exit 1;;
esac"#,
    );
    let cfg = Config {
        delete_after_upload: true,
        ..remote_cfg(&binary)
    };
    let ctx = CancellationToken::new();

    let deleted: Arc<Mutex<bool>> = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&deleted);
    let hooks = UploadHooks {
        on_delete_after_upload: Some(Box::new(move |_| {
            *flag.lock().unwrap() = true;
        })),
        ..UploadHooks::default()
    };
    let err = RcloneStorage
        .upload(
            &ctx,
            &cfg,
            &UploadRequest {
                local_path: album.clone(),
                artist_folder: "Billy Strings".into(),
                is_video: false,
            },
            &hooks,
        )
        .await
        .unwrap_err();
    match err {
        NugsError::VerifyFailed(message) => assert!(message.contains("differences found")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(album.exists(), "failed verify must not delete");
    assert!(!*deleted.lock().unwrap(), "delete hook must not fire");
}

#[tokio::test]
async fn verify_success_notifies_then_deletes() {
    let dir = tempdir().unwrap();
    let album = album_tree(dir.path());
    let binary = stub_binary(dir.path(), "fake-rclone", "exit 0");
    let cfg = Config {
        delete_after_upload: true,
        ..remote_cfg(&binary)
    };
    let ctx = CancellationToken::new();

    let saw_tree: Arc<Mutex<Option<bool>>> = Arc::new(Mutex::new(None));
    let flag = Arc::clone(&saw_tree);
    let hooks = UploadHooks {
        on_delete_after_upload: Some(Box::new(move |path| {
            // The tree must still exist when the hook observes it.
            *flag.lock().unwrap() = Some(path.exists());
        })),
        ..UploadHooks::default()
    };
    RcloneStorage
        .upload(
            &ctx,
            &cfg,
            &UploadRequest {
                local_path: album.clone(),
                artist_folder: "Billy Strings".into(),
                is_video: false,
            },
            &hooks,
        )
        .await
        .unwrap();
    assert_eq!(*saw_tree.lock().unwrap(), Some(true));
    assert!(!album.exists(), "verified upload removes the local tree");
}

#[tokio::test]
async fn disabled_remote_uploads_are_no_ops() {
    let dir = tempdir().unwrap();
    let album = album_tree(dir.path());
    let cfg = Config::default();
    let ctx = CancellationToken::new();

    RcloneStorage
        .upload(
            &ctx,
            &cfg,
            &UploadRequest {
                local_path: album.clone(),
                artist_folder: "Billy Strings".into(),
                is_video: false,
            },
            &UploadHooks::default(),
        )
        .await
        .unwrap();
    assert!(album.exists());
}
