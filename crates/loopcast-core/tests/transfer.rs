//! Integration test: direct-link transfers against a local range-capable server.

mod common;

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use loopcast_core::executor::{ActiveTransfers, DownloadExecutor, DownloadTask, TransferError};
use loopcast_core::retry::RetryPolicy;
use loopcast_core::storage::temp_path;
use tempfile::tempdir;

fn body(seed: u8, len: usize) -> Vec<u8> {
    (seed..=255).cycle().take(len).collect()
}

fn quick_retries(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(1),
        multiplier: 1.0,
        max_delay: Duration::from_millis(5),
    }
}

async fn fetch_one(executor: &DownloadExecutor, url: String, dest: &Path) -> Result<u64, TransferError> {
    let mut outcomes = executor
        .run(
            vec![DownloadTask {
                id: "one".into(),
                url,
                destination: dest.to_path_buf(),
            }],
            &mut ActiveTransfers::default(),
        )
        .await;
    outcomes.remove(0).result
}

#[tokio::test]
async fn pool_downloads_every_task_and_reports_failures_separately() {
    let mut files = HashMap::new();
    for i in 0..5u8 {
        files.insert(format!("ep{}.mkv", i), body(i, 48 * 1024));
    }
    let server = common::range_server::start(files.clone());
    let dir = tempdir().unwrap();

    let mut tasks: Vec<DownloadTask> = (0..5u8)
        .map(|i| DownloadTask {
            id: format!("t{}", i),
            url: server.url(&format!("ep{}.mkv", i)),
            destination: dir.path().join("Season 01").join(format!("ep{}.mkv", i)),
        })
        .collect();
    tasks.push(DownloadTask {
        id: "missing".into(),
        url: server.url("missing.mkv"),
        destination: dir.path().join("Season 01").join("missing.mkv"),
    });

    let executor = DownloadExecutor::new(2, RetryPolicy::no_retry());
    let mut active = ActiveTransfers::default();
    let outcomes = executor.run(tasks, &mut active).await;

    assert_eq!(outcomes.len(), 6);
    assert!(active.is_empty());
    for outcome in &outcomes {
        if outcome.id == "missing" {
            assert!(matches!(outcome.result, Err(TransferError::Http(404))));
            assert!(!outcome.destination.exists());
            assert!(!temp_path(&outcome.destination).exists());
            continue;
        }
        let name = outcome.destination.file_name().unwrap().to_str().unwrap();
        let want = &files[name];
        assert_eq!(*outcome.result.as_ref().unwrap(), want.len() as u64);
        assert_eq!(&std::fs::read(&outcome.destination).unwrap(), want);
        assert!(!temp_path(&outcome.destination).exists());
    }
}

#[tokio::test]
async fn partial_file_is_resumed_with_a_range_request() {
    let full = body(7, 100 * 1024);
    let mut files = HashMap::new();
    files.insert("pilot.mkv".to_string(), full.clone());
    let server = common::range_server::start(files);
    let dir = tempdir().unwrap();
    let dest = dir.path().join("pilot.mkv");
    std::fs::write(temp_path(&dest), &full[..30 * 1024]).unwrap();

    let executor = DownloadExecutor::new(1, RetryPolicy::no_retry());
    let mut active = ActiveTransfers::default();
    let outcomes = executor
        .run(
            vec![DownloadTask {
                id: "pilot".into(),
                url: server.url("pilot.mkv"),
                destination: dest.clone(),
            }],
            &mut active,
        )
        .await;

    assert_eq!(*outcomes[0].result.as_ref().unwrap(), full.len() as u64);
    assert_eq!(std::fs::read(&dest).unwrap(), full);
    assert_eq!(server.gets(), 1);
}

#[tokio::test]
async fn complete_part_file_is_finalized_without_refetching_body() {
    let full = body(3, 8 * 1024);
    let mut files = HashMap::new();
    files.insert("done.mkv".to_string(), full.clone());
    let server = common::range_server::start(files);
    let dir = tempdir().unwrap();
    let dest = dir.path().join("done.mkv");
    std::fs::write(temp_path(&dest), &full).unwrap();

    let executor = DownloadExecutor::new(1, RetryPolicy::no_retry());
    let outcomes = executor
        .run(
            vec![DownloadTask {
                id: "done".into(),
                url: server.url("done.mkv"),
                destination: dest.clone(),
            }],
            &mut ActiveTransfers::default(),
        )
        .await;

    assert!(outcomes[0].result.is_ok());
    assert_eq!(std::fs::read(&dest).unwrap(), full);
}

#[tokio::test]
async fn busy_response_is_retried_and_resume_keeps_only_file_bytes() {
    let full = body(11, 4096);
    let files = HashMap::from([
        ("busy.mkv".to_string(), full.clone()),
        ("fresh.mkv".to_string(), full.clone()),
    ]);
    let faults = HashMap::from([
        ("busy.mkv".to_string(), vec![503]),
        ("fresh.mkv".to_string(), vec![503, 502]),
    ]);
    let server = common::range_server::start_with_faults(files, faults);
    let dir = tempdir().unwrap();
    let executor = DownloadExecutor::new(1, quick_retries(3));

    // partial file on disk: the error page must not be appended to it
    let dest = dir.path().join("busy.mkv");
    std::fs::write(temp_path(&dest), &full[..1000]).unwrap();
    let got = fetch_one(&executor, server.url("busy.mkv"), &dest).await;
    assert_eq!(got.unwrap(), full.len() as u64);
    assert_eq!(std::fs::read(&dest).unwrap(), full);
    assert_eq!(server.gets(), 2);

    // nothing on disk: two error pages, then the whole file
    let dest = dir.path().join("fresh.mkv");
    let got = fetch_one(&executor, server.url("fresh.mkv"), &dest).await;
    assert_eq!(got.unwrap(), full.len() as u64);
    assert_eq!(std::fs::read(&dest).unwrap(), full);
    assert_eq!(server.gets(), 5);
}

#[tokio::test]
async fn error_page_on_fresh_download_leaves_no_part_file() {
    let files = HashMap::from([("gone.mkv".to_string(), body(1, 2048))]);
    let faults = HashMap::from([("gone.mkv".to_string(), vec![410])]);
    let server = common::range_server::start_with_faults(files, faults);
    let dir = tempdir().unwrap();
    let dest = dir.path().join("gone.mkv");

    let executor = DownloadExecutor::new(1, quick_retries(3));
    let got = fetch_one(&executor, server.url("gone.mkv"), &dest).await;

    assert!(matches!(got, Err(TransferError::Http(410))));
    assert!(!temp_path(&dest).exists());
    assert!(!dest.exists());
    assert_eq!(server.gets(), 1, "410 is not retried");
}

#[tokio::test]
async fn oversized_part_file_is_discarded_and_fetched_again() {
    let full = body(5, 3000);
    let files = HashMap::from([("long.mkv".to_string(), full.clone())]);
    let server = common::range_server::start(files);
    let dir = tempdir().unwrap();
    let dest = dir.path().join("long.mkv");
    let mut stale = full.clone();
    stale.extend_from_slice(b"trailing garbage");
    std::fs::write(temp_path(&dest), &stale).unwrap();

    // a single attempt reports the mismatch and clears the part file
    let got = fetch_one(&DownloadExecutor::new(1, RetryPolicy::no_retry()), server.url("long.mkv"), &dest).await;
    assert!(matches!(
        got,
        Err(TransferError::LengthMismatch {
            local: 3016,
            remote: Some(3000)
        })
    ));
    assert!(!temp_path(&dest).exists());
    assert!(!dest.exists());

    std::fs::write(temp_path(&dest), &stale).unwrap();
    let got = fetch_one(&DownloadExecutor::new(1, quick_retries(2)), server.url("long.mkv"), &dest).await;
    assert_eq!(got.unwrap(), full.len() as u64);
    assert_eq!(std::fs::read(&dest).unwrap(), full);
}
