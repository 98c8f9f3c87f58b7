//! Per-archive faults roll back that archive's uncommitted work and leave the
//! rest of the run intact.

mod helpers;

use helpers::{TestHarness, count};

fn events(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| {
            format!(
                "2025-03-06 {:02}:{:02}:{:02},{:03} [T-{}] INFO c.x.Events - event {i} checksum {:x}",
                (i / 3600) % 24,
                (i / 60) % 60,
                i % 60,
                i % 1000,
                i % 7,
                i.wrapping_mul(2_654_435_761)
            )
        })
        .collect()
}

#[tokio::test]
async fn e2e_truncated_archive_rolled_back() {
    let h = TestHarness::new();
    h.write_gz("a.log.gz", &["2025-03-06 00:00:00,000 [T-1] INFO c.x.Y - before"]);
    h.write_truncated_gz("b.log.gz", &events(4000));
    h.write_gz("c.log.gz", &["2025-03-06 00:00:00,000 [T-1] INFO c.x.Y - after"]);
    let (summary, pool) = h.ingest().await;

    assert_eq!(summary.archives.len(), 2);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].archive, "b.log.gz");

    assert_eq!(
        count(&pool, "SELECT COUNT(*) FROM logs WHERE source_file = 'b.log.gz'").await,
        0
    );
    let messages: Vec<String> = sqlx::query_scalar("SELECT message FROM logs ORDER BY id")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(messages, vec!["before", "after"]);
}

#[tokio::test]
async fn e2e_checkpoints_survive_later_failure() {
    let h = TestHarness::new().checkpoint_interval(100);
    h.write_truncated_gz("big.log.gz", &events(4000));
    let (summary, pool) = h.ingest().await;

    assert_eq!(summary.failed.len(), 1);
    let kept = count(&pool, "SELECT COUNT(*) FROM logs").await;
    assert!(kept > 0, "committed checkpoints were lost");
    assert!(kept < 4000);
    // The record open at each checkpoint is committed by the next one.
    assert_eq!(kept % 100, 99);
}

#[tokio::test]
async fn e2e_pattern_excludes_other_files() {
    let mut h = TestHarness::new();
    h.config.input_pattern = "*.log.gz".to_string();
    h.write_gz("app.log", &["2025-03-06 00:00:00,000 [T-1] INFO c.x.Y - skipped"]);
    let (summary, pool) = h.ingest().await;

    assert!(summary.archives.is_empty());
    assert!(summary.failed.is_empty());
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM logs").await, 0);
}
