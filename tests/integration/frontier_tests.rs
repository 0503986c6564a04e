//! Frontier guarantees under concurrent connections to one database file

use frontier_crawl::now_ts;
use frontier_crawl::storage::{ClaimFilter, SqliteStorage, Storage};
use std::sync::{Arc, Barrier};
use std::thread;

const CLAIMANTS: usize = 8;

#[test]
fn test_at_most_one_claimant() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("frontier.db");
    let now = now_ts();

    let mut storage = SqliteStorage::new(&db).unwrap();
    storage
        .enqueue("A", "https://ex.com/only", 1, Some(now), now)
        .unwrap();

    let barrier = Arc::new(Barrier::new(CLAIMANTS));
    let handles: Vec<_> = (0..CLAIMANTS)
        .map(|i| {
            let db = db.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let mut storage = SqliteStorage::new(&db).unwrap();
                barrier.wait();
                let filter = if i % 2 == 0 {
                    ClaimFilter::Any
                } else {
                    ClaimFilter::Bucket {
                        source: "A",
                        priority: 1,
                    }
                };
                storage.claim(filter, now).unwrap()
            })
        })
        .collect();

    let winners: Vec<_> = handles
        .into_iter()
        .filter_map(|h| h.join().unwrap())
        .collect();

    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].url_norm, "https://ex.com/only");
}

#[test]
fn test_concurrent_enqueue_converges_to_one_row() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("frontier.db");
    drop(SqliteStorage::new(&db).unwrap());

    let barrier = Arc::new(Barrier::new(CLAIMANTS));
    let handles: Vec<_> = (0..CLAIMANTS)
        .map(|i| {
            let db = db.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let mut storage = SqliteStorage::new(&db).unwrap();
                barrier.wait();
                let url = format!("https://EX.com/a#copy{}", i);
                storage
                    .enqueue(&format!("source{}", i), &url, i as i64, None, now_ts())
                    .unwrap()
            })
        })
        .collect();

    let inserted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|inserted| *inserted)
        .count();
    assert_eq!(inserted, 1);

    let storage = SqliteStorage::new(&db).unwrap();
    assert_eq!(storage.count_jobs(None, None).unwrap(), 1);
    assert!(storage.get_job("https://ex.com/a").unwrap().is_some());
}

#[test]
fn test_every_job_claimed_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("frontier.db");
    let now = now_ts();

    let mut storage = SqliteStorage::new(&db).unwrap();
    for n in 0..50 {
        storage
            .enqueue("A", &format!("https://ex.com/{}", n), 1 + n % 3, Some(now), now)
            .unwrap();
    }

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let db = db.clone();
            thread::spawn(move || {
                let mut storage = SqliteStorage::new(&db).unwrap();
                let mut claimed = Vec::new();
                while let Some(job) = storage.claim(ClaimFilter::Any, now).unwrap() {
                    claimed.push(job.url_norm);
                }
                claimed
            })
        })
        .collect();

    let mut all: Vec<String> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    assert_eq!(all.len(), 50);
    all.sort();
    all.dedup();
    assert_eq!(all.len(), 50);
}
