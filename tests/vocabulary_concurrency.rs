//! Concurrent writers against one vocabulary store.
//!
//! Run with: cargo test --test vocabulary_concurrency

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Barrier;
use vocab_stream::vocabulary::{VocabularyStore, RESERVED_MAX};

const WRITERS: usize = 32;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_inserts_of_one_word_share_an_id() {
    let store = Arc::new(VocabularyStore::in_memory());
    let barrier = Arc::new(Barrier::new(WRITERS));

    let mut handles = Vec::with_capacity(WRITERS);
    for i in 0..WRITERS {
        let store = Arc::clone(&store);
        let barrier = Arc::clone(&barrier);
        // Mixed casing must still land on one entry
        let word = if i % 2 == 0 { "Cat" } else { "cAT" };
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            store.get_or_create(word).await.unwrap()
        }));
    }

    let mut ids = HashSet::new();
    let mut created = 0;
    for handle in handles {
        let assignment = handle.await.unwrap();
        ids.insert(assignment.id);
        if assignment.created {
            created += 1;
        }
    }

    assert_eq!(ids.len(), 1, "all writers must observe the same id");
    assert_eq!(created, 1, "exactly one writer creates the entry");
    assert_eq!(store.size().await.unwrap(), 1);
    assert_eq!(store.lookup("cat").await.unwrap(), ids.into_iter().next());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distinct_words_get_distinct_ids() {
    let store = Arc::new(VocabularyStore::in_memory());
    let barrier = Arc::new(Barrier::new(WRITERS));

    let mut handles = Vec::with_capacity(WRITERS);
    for i in 0..WRITERS {
        let store = Arc::clone(&store);
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            store.insert_if_absent(&format!("word{i}")).await.unwrap()
        }));
    }

    let mut ids = HashSet::new();
    for handle in handles {
        ids.insert(handle.await.unwrap());
    }

    assert_eq!(ids.len(), WRITERS);
    assert!(ids.iter().all(|&id| id > RESERVED_MAX));
    assert_eq!(*ids.iter().max().unwrap(), RESERVED_MAX + WRITERS as u32);
    assert_eq!(store.size().await.unwrap(), WRITERS as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_batches_converge() {
    let store = Arc::new(VocabularyStore::in_memory());
    let words: Vec<String> = (0..50).map(|i| format!("w{i}")).collect();
    let barrier = Arc::new(Barrier::new(4));

    let mut handles = Vec::new();
    for job in 0..4 {
        let store = Arc::clone(&store);
        let barrier = Arc::clone(&barrier);
        let mut batch = words.clone();
        if job % 2 == 1 {
            batch.reverse();
        }
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            let mut created = 0;
            for word in &batch {
                if store.get_or_create(word).await.unwrap().created {
                    created += 1;
                }
            }
            created
        }));
    }

    let mut created_total = 0;
    for handle in handles {
        created_total += handle.await.unwrap();
    }

    assert_eq!(created_total, words.len());
    assert_eq!(store.size().await.unwrap(), words.len() as u64);

    let mut ids = HashSet::new();
    for word in &words {
        ids.insert(store.lookup(word).await.unwrap().unwrap());
    }
    assert_eq!(ids.len(), words.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_see_partial_entries() {
    let store = Arc::new(VocabularyStore::in_memory());

    let writer = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            for i in 0..200 {
                store.insert_if_absent(&format!("r{i}")).await.unwrap();
            }
        })
    };

    let reader = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            for _ in 0..200 {
                // Once visible, a word must resolve to a real id
                if let Some(id) = store.lookup("r0").await.unwrap() {
                    assert_eq!(id, RESERVED_MAX + 1);
                }
                tokio::task::yield_now().await;
            }
        })
    };

    writer.await.unwrap();
    reader.await.unwrap();
    assert_eq!(store.size().await.unwrap(), 200);
}
