//! # Integration Tests
//!
//! End-to-end tests for the guarded stream over a live channel, covering
//! the ordering, termination, and redaction contracts under asynchronous
//! producers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use aegis_stream::{GuardedStream, StreamConfig, StreamMonitor, StreamViolation};

fn guarded_over_channel(
    config: &StreamConfig,
) -> (mpsc::Sender<String>, GuardedStream<ReceiverStream<String>>) {
    let (tx, rx) = mpsc::channel::<String>(16);
    let guarded = GuardedStream::new(ReceiverStream::new(rx), StreamMonitor::new(config));
    (tx, guarded)
}

#[tokio::test]
async fn test_live_producer_clean_stream() {
    let (tx, guarded) = guarded_over_channel(&StreamConfig::default());

    let producer = tokio::spawn(async move {
        for part in ["The ", "quick ", "brown ", "fox ", "jumps."] {
            tx.send(part.to_string()).await.unwrap();
        }
    });

    let out: Vec<String> = guarded.collect().await;
    producer.await.unwrap();
    assert_eq!(out.concat(), "The quick brown fox jumps.");
}

#[tokio::test]
async fn test_live_producer_canary_kill() {
    let config = StreamConfig {
        canaries: vec!["AEGIS_CANARY_abc123".to_string()],
        ..StreamConfig::default()
    };
    let fired = Arc::new(AtomicUsize::new(0));
    let fired_clone = Arc::clone(&fired);

    let (tx, guarded) = guarded_over_channel(&config);
    let guarded = guarded.on_violation(move |v: &StreamViolation| {
        assert_eq!(v.label, "CANARY");
        fired_clone.fetch_add(1, Ordering::SeqCst);
    });

    let producer = tokio::spawn(async move {
        // The consumer stops reading after the kill; sends may fail once
        // the receiver is dropped, which is the expected abort signal.
        for part in ["leaking: ", "AEGIS_CANARY", "_abc123", " trailing"] {
            if tx.send(part.to_string()).await.is_err() {
                break;
            }
        }
    });

    let out: Vec<String> = guarded.collect().await;
    producer.await.unwrap();

    assert!(!out.concat().contains("AEGIS_CANARY_abc123"));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_live_producer_redaction_round_trip() {
    let config = StreamConfig {
        pii_redaction: true,
        ..StreamConfig::default()
    };
    let violations = Arc::new(AtomicUsize::new(0));
    let violations_clone = Arc::clone(&violations);

    let (tx, guarded) = guarded_over_channel(&config);
    let guarded = guarded.on_violation(move |_| {
        violations_clone.fetch_add(1, Ordering::SeqCst);
    });

    let producer = tokio::spawn(async move {
        for part in ["Customer SSN: ", "123-45-6789", ", card 4111 1111 1111 1111."] {
            tx.send(part.to_string()).await.unwrap();
        }
    });

    let out: Vec<String> = guarded.collect().await;
    producer.await.unwrap();

    let text = out.concat();
    assert!(text.contains("[REDACTED-SSN]"));
    assert!(text.contains("[REDACTED-CC]"));
    assert!(!text.contains("123-45-6789"));
    assert!(!text.contains("4111 1111 1111 1111"));
    assert_eq!(violations.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_long_stream_prefix_property() {
    let (tx, mut guarded) = guarded_over_channel(&StreamConfig::default());

    let producer = tokio::spawn(async move {
        for i in 0..200 {
            tx.send(format!("token{i} ")).await.unwrap();
        }
    });

    let mut expected = String::new();
    for i in 0..200 {
        expected.push_str(&format!("token{i} "));
    }

    let mut emitted = String::new();
    while let Some(part) = guarded.next().await {
        emitted.push_str(&part);
        assert!(
            expected.starts_with(&emitted),
            "emission must stay a prefix of the input"
        );
    }
    producer.await.unwrap();
    assert_eq!(emitted, expected);
}
