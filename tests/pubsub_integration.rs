#![allow(clippy::unwrap_used)]
//! Integration tests for Brook pub/sub
//!
//! Covers fan-out counts, unsubscribe behaviour and delivery through both
//! handler workers and async receivers.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use common::*;

fn counting_handler(
    counter: &Arc<AtomicUsize>,
) -> impl FnMut(brook::runtime::PubSubMessage) + Send + 'static {
    let counter = Arc::clone(counter);
    move |msg| {
        if msg.message == Bytes::from("message") {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[test]
fn test_multiple_subscribers_then_unsubscribe() {
    let brook = new_shared_brook();
    let channel = unique_key("pubsub_counts");

    let count1 = Arc::new(AtomicUsize::new(0));
    let count2 = Arc::new(AtomicUsize::new(0));
    let sub1 = brook.subscribe(&channel, counting_handler(&count1)).unwrap();
    let _sub2 = brook.subscribe(&channel, counting_handler(&count2)).unwrap();

    assert_eq!(brook.publish(&channel, "message"), 2);
    thread::sleep(SETTLE);
    assert_eq!(count1.load(Ordering::SeqCst), 1);
    assert_eq!(count2.load(Ordering::SeqCst), 1);

    assert!(brook.unsubscribe(&sub1));
    assert_eq!(brook.publish(&channel, "message"), 1);
    thread::sleep(SETTLE);
    assert_eq!(count1.load(Ordering::SeqCst), 1);
    assert_eq!(count2.load(Ordering::SeqCst), 2);
}

#[test]
fn test_unsubscribe_twice_does_not_change_counts() {
    let brook = new_shared_brook();
    let channel = unique_key("pubsub_idempotent");

    let (sub1, _rx1) = brook.subscribe_queue(&channel);
    let (_sub2, _rx2) = brook.subscribe_queue(&channel);

    assert!(brook.unsubscribe(&sub1));
    assert!(!brook.unsubscribe(&sub1));
    assert_eq!(brook.numsub(&channel), 1);
    assert_eq!(brook.publish(&channel, "message"), 1);
}

#[test]
fn test_publish_without_subscribers() {
    let brook = new_shared_brook();
    assert_eq!(brook.publish(unique_key("pubsub_empty"), "message"), 0);
}

#[test]
fn test_publishers_on_many_threads() {
    const PUBLISHERS: usize = 4;
    const PER_PUBLISHER: usize = 100;

    let brook = new_shared_brook();
    let channel = unique_key("pubsub_threads");
    let received = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&received);
    let _sub = brook
        .subscribe(&channel, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    let handles: Vec<_> = (0..PUBLISHERS)
        .map(|_| {
            let brook = Arc::clone(&brook);
            let channel = channel.clone();
            thread::spawn(move || {
                (0..PER_PUBLISHER)
                    .map(|_| brook.publish(&channel, "message"))
                    .sum::<usize>()
            })
        })
        .collect();
    let published: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    assert_eq!(published, PUBLISHERS * PER_PUBLISHER);
    assert!(settle(|| received.load(Ordering::SeqCst) == published));
}

#[tokio::test]
async fn test_async_receiver_sees_publish_order() {
    let brook = new_shared_brook();
    let channel = unique_key("pubsub_async");
    let (sub, mut rx) = brook.subscribe_queue(&channel);

    let publisher = {
        let brook = Arc::clone(&brook);
        let channel = channel.clone();
        tokio::spawn(async move {
            for i in 0..10 {
                brook.publish(&channel, i.to_string());
            }
        })
    };
    publisher.await.unwrap();

    for i in 0..10 {
        let msg = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.channel, Bytes::from(channel.clone()));
        assert_eq!(msg.message, Bytes::from(i.to_string()));
    }

    brook.unsubscribe(&sub);
    assert!(rx.recv().await.is_none());
}
