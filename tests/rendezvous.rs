use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use gradrelay::rendezvous::{Leg, ProtocolError, RendezvousCell};

/********************
 * Post/take pairing
 ********************/

#[test]
fn post_then_take_returns_the_posted_value() {
    let cell = RendezvousCell::new(Leg::Forward);
    cell.post("payload".to_string()).expect("post");
    assert_eq!(cell.take(), "payload");
    assert!(!cell.is_occupied());
}

#[test]
fn double_post_without_take_is_a_protocol_error() {
    let cell = RendezvousCell::new(Leg::Backward);
    cell.post(1).expect("first post");
    let err = cell.post(2).expect_err("second post must fail");
    assert!(matches!(err, ProtocolError::Occupied { leg: Leg::Backward }));

    // The original value is still deliverable.
    assert_eq!(cell.take(), 1);
}

#[test]
fn take_clears_the_slot_for_the_next_round_trip() {
    let cell = RendezvousCell::new(Leg::Forward);
    cell.post(10).expect("post");
    assert_eq!(cell.take(), 10);
    cell.post(20).expect("slot cleared, post again");
    assert_eq!(cell.take(), 20);
}

/********************
 * Blocking behavior
 ********************/

// The primitive itself has no timeout; the harness bounds the wait instead.
#[test]
fn take_blocks_until_a_value_is_posted() {
    let cell = Arc::new(RendezvousCell::new(Leg::Forward));
    let (tx, rx) = mpsc::channel();

    let taker = thread::spawn({
        let cell = Arc::clone(&cell);
        move || {
            let value: u64 = cell.take();
            tx.send(value).expect("report taken value");
        }
    });

    // Nothing posted yet: the taker must still be blocked.
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

    cell.post(7).expect("post");
    assert_eq!(
        rx.recv_timeout(Duration::from_secs(5)).expect("taker woke"),
        7
    );
    taker.join().expect("taker thread");
}

#[test]
fn second_taker_blocks_for_the_next_post_never_a_stale_value() {
    let cell = Arc::new(RendezvousCell::new(Leg::Backward));
    let (tx, rx) = mpsc::channel();

    let takers: Vec<_> = (0..2)
        .map(|_| {
            let cell = Arc::clone(&cell);
            let tx = tx.clone();
            thread::spawn(move || {
                let value: u64 = cell.take();
                tx.send(value).expect("report taken value");
            })
        })
        .collect();

    cell.post(1).expect("first post");
    let first = rx.recv_timeout(Duration::from_secs(5)).expect("first take");

    // Exactly one taker was woken; the other is still blocked.
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

    cell.post(2).expect("second post");
    let second = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("second take");

    let mut delivered = vec![first, second];
    delivered.sort_unstable();
    assert_eq!(delivered, vec![1, 2]);

    for taker in takers {
        taker.join().expect("taker thread");
    }
}
