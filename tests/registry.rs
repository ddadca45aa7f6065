use std::sync::Arc;
use std::thread;

use gradrelay::bundle::{TensorValue, ValueBundle};
use gradrelay::handoff::{BackwardResult, ForwardResult};
use gradrelay::registry::{RegistryError, TaskRegistry};
use gradrelay::types::TaskId;

fn bundle(values: &[f32]) -> ValueBundle {
    values.iter().map(|&v| TensorValue::scalar_f32(v)).collect()
}

/********************
 * Lookup & lifecycle
 ********************/

#[test]
fn get_or_create_is_lazy_and_stable() {
    let registry = TaskRegistry::new();
    let task = TaskId::from("t1");

    assert!(registry.get(&task).is_none());
    assert!(registry.is_empty());

    let first = registry.get_or_create(&task);
    let second = registry.get_or_create(&task);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(registry.len(), 1);

    let looked_up = registry.get(&task).expect("created above");
    assert!(Arc::ptr_eq(&first, &looked_up));
}

#[test]
fn remove_is_idempotent_for_absent_ids() {
    let registry = TaskRegistry::new();
    registry
        .remove(&TaskId::from("never-created"))
        .expect("removing an absent id is a no-op");
}

#[test]
fn remove_refuses_while_a_round_trip_is_in_flight() {
    let registry = TaskRegistry::new();
    let task = TaskId::from("busy");
    let slot = registry.get_or_create(&task);

    slot.post_forward(ForwardResult::Completed(bundle(&[1.0])))
        .expect("post forward");
    let err = registry.remove(&task).expect_err("slot is mid-flight");
    assert!(matches!(err, RegistryError::SlotBusy { .. }));

    // Drain the round trip, then removal succeeds.
    slot.take_forward().expect("take forward");
    slot.post_backward(BackwardResult::Resume(bundle(&[2.0])))
        .expect("post backward");
    slot.take_backward().expect("take backward");
    registry.remove(&task).expect("drained slot removable");
    assert!(registry.get(&task).is_none());
}

#[test]
fn drain_clears_all_slots() {
    let registry = TaskRegistry::new();
    for i in 0..4u64 {
        registry.get_or_create(&TaskId::from(i));
    }
    assert_eq!(registry.len(), 4);
    registry.drain();
    assert!(registry.is_empty());
}

/********************
 * Concurrency
 ********************/

// Two distinct task identifiers each complete a full round trip
// concurrently; neither blocks the other's registry access.
#[test]
fn distinct_tasks_round_trip_concurrently() {
    let registry = Arc::new(TaskRegistry::new());

    thread::scope(|scope| {
        for name in ["t1", "t2"] {
            let registry = Arc::clone(&registry);
            scope.spawn(move || {
                let task = TaskId::from(name);
                let slot = registry.get_or_create(&task);

                let driver = thread::spawn({
                    let slot = Arc::clone(&slot);
                    move || {
                        let forward = slot.take_forward().expect("take forward");
                        assert!(forward.is_completed());
                        slot.post_backward(BackwardResult::Resume(bundle(&[1.0])))
                            .expect("post backward");
                    }
                });

                slot.post_forward(ForwardResult::Completed(bundle(&[0.0])))
                    .expect("post forward");
                let backward = slot.take_backward().expect("take backward");
                assert!(!backward.is_terminate());
                driver.join().expect("driver thread");

                registry.remove(&task).expect("drained slot removable");
            });
        }
    });

    assert!(registry.is_empty());
}

#[test]
fn concurrent_get_or_create_on_one_id_yields_one_slot() {
    let registry = Arc::new(TaskRegistry::new());
    let task = TaskId::from("shared");

    let slots: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let task = task.clone();
                scope.spawn(move || registry.get_or_create(&task))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("spawned thread"))
            .collect()
    });

    assert_eq!(registry.len(), 1);
    for slot in &slots[1..] {
        assert!(Arc::ptr_eq(&slots[0], slot));
    }
}
