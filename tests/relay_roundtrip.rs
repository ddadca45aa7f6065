use std::sync::mpsc;
use std::thread;

use gradrelay::bundle::{TensorValue, ValueBundle};
use gradrelay::handoff::{BackwardResult, FailureReport, ForwardResult};
use gradrelay::registry::RegistryError;
use gradrelay::relay::{Relay, RelayConfig, RelayError};
use gradrelay::types::TaskId;

fn tensor(values: &[f32]) -> TensorValue {
    TensorValue::f32(vec![values.len()], values.to_vec()).expect("valid tensor")
}

/********************
 * Round-trip scenarios
 ********************/

// Executor posts [A, B] for "t1"; driver takes it, computes, answers [C];
// the executor's suspend call returns Resume([C]).
#[test]
fn forward_bundle_resumes_with_driver_values() {
    let relay = Relay::new(RelayConfig::default());
    let executor = relay.executor_handle();
    let driver = relay.driver_handle();
    let task = TaskId::from("t1");

    let a = tensor(&[1.0, 2.0]);
    let b = tensor(&[3.0]);
    let c = tensor(&[4.0, 5.0, 6.0]);

    let driver_thread = thread::spawn({
        let driver = driver.clone();
        let task = task.clone();
        let (expected_a, expected_b, c) = (a.clone(), b.clone(), c.clone());
        move || {
            let forward = driver.take_forward(&task).expect("take forward");
            let outputs = forward.values().expect("completed forward pass");
            assert_eq!(outputs.len(), 2);
            assert_eq!(outputs[0], expected_a);
            assert_eq!(outputs[1], expected_b);

            driver
                .post_backward(&task, BackwardResult::Resume(ValueBundle::from(vec![c])))
                .expect("post backward");
        }
    });

    let forward = ForwardResult::Completed(ValueBundle::from(vec![a, b]));
    match executor.suspend(&task, forward).expect("suspend") {
        BackwardResult::Resume(values) => {
            assert_eq!(values.len(), 1);
            assert_eq!(values[0], c);
        }
        BackwardResult::Terminate => panic!("driver did not terminate"),
    }

    driver_thread.join().expect("driver thread");
    // The round trip is drained on both sides; the slot may be removed.
    driver.finish(&task).expect("finish");
    assert!(relay.registry().is_empty());
}

// Driver answers Terminate for "t2"; suspend returns it without any
// protocol error and the run is aborted by the caller.
#[test]
fn terminate_is_returned_not_raised() {
    let relay = Relay::default();
    let executor = relay.executor_handle();
    let driver = relay.driver_handle();
    let task = TaskId::from("t2");

    let driver_thread = thread::spawn({
        let task = task.clone();
        move || {
            driver.take_forward(&task).expect("take forward");
            driver
                .post_backward(&task, BackwardResult::Terminate)
                .expect("post terminate");
        }
    });

    let forward = ForwardResult::Completed(ValueBundle::from(vec![tensor(&[1.0])]));
    let answer = executor.suspend(&task, forward).expect("suspend");
    assert!(answer.is_terminate());
    driver_thread.join().expect("driver thread");
}

#[test]
fn upstream_failure_short_circuits_to_termination() {
    let relay = Relay::default();
    let executor = relay.executor_handle();
    let driver = relay.driver_handle();
    let task = TaskId::from("failed-forward");

    let driver_thread = thread::spawn({
        let task = task.clone();
        move || {
            let forward = driver.take_forward(&task).expect("take forward");
            match forward {
                ForwardResult::Failed(report) => {
                    assert_eq!(report.message, "loss became NaN");
                    driver
                        .post_backward(&task, BackwardResult::Terminate)
                        .expect("post terminate");
                }
                ForwardResult::Completed(_) => panic!("expected a failed forward pass"),
            }
        }
    });

    let forward = ForwardResult::Failed(FailureReport::msg("loss became NaN"));
    let answer = executor.suspend(&task, forward).expect("suspend");
    assert!(answer.is_terminate());
    driver_thread.join().expect("driver thread");
}

/********************
 * Sequencing & lifecycle
 ********************/

#[test]
fn same_task_id_supports_sequential_round_trips() {
    let relay = Relay::default();
    let executor = relay.executor_handle();
    let driver = relay.driver_handle();
    let task = TaskId::from("micro-steps");
    let steps = 5u32;

    let driver_thread = thread::spawn({
        let driver = driver.clone();
        let task = task.clone();
        move || {
            for _ in 0..steps {
                let forward = driver.take_forward(&task).expect("take forward");
                let outputs = forward.values().expect("completed");
                let echoed: ValueBundle = outputs.iter().cloned().collect();
                driver
                    .post_backward(&task, BackwardResult::Resume(echoed))
                    .expect("post backward");
            }
        }
    });

    for step in 0..steps {
        let payload = tensor(&[step as f32]);
        let forward = ForwardResult::Completed(ValueBundle::from(vec![payload.clone()]));
        match executor.suspend(&task, forward).expect("suspend") {
            BackwardResult::Resume(values) => assert_eq!(values[0], payload),
            BackwardResult::Terminate => panic!("unexpected termination"),
        }
    }

    driver_thread.join().expect("driver thread");
    driver.finish(&task).expect("finish");
    assert!(relay.registry().is_empty());
}

#[test]
fn driver_may_poll_ahead_of_the_executor() {
    let relay = Relay::default();
    let executor = relay.executor_handle();
    let driver = relay.driver_handle();
    let task = TaskId::from("poll-ahead");

    // Driver starts first and blocks waiting for forward outputs.
    let driver_thread = thread::spawn({
        let task = task.clone();
        move || {
            let forward = driver.take_forward(&task).expect("take forward");
            assert!(forward.is_completed());
            driver
                .post_backward(&task, BackwardResult::Resume(ValueBundle::new()))
                .expect("post backward");
        }
    });

    let forward = ForwardResult::Completed(ValueBundle::new());
    let answer = executor.suspend(&task, forward).expect("suspend");
    assert!(!answer.is_terminate());
    driver_thread.join().expect("driver thread");
}

// Cleanup may run on the driver thread: once the executor's suspend has
// returned, the slot is drained and finish succeeds without a busy error.
#[test]
fn driver_may_finish_the_lane_once_the_executor_has_resumed() {
    let relay = Relay::default();
    let executor = relay.executor_handle();
    let driver = relay.driver_handle();
    let task = TaskId::from("driver-finish");
    let (resumed_tx, resumed_rx) = mpsc::channel();

    let driver_thread = thread::spawn({
        let task = task.clone();
        move || {
            driver.take_forward(&task).expect("take forward");
            driver
                .post_backward(&task, BackwardResult::Resume(ValueBundle::new()))
                .expect("post backward");
            resumed_rx.recv().expect("executor resumed");
            driver.finish(&task).expect("finish from the driver thread");
        }
    });

    let answer = executor
        .suspend(&task, ForwardResult::Completed(ValueBundle::new()))
        .expect("suspend");
    assert!(!answer.is_terminate());
    resumed_tx.send(()).expect("signal resume");
    driver_thread.join().expect("driver thread");
    assert!(relay.registry().is_empty());
}

#[test]
fn expected_tasks_override_wins_over_the_environment() {
    let config = RelayConfig::default().with_expected_tasks(3);
    assert_eq!(config.expected_tasks, 3);
}

#[test]
fn posting_backward_for_an_unknown_task_is_rejected() {
    let relay = Relay::default();
    let driver = relay.driver_handle();

    let err = driver
        .post_backward(&TaskId::from("nobody"), BackwardResult::Terminate)
        .expect_err("no round trip initialized");
    assert!(matches!(
        err,
        RelayError::Registry(RegistryError::NotFound { .. })
    ));
}

#[test]
fn shutdown_drains_the_registry() {
    let relay = Relay::new(RelayConfig::default().with_expected_tasks(4));
    let executor = relay.executor_handle();
    let driver = relay.driver_handle();

    for name in ["a", "b"] {
        let task = TaskId::from(name);
        let driver_thread = thread::spawn({
            let driver = driver.clone();
            let task = task.clone();
            move || {
                driver.take_forward(&task).expect("take forward");
                driver
                    .post_backward(&task, BackwardResult::Resume(ValueBundle::new()))
                    .expect("post backward");
            }
        });
        executor
            .suspend(&task, ForwardResult::Completed(ValueBundle::new()))
            .expect("suspend");
        driver_thread.join().expect("driver thread");
    }

    assert_eq!(relay.registry().len(), 2);
    relay.shutdown();
    assert!(relay.registry().is_empty());
}
