// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Instant;

fn options() -> Options {
    Options::parse([
        "api.url=https://unreachable.invalid",
        "api.mailbox=m",
        "delayShutdownInternal=200",
        "inventory.environment.allow=*",
        "inventory.environment.deny=",
        "inventory.system.properties.allow=*",
        "inventory.system.properties.deny=",
    ])
    .unwrap()
}

fn controller() -> LifecycleController {
    LifecycleController::new(&options(), Arc::new(PerformanceMetrics::new())).unwrap()
}

#[tokio::test]
async fn new_controller_is_created() {
    let controller = controller();
    assert_eq!(controller.state(), AgentState::Created);
    assert!(!controller.shutdown_signal().armed());
}

#[tokio::test]
async fn shutdown_before_start_discards() {
    let controller = controller();
    let deadline = Deadline::after(&SystemClock, Duration::from_millis(100));
    assert!(controller.shutdown_with(deadline).await);
    assert_eq!(controller.state(), AgentState::Discarded);
}

#[tokio::test]
async fn failed_authentication_discards() {
    let controller = controller();
    let result = controller.start().await;
    assert!(result.is_err());
    assert_eq!(controller.state(), AgentState::Discarded);
}

#[tokio::test]
async fn start_requires_created_state() {
    let controller = controller();
    controller.shutdown_with(Deadline::after(&SystemClock, Duration::ZERO)).await;
    assert!(matches!(
        controller.start().await,
        Err(LifecycleError::InvalidState(_))
    ));
}

#[tokio::test]
async fn second_shutdown_is_a_no_op() {
    let controller = controller();
    let deadline = Deadline::after(&SystemClock, Duration::from_millis(50));
    controller.shutdown_with(deadline).await;
    let started = Instant::now();
    controller.shutdown_with(deadline).await;
    assert!(started.elapsed() < Duration::from_millis(50));
}

#[tokio::test]
async fn shutdown_signal_arms_with_the_deadline() {
    let signal = ShutdownSignal::new();
    assert!(!signal.current().expired());

    let deadline = Deadline::after(&SystemClock, Duration::ZERO);
    signal.arm(deadline);
    assert!(signal.armed());
    assert!(signal.current().expired());
}

#[tokio::test]
async fn missing_keystore_surfaces_as_config_failure() {
    let mut options = options();
    options.keystore = Some("/nonexistent/trust.pem".into());
    assert!(LifecycleController::new(&options, Arc::new(PerformanceMetrics::new())).is_err());
}
