//! Contract Test: Pass Scheduling
//!
//! This test verifies how the scheduler walks the configured hosts and
//! spaces its passes.
//!
//! Constraints verified:
//! - Hosts are reconciled sequentially in configured order
//! - A failing host never stops the pass for the hosts after it
//! - Fatal errors end the loop
//! - `last-host` sleeps for the last host's interval
//! - `per-host` only revisits a host once its own interval elapsed
//! - Cancellation ends the loop cleanly, including mid-sleep
//! - A skipped host is reported exactly once
//!
//! If this test fails, hosts can starve or the agent can ignore shutdown.

mod common;

use common::*;
use gddns_core::config::{DdnsConfig, HostConfig, SchedulePolicy};
use gddns_core::engine::Scheduler;
use gddns_core::error::Error;
use std::net::IpAddr;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const A: &str = "a.example.com.";
const B: &str = "b.example.com.";
const C: &str = "c.example.com.";

fn scheduler(
    provider: &MockDnsProvider,
    hosts: Vec<HostConfig>,
    policy: SchedulePolicy,
    shutdown: CancellationToken,
) -> Scheduler {
    let ip_source = MockIpSource::new(IpAddr::from([203, 0, 113, 7]));
    let reconciler = reconciler(&ip_source, provider, shutdown.clone());
    Scheduler::new(reconciler, hosts, policy, shutdown)
}

#[tokio::test(start_paused = true)]
async fn hosts_are_reconciled_in_configured_order() {
    let provider = MockDnsProvider::new();
    let mut scheduler = scheduler(
        &provider,
        vec![host(A), host(B), host(C)],
        SchedulePolicy::LastHost,
        CancellationToken::new(),
    );

    scheduler.run_pass().await.unwrap();

    assert_eq!(provider.listed_names(), vec![A, B, C]);
    let created: Vec<String> = provider
        .mutations()
        .into_iter()
        .map(|(_, record)| record.name)
        .collect();
    assert_eq!(created, vec![A, B, C]);
}

#[tokio::test(start_paused = true)]
async fn failing_host_does_not_stop_the_pass() {
    let provider = MockDnsProvider::new();
    provider.fail_list(B, Failure::Transient);
    let mut scheduler = scheduler(
        &provider,
        vec![host(A), host(B), host(C)],
        SchedulePolicy::LastHost,
        CancellationToken::new(),
    );

    let pause = scheduler.run_pass().await.unwrap();

    assert!(pause.is_some());
    assert_eq!(provider.listed_names(), vec![A, B, C]);
    assert_eq!(provider.records_for(A).len(), 1);
    assert!(provider.records_for(B).is_empty());
    assert_eq!(provider.records_for(C).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn fatal_error_ends_the_loop() {
    let provider = MockDnsProvider::new();
    provider.fail_list(A, Failure::Auth);
    let mut scheduler = scheduler(
        &provider,
        vec![host(A), host(B)],
        SchedulePolicy::PerHost,
        CancellationToken::new(),
    );

    let err = scheduler.run().await.unwrap_err();

    assert!(matches!(err, Error::Authentication(_)));
    assert_eq!(provider.listed_names(), vec![A], "No host after a fatal error");
}

#[tokio::test(start_paused = true)]
async fn last_host_policy_sleeps_last_interval() {
    let provider = MockDnsProvider::new();
    let mut scheduler = scheduler(
        &provider,
        vec![host(A).with_interval(600), host(B).with_interval(30)],
        SchedulePolicy::LastHost,
        CancellationToken::new(),
    );

    let pause = scheduler.run_pass().await.unwrap();
    assert_eq!(pause, Some(Duration::from_secs(30)));

    // Every host is due on every pass
    scheduler.run_pass().await.unwrap();
    assert_eq!(provider.listed_names(), vec![A, B, A, B]);
}

#[tokio::test(start_paused = true)]
async fn per_host_policy_honours_each_interval() {
    let provider = MockDnsProvider::new();
    let mut scheduler = scheduler(
        &provider,
        vec![host(A).with_interval(60), host(B).with_interval(300)],
        SchedulePolicy::PerHost,
        CancellationToken::new(),
    );

    let pause = scheduler.run_pass().await.unwrap().unwrap();
    assert_eq!(pause, Duration::from_secs(60));

    tokio::time::sleep(pause).await;
    scheduler.run_pass().await.unwrap();

    assert_eq!(
        provider.listed_names(),
        vec![A, B, A],
        "B must not be revisited before its own interval"
    );
}

#[tokio::test(start_paused = true)]
async fn cancelled_token_skips_the_pass() {
    let provider = MockDnsProvider::new();
    let shutdown = CancellationToken::new();
    shutdown.cancel();
    let mut scheduler = scheduler(
        &provider,
        vec![host(A), host(B)],
        SchedulePolicy::PerHost,
        shutdown,
    );

    let pause = scheduler.run_pass().await.unwrap();

    assert_eq!(pause, None);
    assert!(provider.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_sleep_stops_the_loop() {
    let provider = MockDnsProvider::new();
    let shutdown = CancellationToken::new();
    let mut scheduler = scheduler(
        &provider,
        vec![host(A).with_interval(60)],
        SchedulePolicy::PerHost,
        shutdown.clone(),
    );

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(90)).await;
        shutdown.cancel();
    });

    let started = Instant::now();
    scheduler.run().await.unwrap();

    assert_eq!(started.elapsed(), Duration::from_secs(90));
    assert_eq!(provider.listed_names(), vec![A, A], "Passes at 0s and 60s only");
    assert_eq!(provider.mutations().len(), 1, "Second pass found the record converged");
}

#[tokio::test]
async fn from_config_rejects_invalid_configuration() {
    let provider = MockDnsProvider::new();
    let ip_source = MockIpSource::new(IpAddr::from([203, 0, 113, 7]));
    let config = DdnsConfig::new(Vec::new());

    let result = Scheduler::from_config(
        Box::new(ip_source),
        Box::new(provider.clone()),
        &config,
        CancellationToken::new(),
    );

    assert!(matches!(result, Err(Error::Config(_))));
    assert!(provider.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn hostname_mismatch_is_logged_once() {
    let logs = LogCapture::default();
    let _guard = logs.install();

    let provider = MockDnsProvider::new()
        .with_record(A, a_record("other.example.com.", [198, 51, 100, 1]));
    let mut scheduler = scheduler(
        &provider,
        vec![host(A)],
        SchedulePolicy::LastHost,
        CancellationToken::new(),
    );

    scheduler.run_pass().await.unwrap();

    let errors = logs.error_lines();
    assert_eq!(errors.len(), 1, "Expected one error line, got {:?}", errors);
    assert!(errors[0].contains("other.example.com."));
    assert!(provider.mutations().is_empty());
}
