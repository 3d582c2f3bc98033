//! Unit tests for bootstrap, gateway assembly and launch sequencing.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use rstest::rstest;
use serde_json::{Value, json};

use crate::methods::builtin_source;
use crate::{
    ArgsConfigLoader, BootstrapError, ConfigLoader, LaunchError, bootstrap_with, run_daemon_with,
};

use super::support::{
    FailingConfigLoader, FailingShutdown, HealthEvent, ImmediateShutdown, RecordingHealthReporter,
    ResetThenShutdown, TestConfigLoader,
};

#[rstest]
fn bootstrap_reports_start_and_success() {
    let loader = TestConfigLoader::tcp();
    let reporter = Arc::new(RecordingHealthReporter::default());

    let daemon = bootstrap_with(&loader, reporter.clone()).expect("bootstrap should succeed");

    assert_eq!(daemon.config().listen_socket(), loader.endpoint());
    assert_eq!(
        reporter.events(),
        vec![HealthEvent::BootstrapStarting, HealthEvent::BootstrapSucceeded]
    );
}

#[rstest]
fn bootstrap_prepares_nested_unix_socket_directory() {
    let loader = TestConfigLoader::nested_unix();
    let reporter = Arc::new(RecordingHealthReporter::default());

    bootstrap_with(&loader, reporter).expect("bootstrap should succeed");

    let path = loader.endpoint().unix_path().expect("unix endpoint");
    let parent = path.parent().expect("socket parent");
    assert!(parent.is_dir());
}

#[rstest]
fn args_loader_applies_command_line_overrides() {
    let config = ArgsConfigLoader::new(["busgated", "--queue-capacity", "7"])
        .load()
        .expect("arguments parse");
    assert_eq!(config.queue_capacity(), Some(7));
}

#[rstest]
fn bootstrap_reports_configuration_failures() {
    let reporter = Arc::new(RecordingHealthReporter::default());

    let error = bootstrap_with(&FailingConfigLoader, reporter.clone()).err();

    assert!(matches!(error, Some(BootstrapError::Configuration { .. })));
    let events = reporter.events();
    assert_eq!(events.first(), Some(&HealthEvent::BootstrapStarting));
    assert!(matches!(events.last(), Some(HealthEvent::BootstrapFailed(_))));
}

#[rstest]
fn gateway_serves_requests_until_stopped() {
    let loader = TestConfigLoader::tcp();
    let reporter = Arc::new(RecordingHealthReporter::default());
    let daemon = bootstrap_with(&loader, reporter.clone()).expect("bootstrap");
    let gateway = daemon.start_gateway(builtin_source()).expect("gateway starts");
    let addr = gateway.local_addr().expect("tcp address");

    let mut client = TcpStream::connect(addr).expect("connect");
    client
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("read timeout");
    client
        .write_all(
            b"{\"jsonrpc\":\"2.0\",\"id\":\"1\",\"method\":\"BuildIn.sum\",\"params\":[1,2,3]}\n",
        )
        .expect("write request");
    let mut line = String::new();
    BufReader::new(&client)
        .read_line(&mut line)
        .expect("read reply");
    let reply: Value = serde_json::from_str(&line).expect("reply is JSON");
    assert_eq!(reply, json!({"jsonrpc": "2.0", "id": "1", "result": 6}));

    gateway.stop().expect("gateway stops");
    assert!(reporter.events().contains(&HealthEvent::GatewayReady {
        endpoint: "tcp://127.0.0.1:0".to_owned(),
        concurrency: 2,
    }));
    assert_eq!(reporter.events().last(), Some(&HealthEvent::GatewayStopped));
}

#[rstest]
fn daemon_runs_until_shutdown_signal() {
    let reporter = Arc::new(RecordingHealthReporter::default());

    run_daemon_with(
        &TestConfigLoader::tcp(),
        reporter.clone(),
        builtin_source(),
        &ImmediateShutdown,
    )
    .expect("daemon run completes");

    assert_eq!(reporter.events().last(), Some(&HealthEvent::GatewayStopped));
}

#[rstest]
fn gateway_keeps_serving_across_a_worker_reset() {
    let reporter = Arc::new(RecordingHealthReporter::default());
    let daemon = bootstrap_with(&TestConfigLoader::tcp(), reporter.clone()).expect("bootstrap");
    let gateway = daemon.start_gateway(builtin_source()).expect("gateway starts");
    let addr = gateway.local_addr().expect("tcp address");

    let mut client = TcpStream::connect(addr).expect("connect");
    client
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("read timeout");
    let mut reader = BufReader::new(client.try_clone().expect("clone stream"));
    let mut call = |id: u32| -> Value {
        let request = format!("{}\n", json!({"id": id, "method": "add", "params": [id, 1]}));
        client.write_all(request.as_bytes()).expect("write request");
        let mut line = String::new();
        reader.read_line(&mut line).expect("read reply");
        serde_json::from_str(&line).expect("reply is JSON")
    };

    assert_eq!(call(1)["result"], json!(2));
    gateway.reset_workers().expect("workers reset");
    assert_eq!(call(2)["result"], json!(3));

    gateway.stop().expect("gateway stops");
    assert!(reporter.events().contains(&HealthEvent::WorkersReset));
}

#[rstest]
fn daemon_resets_workers_on_request_and_keeps_running() {
    let reporter = Arc::new(RecordingHealthReporter::default());

    run_daemon_with(
        &TestConfigLoader::tcp(),
        reporter.clone(),
        builtin_source(),
        &ResetThenShutdown::default(),
    )
    .expect("daemon run completes");

    let events = reporter.events();
    assert_eq!(
        &events[events.len() - 2..],
        [HealthEvent::WorkersReset, HealthEvent::GatewayStopped]
    );
}

#[rstest]
fn daemon_stops_gateway_when_signals_are_unavailable() {
    let reporter = Arc::new(RecordingHealthReporter::default());

    let result = run_daemon_with(
        &TestConfigLoader::tcp(),
        reporter.clone(),
        builtin_source(),
        &FailingShutdown,
    );

    assert!(matches!(result, Err(LaunchError::Shutdown { .. })));
    assert_eq!(reporter.events().last(), Some(&HealthEvent::GatewayStopped));
}

#[rstest]
fn daemon_reports_bootstrap_failures() {
    let reporter = Arc::new(RecordingHealthReporter::default());

    let result = run_daemon_with(
        &FailingConfigLoader,
        reporter.clone(),
        builtin_source(),
        &ImmediateShutdown,
    );

    assert!(matches!(result, Err(LaunchError::Bootstrap { .. })));
    assert!(!reporter.events().contains(&HealthEvent::GatewayStopped));
}
