//! Behavioural tests for flow invocation and acknowledgment correlation.

use std::cell::RefCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use busgate_config::Config;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::{Value, json};
use tokio::runtime::{Builder, Runtime};

use crate::flow::{
    ConnectionStatus, FlowAck, FlowBus, FlowError, FlowInvoker, FlowRequest, PeerAddress,
    PeerDirectory,
};

/// Bus handing out sequential invoke ids starting at `1`.
#[derive(Default)]
struct SequentialBus {
    issued: AtomicU64,
}

impl FlowBus for SequentialBus {
    fn invoke_flow(
        &self,
        _target: &PeerAddress,
        _project: &str,
        _flow: &str,
        _params: &Value,
    ) -> Result<u64, FlowError> {
        Ok(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

struct FlowWorld {
    runtime: Runtime,
    peers: Arc<PeerDirectory>,
    ack_timeout: f64,
    invoker: Option<Arc<FlowInvoker<SequentialBus>>>,
    outcome: Option<Result<String, FlowError>>,
}

impl FlowWorld {
    fn new() -> Self {
        let runtime = Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .expect("paused runtime");
        Self {
            runtime,
            peers: Arc::new(PeerDirectory::new()),
            ack_timeout: 15.0,
            invoker: None,
            outcome: None,
        }
    }

    fn invoker(&mut self) -> Arc<FlowInvoker<SequentialBus>> {
        let config = Config {
            flow_ack_timeout: self.ack_timeout,
            ..Config::default()
        };
        let peers = Arc::clone(&self.peers);
        Arc::clone(self.invoker.get_or_insert_with(|| {
            Arc::new(FlowInvoker::from_config(SequentialBus::default(), peers, &config))
        }))
    }

    fn invoke(&mut self, reply: Option<(i64, String, Duration)>) {
        let invoker = self.invoker();
        let outcome = self.runtime.block_on(async move {
            if let Some((code, message, delay)) = reply {
                let acker = Arc::clone(&invoker);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    acker.acknowledge(ack(1, code, &message));
                });
            }
            invoker.invoke(request()).await
        });
        self.outcome = Some(outcome);
    }
}

fn request() -> FlowRequest {
    FlowRequest {
        server: None,
        process: None,
        project: "plant".to_owned(),
        flow: "restart".to_owned(),
        params: json!({"line": 3}),
    }
}

fn ack(invoke_id: u64, code: i64, message: &str) -> FlowAck {
    FlowAck {
        source: PeerAddress::new("unit-1", "client-7"),
        project: "plant".to_owned(),
        invoke_id,
        ack: code,
        message: message.to_owned(),
    }
}

#[fixture]
fn world() -> RefCell<FlowWorld> {
    RefCell::new(FlowWorld::new())
}

#[given("a connected flow peer")]
fn given_connected_peer(world: &RefCell<FlowWorld>) {
    world.borrow().peers.apply(
        PeerAddress::new("unit-1", "client-7"),
        ConnectionStatus::Confirmed,
    );
}

#[given("an acknowledgment timeout of {seconds} seconds")]
fn given_ack_timeout(world: &RefCell<FlowWorld>, seconds: f64) {
    world.borrow_mut().ack_timeout = seconds;
}

#[when("the flow is acknowledged with code {code} and message {message} after {delay} seconds")]
fn when_flow_acknowledged(world: &RefCell<FlowWorld>, code: i64, message: String, delay: u64) {
    world
        .borrow_mut()
        .invoke(Some((code, message, Duration::from_secs(delay))));
}

#[when("the flow is never acknowledged")]
fn when_flow_silent(world: &RefCell<FlowWorld>) {
    world.borrow_mut().invoke(None);
}

#[then("the invocation succeeds with message {message}")]
fn then_invocation_succeeds(world: &RefCell<FlowWorld>, message: String) {
    assert_eq!(world.borrow().outcome, Some(Ok(message)));
}

#[then("the invocation is rejected with code {code}")]
fn then_invocation_rejected(world: &RefCell<FlowWorld>, code: i64) {
    let world = world.borrow();
    assert!(
        matches!(world.outcome, Some(Err(FlowError::Rejected { ack, .. })) if ack == code),
        "unexpected outcome {:?}",
        world.outcome
    );
}

#[then("the invocation times out")]
fn then_invocation_times_out(world: &RefCell<FlowWorld>) {
    let world = world.borrow();
    assert!(
        matches!(world.outcome, Some(Err(FlowError::Timeout { .. }))),
        "unexpected outcome {:?}",
        world.outcome
    );
}

#[then("no invocation is pending")]
fn then_nothing_pending(world: &RefCell<FlowWorld>) {
    let invoker = world.borrow_mut().invoker();
    assert!(invoker.registry().is_empty());
}

#[then("a late acknowledgment is ignored")]
fn then_late_ack_ignored(world: &RefCell<FlowWorld>) {
    let invoker = world.borrow_mut().invoker();
    assert!(!invoker.acknowledge(ack(1, 1, "too late")));
}

#[scenario(path = "tests/features/flow_correlation.feature")]
fn flow_correlation(#[from(world)] world: RefCell<FlowWorld>) {
    drop(world);
}
