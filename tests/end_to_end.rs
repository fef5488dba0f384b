//! Agent to relay to publisher, over a real TCP socket.

use std::sync::Arc;

use serde_json::Value;
use stepwatch::{relay, SnapshotListener};
use stepwatch_agent::{Agent, ComponentKind, Output, StepComponent};
use stepwatch_forwarder::{ChannelPublisher, Forwarder};
use tokio::sync::mpsc;

#[tokio::test]
async fn agent_snapshot_reaches_the_publisher() {
    let listener = SnapshotListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::channel(8);
    let accept = tokio::spawn(listener.run(tx));

    let (publisher, mut published) = ChannelPublisher::create();
    let relay_task = tokio::spawn(async move {
        let mut forwarder = Forwarder::new(publisher);
        relay(rx, &mut forwarder).await
    });

    let agent = Agent::builder().output(Output::tcp(addr.to_string())).build();
    let adapter = Arc::new(StepComponent::new(ComponentKind::Adapter, "A"));
    let channel = Arc::new(StepComponent::child_of(&adapter, ComponentKind::Channel, "C"));
    let workflow = Arc::new(StepComponent::child_of(&channel, ComponentKind::Workflow, "W"));
    let service = Arc::new(
        StepComponent::child_of(&workflow, ComponentKind::Service, "S").with_class_name("Log"),
    );
    for (message_id, ms) in [("m1", 10), ("m2", 20), ("m1", 30)] {
        agent.handle().record(service.clone(), message_id, ms);
    }

    agent.emit_now().await;

    let payload = published.recv().await.unwrap();
    let json: Value = serde_json::from_str(&payload).unwrap();
    let workflow = &json["adapterMetrics"]["adapters"]["A"]["channels"]["C"]["workflows"]["W"];
    assert_eq!(workflow["messageIds"], serde_json::json!(["m1", "m2"]));
    assert_eq!(workflow["services"]["S"]["msgCount"], 3);
    assert_eq!(workflow["services"]["S"]["averageTimeTaken"], 20);
    assert_eq!(workflow["services"]["S"]["className"], "Log");

    accept.abort();
    drop(published);
    relay_task.abort();
}
