//! End-to-end scenarios: discover a topology, report steps, read snapshots.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use stepwatch_agent::{
    ActivitySnapshot, Agent, Attribute, AttributeValue, ComponentKind, IntrospectionError,
    LiveComponent, Output, ProcessStep, StepComponent,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;

/// A platform component as the agent sees it at bootstrap.
struct Component {
    kind: ComponentKind,
    id: String,
    class_name: String,
    destination: Option<String>,
    children: Vec<Component>,
    producer: Option<Box<Component>>,
    consumer: Option<Box<Component>>,
    nested: Vec<Component>,
}

impl Component {
    fn new(kind: ComponentKind, id: &str, class_name: &str) -> Self {
        Self {
            kind,
            id: id.to_string(),
            class_name: class_name.to_string(),
            destination: None,
            children: Vec::new(),
            producer: None,
            consumer: None,
            nested: Vec::new(),
        }
    }

    fn children(mut self, children: Vec<Component>) -> Self {
        self.children = children;
        self
    }

    fn nested(mut self, nested: Vec<Component>) -> Self {
        self.nested = nested;
        self
    }

    fn endpoints(mut self, producer: Component, consumer: Component) -> Self {
        self.producer = Some(Box::new(producer));
        self.consumer = Some(Box::new(consumer));
        self
    }

    fn destination(mut self, destination: &str) -> Self {
        self.destination = Some(destination.to_string());
        self
    }
}

impl LiveComponent for Component {
    fn kind(&self) -> ComponentKind {
        self.kind
    }

    fn unique_id(&self) -> &str {
        &self.id
    }

    fn class_name(&self) -> &str {
        &self.class_name
    }

    fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    fn channels(&self) -> Vec<&dyn LiveComponent> {
        self.children.iter().map(|c| c as &dyn LiveComponent).collect()
    }

    fn workflows(&self) -> Vec<&dyn LiveComponent> {
        self.children.iter().map(|c| c as &dyn LiveComponent).collect()
    }

    fn services(&self) -> Vec<&dyn LiveComponent> {
        self.children.iter().map(|c| c as &dyn LiveComponent).collect()
    }

    fn producer(&self) -> Option<&dyn LiveComponent> {
        self.producer.as_deref().map(|p| p as &dyn LiveComponent)
    }

    fn consumer(&self) -> Option<&dyn LiveComponent> {
        self.consumer.as_deref().map(|c| c as &dyn LiveComponent)
    }

    fn attributes(&self) -> Result<Vec<Attribute<'_>>, IntrospectionError> {
        Ok(vec![
            Attribute::new("class-name", AttributeValue::Other),
            Attribute::new(
                "services",
                AttributeValue::ServiceList(
                    self.nested.iter().map(|s| s as &dyn LiveComponent).collect(),
                ),
            ),
        ])
    }

    fn is_composite(&self) -> bool {
        !self.nested.is_empty()
    }
}

fn order_adapter() -> Component {
    let workflow = Component::new(ComponentKind::Workflow, "orders-workflow", "StandardWorkflow")
        .endpoints(
            Component::new(ComponentKind::Producer, "orders-out", "JmsProducer")
                .destination("queue://orders.out"),
            Component::new(ComponentKind::Consumer, "orders-in", "JmsConsumer")
                .destination("queue://orders.in"),
        )
        .children(vec![
            Component::new(ComponentKind::Service, "log-payload", "LogMessageService"),
            Component::new(ComponentKind::ServiceList, "branch", "ServiceList").nested(vec![
                Component::new(ComponentKind::Service, "validate", "XmlValidator"),
                Component::new(ComponentKind::Service, "transform", "XslTransform"),
            ]),
        ]);

    Component::new(ComponentKind::Adapter, "orders-adapter", "Adapter").children(vec![
        Component::new(ComponentKind::Channel, "orders-channel", "Channel").children(vec![workflow]),
    ])
}

/// Step components mirroring the discovered topology.
struct Runtime {
    workflow: Arc<StepComponent>,
}

impl Runtime {
    fn new() -> Self {
        let adapter = Arc::new(StepComponent::new(ComponentKind::Adapter, "orders-adapter"));
        let channel = Arc::new(StepComponent::child_of(
            &adapter,
            ComponentKind::Channel,
            "orders-channel",
        ));
        let workflow = Arc::new(StepComponent::child_of(
            &channel,
            ComponentKind::Workflow,
            "orders-workflow",
        ));
        Self { workflow }
    }

    fn component(&self, kind: ComponentKind, unique_id: &str) -> Arc<StepComponent> {
        Arc::new(StepComponent::child_of(&self.workflow, kind, unique_id))
    }
}

#[test]
fn discovered_topology_accumulates_steps() {
    let root = order_adapter();
    let agent = Agent::builder().topology(&root).unwrap().build();
    let runtime = Runtime::new();
    let handle = agent.handle();

    let seeded = agent.collect();
    let workflow = seeded.workflow("orders-workflow").unwrap();
    assert_eq!(workflow.services.len(), 2);
    assert_eq!(workflow.services["branch"].services.len(), 2);
    assert_eq!(
        workflow.consumer.as_ref().unwrap().destination.as_deref(),
        Some("queue://orders.in")
    );

    for (message_id, ms) in [("m1", 10), ("m2", 20), ("m1", 30)] {
        handle.record(runtime.component(ComponentKind::Consumer, "orders-in"), message_id, 1);
        handle.ingest(
            ProcessStep::new(runtime.component(ComponentKind::Service, "log-payload"), message_id, ms)
                .with_step_name("LogMessageService"),
        );
    }

    let snapshot = agent.collect();
    let workflow = snapshot.workflow("orders-workflow").unwrap();
    let log = &workflow.services["log-payload"];
    assert_eq!(log.stats.message_count, 3);
    assert_eq!(log.stats.avg_ms_taken, 20);
    assert_eq!(workflow.message_ids.len(), 2);

    let consumer = workflow.consumer.as_ref().unwrap();
    assert_eq!(consumer.stats.message_count, 3);
    assert_eq!(consumer.class_name.as_deref(), Some("JmsConsumer"));
    assert!(workflow.producer.as_ref().unwrap().stats.is_empty());
}

#[test]
fn nested_services_report_flat_under_workflow() {
    let root = order_adapter();
    let agent = Agent::builder().topology(&root).unwrap().build();
    let runtime = Runtime::new();

    agent
        .handle()
        .record(runtime.component(ComponentKind::Service, "validate"), "m1", 6);

    let snapshot = agent.collect();
    let workflow = snapshot.workflow("orders-workflow").unwrap();
    assert_eq!(workflow.services["validate"].stats.message_count, 1);
    assert!(workflow.services["branch"].services["validate"].stats.is_empty());
}

#[test]
fn snapshots_stay_consistent_under_concurrent_ingest() {
    let agent = Arc::new(Agent::new());
    let runtime = Arc::new(Runtime::new());

    let workers: Vec<_> = (0..4)
        .map(|t| {
            let handle = agent.handle();
            let service = runtime.component(ComponentKind::Service, "shared");
            thread::spawn(move || {
                for i in 0..500 {
                    handle.record(service.clone(), &format!("m{}-{}", t, i), 1);
                }
            })
        })
        .collect();

    // Count and latency list are updated together, so every snapshot agrees with itself
    for _ in 0..50 {
        let snapshot = agent.collect();
        if let Some(service) = snapshot.service("shared") {
            assert_eq!(service.stats.message_count as usize, service.stats.ms_taken.len());
            assert_eq!(service.stats.message_ids.len(), service.stats.ms_taken.len());
        }
    }

    for worker in workers {
        worker.join().unwrap();
    }

    let snapshot = agent.collect();
    assert_eq!(snapshot.service("shared").unwrap().stats.message_count, 2000);
    assert_eq!(snapshot.total_messages(), 2000);
}

#[tokio::test]
async fn snapshots_reach_a_tcp_listener() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let agent = Agent::builder()
        .output(Output::tcp(addr.to_string()))
        .interval(Duration::from_millis(50))
        .build();
    let runtime = Runtime::new();
    agent
        .handle()
        .record(runtime.component(ComponentKind::Producer, "orders-out"), "m1", 2);

    let emission = agent.start();

    let (stream, _) = listener.accept().await.unwrap();
    let line = BufReader::new(stream)
        .lines()
        .next_line()
        .await
        .unwrap()
        .unwrap();
    emission.stop();

    let snapshot: ActivitySnapshot = serde_json::from_str(&line).unwrap();
    let producer = snapshot
        .workflow("orders-workflow")
        .and_then(|w| w.producer.as_ref())
        .unwrap();
    assert_eq!(producer.stats.message_count, 1);
}
