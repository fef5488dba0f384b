use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use stepwatch_agent::{Agent, ComponentKind, ProcessStep, StepComponent};

/// Build an agent with `workflows` workflows of `services` services, each with some history
fn populated_agent(workflows: usize, services: usize) -> Agent {
    let agent = Agent::new();
    let adapter = Arc::new(StepComponent::new(ComponentKind::Adapter, "adapter"));
    let channel = Arc::new(StepComponent::child_of(
        &adapter,
        ComponentKind::Channel,
        "channel",
    ));

    for w in 0..workflows {
        let workflow = Arc::new(StepComponent::child_of(
            &channel,
            ComponentKind::Workflow,
            format!("workflow-{}", w),
        ));
        for s in 0..services {
            let service = Arc::new(StepComponent::child_of(
                &workflow,
                ComponentKind::Service,
                format!("workflow-{}.service-{}", w, s),
            ));
            for m in 0..10 {
                agent.ingest(&ProcessStep::new(service.clone(), format!("m{}", m), 5));
            }
        }
    }

    agent
}

/// Benchmark collect() with varying workflow counts
fn bench_collect_varying_workflows(c: &mut Criterion) {
    let mut group = c.benchmark_group("collect_varying_workflows");

    for workflow_count in [1, 10, 50].iter() {
        let agent = populated_agent(*workflow_count, 5);

        group.bench_with_input(
            BenchmarkId::from_parameter(workflow_count),
            workflow_count,
            |b, _| {
                b.iter(|| {
                    black_box(agent.collect());
                });
            },
        );
    }
    group.finish();
}

/// Benchmark collect() followed by JSON serialization, as emitted over TCP
fn bench_collect_and_serialize(c: &mut Criterion) {
    let agent = populated_agent(10, 20);

    c.bench_function("collect_and_serialize", |b| {
        b.iter(|| {
            let snapshot = agent.collect();
            black_box(serde_json::to_string(&snapshot).unwrap_or_default());
        });
    });
}

criterion_group!(
    benches,
    bench_collect_varying_workflows,
    bench_collect_and_serialize,
);
criterion_main!(benches);
