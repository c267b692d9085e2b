use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use healthcheck::{
    EndpointConfig, EndpointDescriptor, HealthState, HttpProber, ProbeResult, Prober, evaluate,
};
use std::hint::black_box;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

fn refused_endpoint(id: usize) -> EndpointDescriptor {
    EndpointConfig::new("http://127.0.0.1:1/health", Duration::from_secs(1))
        .with_id(format!("bench-{id}"))
        .with_timeout(Duration::from_millis(100))
        .build()
        .unwrap()
}

fn http_probe_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("http_probe");

    // Benchmark HTTP probe against a closed port (measures failure path)
    let prober = HttpProber::new().unwrap();
    let descriptor = refused_endpoint(0);

    group.bench_function("http_connection_refused", |b| {
        let rt = tokio::runtime::Runtime::new().unwrap();
        b.iter(|| rt.block_on(async { black_box(prober.probe(&descriptor).await) }));
    });

    group.finish();
}

fn descriptor_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("descriptor");

    let config = EndpointConfig::new("https://example.com/api/health", Duration::from_secs(15))
        .with_method("POST")
        .with_header("user-agent", "bench")
        .with_body(r#"{"probe": true}"#)
        .with_expected_status([200, 201, 204]);

    group.bench_function("validate", |b| b.iter(|| black_box(config.build())));

    group.finish();
}

fn evaluator_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluator");

    let descriptor = refused_endpoint(0);
    let up = ProbeResult::response("bench-0", SystemTime::now(), 200, Duration::from_millis(12));
    let down = ProbeResult::response("bench-0", SystemTime::now(), 503, Duration::from_millis(12));
    let prior = evaluate(&descriptor, &up, &HealthState::default()).state;

    group.bench_function("steady_state", |b| {
        b.iter(|| black_box(evaluate(&descriptor, &up, &prior)))
    });
    group.bench_function("transition", |b| {
        b.iter(|| black_box(evaluate(&descriptor, &down, &prior)))
    });

    group.finish();
}

fn concurrent_probes_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_probes");
    group.sample_size(10); // Concurrent tests are expensive

    let prober = Arc::new(HttpProber::new().unwrap());

    for count in [1, 10, 100].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let rt = tokio::runtime::Runtime::new().unwrap();
            b.iter(|| {
                let prober = prober.clone();
                rt.block_on(async move {
                    let mut handles = vec![];

                    for id in 0..count {
                        let prober = prober.clone();
                        let descriptor = refused_endpoint(id);
                        handles.push(tokio::spawn(async move { prober.probe(&descriptor).await }));
                    }

                    for handle in handles {
                        black_box(handle.await.unwrap());
                    }
                })
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    http_probe_benchmark,
    descriptor_benchmark,
    evaluator_benchmark,
    concurrent_probes_benchmark,
);

criterion_main!(benches);
