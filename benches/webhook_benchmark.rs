use criterion::{black_box, criterion_group, criterion_main, Criterion};
use workctl::domain::webhook::signature::{sign, verify_signature};
use workctl::domain::webhook::WebhookEvent;

const SECRET: &[u8] = b"my-secret";

/// 接近真实大小的 push 负载
fn push_payload(commits: usize) -> String {
    let commits: Vec<String> = (0..commits)
        .map(|i| {
            format!(
                r#"{{"id":"{:040x}","message":"commit {}","author":{{"name":"octocat"}}}}"#,
                i, i
            )
        })
        .collect();
    format!(
        r#"{{"ref":"refs/heads/main","repository":{{"full_name":"octo/hello"}},"sender":{{"login":"octocat"}},"commits":[{}]}}"#,
        commits.join(",")
    )
}

fn signature_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("Webhook Signature");

    for commits in [1, 100] {
        let body = push_payload(commits);
        let header = sign(SECRET, body.as_bytes()).unwrap();

        group.bench_function(format!("verify {} bytes", body.len()), |b| {
            b.iter(|| verify_signature(black_box(body.as_bytes()), SECRET, Some(black_box(header.as_str()))))
        });
    }

    group.finish();
}

fn decode_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("Webhook Decode");

    let small = push_payload(1);
    let large = push_payload(100);
    let pull_request = r#"{"action":"opened","number":42,"sender":{"login":"octocat"}}"#;

    group.bench_function("push with 1 commit", |b| {
        b.iter(|| WebhookEvent::decode("push", "d", Some("application/json"), black_box(small.as_bytes())))
    });
    group.bench_function("push with 100 commits", |b| {
        b.iter(|| WebhookEvent::decode("push", "d", Some("application/json"), black_box(large.as_bytes())))
    });
    group.bench_function("pull_request", |b| {
        b.iter(|| WebhookEvent::decode("pull_request", "d", None, black_box(pull_request.as_bytes())))
    });

    group.finish();
}

criterion_group!(benches, signature_benchmark, decode_benchmark);
criterion_main!(benches);
