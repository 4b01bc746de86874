use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use passbook_core::Money;
use passbook_infra::Ledger;
use passbook_infra::event_store::InMemoryEventStore;
use passbook_statement::StatementRenderer;

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_statement");
    let renderer = StatementRenderer::default();

    for transactions in [10usize, 36, 500] {
        let ledger = Ledger::new(InMemoryEventStore::new());
        let id = ledger.open_account("bench").expect("open account");
        for i in 0..transactions {
            ledger
                .deposit(id, Money::from_minor(100 + i as i64))
                .expect("seed deposit");
        }

        group.throughput(Throughput::Elements(transactions as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(transactions),
            &transactions,
            |b, _| b.iter(|| renderer.render(&ledger, black_box(id), "bench")),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_render);
criterion_main!(benches);
