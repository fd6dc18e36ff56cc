use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pgconn::{Operand, Query, build_where, rewrite_placeholders};

/// SELECT col0, col1, ... FROM t WHERE col0 = ? AND col1 = ? ...
fn build_query(n: usize) -> Query {
    let mut query = Query::new().from("t");
    for i in 0..n {
        query = query
            .select(format!("col{i}"))
            .and_where(format!("col{i} = ?"), i as i64);
    }
    query
}

fn bench_to_sql(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_builder/to_sql");

    for n in [1, 5, 10, 50, 100] {
        let query = build_query(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &query, |b, query| {
            b.iter(|| black_box(query.to_sql()));
        });
    }

    group.finish();
}

fn bench_build_and_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_builder/build_and_render");

    for n in [1, 5, 10, 50, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let query = build_query(n);
                black_box((query.to_sql(), query.params().len()));
            });
        });
    }

    group.finish();
}

fn bench_where_in(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_builder/where_in");

    for n in [5, 20, 100, 500] {
        let values: Vec<i64> = (0..n).collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &values, |b, values| {
            b.iter(|| {
                let query = Query::new().from("t").where_in("id", values.clone());
                black_box(query.to_sql());
            });
        });
    }

    group.finish();
}

fn bench_rewrite_placeholders(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_builder/rewrite_placeholders");

    for n in [1, 10, 100] {
        let conds: Vec<String> = (0..n)
            .map(|i| format!("col{i} = ? AND note <> 'a?b'"))
            .collect();
        let sql = format!("SELECT * FROM t{}", build_where(conds, Operand::And));
        group.bench_with_input(BenchmarkId::from_parameter(n), &sql, |b, sql| {
            b.iter(|| black_box(rewrite_placeholders(sql)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_to_sql,
    bench_build_and_render,
    bench_where_in,
    bench_rewrite_placeholders
);
criterion_main!(benches);
