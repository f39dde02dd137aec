use std::fs::File;
use std::path::PathBuf;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use csv_to_sql::config::ConvertOptions;
use csv_to_sql::convert::{self, Table};
use csv_to_sql::naming::derive_column_identifiers;
use tempfile::TempDir;

fn generate_orders(rows: usize) -> Table {
    let headers = ["id", "ordered_at", "amount", "discount", "status"]
        .iter()
        .map(|h| h.to_string())
        .collect();
    let rows = (0..rows)
        .map(|i| {
            let status = match i % 3 {
                0 => "shipped",
                1 => "pending",
                _ => "processing",
            };
            let day = (i % 28) + 1;
            let discount = if i % 17 == 0 {
                "#DIV/0!".to_string()
            } else {
                format!("{}%", i % 40)
            };
            vec![
                i.to_string(),
                format!("2024-01-{day:02}"),
                format!("{},{:03}.{:02}", i / 1000 + 1, i % 1000, i % 100),
                discount,
                status.to_string(),
            ]
        })
        .collect();
    Table { headers, rows }
}

fn write_orders(table: &Table) -> (TempDir, PathBuf) {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let csv_path = temp_dir.path().join("orders.csv");
    let mut writer = csv::Writer::from_writer(File::create(&csv_path).expect("create csv"));
    writer.write_record(&table.headers).expect("header");
    for row in &table.rows {
        writer.write_record(row).expect("row");
    }
    writer.flush().expect("flush");
    (temp_dir, csv_path)
}

fn bench_two_pass(c: &mut Criterion) {
    let table = generate_orders(50_000);
    let identifiers = derive_column_identifiers(&table.headers);
    let types = convert::classify_columns(&table);
    let (temp_dir, csv_path) = write_orders(&table);
    let options = ConvertOptions::default();

    let mut group = c.benchmark_group("two_pass");

    group.bench_function("classify_columns", |b| {
        b.iter(|| convert::classify_columns(&table));
    });

    group.bench_function("emit_load_block", |b| {
        b.iter(|| {
            convert::emit_load_block(&table, "orders", &identifiers, &types)
                .expect("load block")
        });
    });

    group.bench_function("convert_file", |b| {
        b.iter_batched(
            || (),
            |_| {
                convert::convert_file(&csv_path, &options).expect("convert file");
            },
            BatchSize::SmallInput,
        );
    });

    drop(temp_dir);
    group.finish();
}

criterion_group!(benches, bench_two_pass);
criterion_main!(benches);
