use criterion::{Criterion, black_box, criterion_group, criterion_main};

use std::collections::HashMap;

use serde_json::{Map, Value, json};

use graphsel::catalog::TypeResolver;
use graphsel::tree::LogicalTree;
use graphsel::{Entity, FieldKind, RemoteStore, ResultSet};

// offline store: field types only, never called for fixed fields
struct NullStore;

impl RemoteStore for NullStore {
    fn graphql(&self, _query: &str, _variables: &Map<String, Value>) -> graphsel::Result<Value> {
        Ok(json!({"data": {}}))
    }

    fn custom_field_types(&self) -> graphsel::Result<HashMap<String, FieldKind>> {
        Ok(HashMap::new())
    }
}

fn wide_or(terms: usize) -> String {
    (0..terms)
        .map(|i| format!("name=host-{i}"))
        .collect::<Vec<_>>()
        .join(" or ")
}

fn mixed_expression(groups: usize) -> String {
    (0..groups)
        .map(|i| format!("(location=site_{i} or location=annex_{i}) and role=edge"))
        .collect::<Vec<_>>()
        .join(" or ")
}

fn entities(count: usize, offset: usize) -> ResultSet {
    ResultSet::from_entities(
        (0..count)
            .map(|i| {
                let mut entity = Entity::new();
                entity.insert("id".into(), json!(format!("e{}", i + offset)));
                entity.insert("name".into(), json!(format!("host-{}", i + offset)));
                entity
            })
            .collect(),
    )
}

fn parse_and_condense(c: &mut Criterion) {
    let store = NullStore;
    for terms in [10usize, 100, 1000] {
        let input = wide_or(terms);
        c.bench_function(&format!("condense_wide_or_{terms}"), |b| {
            b.iter(|| {
                let expr = graphsel::expression::parse_expression(black_box(&input)).unwrap();
                let mut tree = LogicalTree::from_expression(&expr);
                let mut resolver = TypeResolver::new(&store);
                tree.condense(&mut resolver).unwrap();
                black_box(tree.len())
            })
        });
    }
    let input = mixed_expression(50);
    c.bench_function("condense_mixed_50_groups", |b| {
        b.iter(|| {
            let expr = graphsel::expression::parse_expression(black_box(&input)).unwrap();
            let mut tree = LogicalTree::from_expression(&expr);
            let mut resolver = TypeResolver::new(&store);
            tree.condense(&mut resolver).unwrap();
            black_box(tree.len())
        })
    });
}

fn combine_result_sets(c: &mut Criterion) {
    for size in [100usize, 10_000] {
        let overlapping = vec![entities(size, 0), entities(size, size / 2)];
        c.bench_function(&format!("intersect_{size}"), |b| {
            b.iter(|| black_box(ResultSet::intersect(black_box(overlapping.clone()))))
        });
        let overlapping = vec![entities(size, 0), entities(size, size / 2)];
        c.bench_function(&format!("union_{size}"), |b| {
            b.iter(|| black_box(ResultSet::union(black_box(overlapping.clone()))))
        });
    }
}

criterion_group!(benches, parse_and_condense, combine_result_sets);
criterion_main!(benches);
