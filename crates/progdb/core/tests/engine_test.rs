// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use parking_lot::Mutex;
use progdb_core::{
    AccumulatorKind, AndPredicate, Dataset, Engine, EngineConfig, EngineResult, GroupBy, Priority, QueryDefinition, QueryId, QueryTemplate, SamplerSpec, SchedulerKind,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

const CITIES: [&str; 3] = ["seoul", "busan", "incheon"];

fn homes(rows: usize) -> Arc<Dataset> {
    let records: Vec<serde_json::Value> = (0..rows)
        .map(|i| {
            let price = if i % 11 == 0 { serde_json::Value::Null } else { json!((i * 37 % 100) as f64 + 0.5) };
            json!({"city": CITIES[i % 3], "price": price, "rooms": i % 5})
        })
        .collect();
    Arc::new(Dataset::from_json("homes", &serde_json::Value::Array(records), None, 10).unwrap())
}

fn engine(dataset: Arc<Dataset>, sampler: SamplerSpec) -> Engine {
    let config = EngineConfig {
        sampler,
        ..Default::default()
    };
    Engine::new(dataset, config).unwrap()
}

fn mean_price_by_city(dataset: &Dataset) -> EngineResult<QueryDefinition> {
    Ok(QueryDefinition::new(
        AccumulatorKind::Mean,
        Some(dataset.field("price")?),
        GroupBy::new(vec![dataset.field("city")?]),
        AndPredicate::default(),
    ))
}

#[test]
fn test_round_robin_interleaves_new_query() -> EngineResult<()> {
    let dataset = homes(40);
    let mut engine = engine(dataset.clone(), SamplerSpec::UniformNumBlocks { num_blocks: 4 });

    let a = engine.create_query(mean_price_by_city(&dataset)?)?;
    let a = engine.request(a, Priority::Highest);
    assert_eq!(engine.run_one().map(|r| r.job.index), Some(0));
    assert_eq!(engine.run_one().map(|r| r.job.index), Some(1));

    let b = engine.create_query(QueryDefinition::count(vec![dataset.field("city")?]))?;
    let b = engine.request(b, Priority::Lowest);
    engine.reschedule(Some(SchedulerKind::RoundRobin.build()));

    let order: Vec<(QueryId, usize)> = (0..4).filter_map(|_| engine.run_one()).map(|r| (r.job.query_id, r.job.index)).collect();
    assert_eq!(order, vec![(a, 2), (b, 0), (a, 3), (b, 1)]);

    assert!(engine.query(a).is_some_and(|q| q.is_done()));
    assert_eq!(engine.run_all(), 2);
    assert_eq!(engine.completed().len(), 2);
    Ok(())
}

#[test]
fn test_full_scan_matches_naive_aggregate() -> EngineResult<()> {
    let dataset = homes(257);
    let mut engine = engine(dataset.clone(), SamplerSpec::UniformRandom { sample_size: 20, seed: Some(42) });
    let id = engine.submit(mean_price_by_city(&dataset)?)?;
    let sum_id = engine.submit(QueryDefinition::new(AccumulatorKind::Sum, Some(dataset.field("price")?), GroupBy::default(), AndPredicate::default()))?;
    engine.run_all();

    let city = dataset.field("city")?;
    let price = dataset.field("price")?;
    let mut naive: HashMap<String, (f64, u64)> = HashMap::new();
    for row in dataset.rows() {
        if let Some(v) = price.value(row).as_f64() {
            let entry = naive.entry(city.value(row).to_string()).or_default();
            entry.0 += v;
            entry.1 += 1;
        }
    }

    let query = engine.query(id).expect("query is registered");
    assert!(query.is_done());
    let intervals = query.intervals();
    assert_eq!(intervals.len(), 3);
    for (key, interval) in intervals {
        let (sum, count) = naive[&key.values()[0].value_string()];
        assert!((interval.center - sum / count as f64).abs() < 1e-9);
        assert_eq!(interval.standard_error, 0.0);
    }

    let total: f64 = naive.values().map(|(sum, _)| sum).sum();
    let sum_query = engine.query(sum_id).expect("query is registered");
    let (_, interval) = &sum_query.intervals()[0];
    assert!((interval.center - total).abs() < 1e-6);
    assert_eq!(interval.standard_error, 0.0);
    Ok(())
}

#[test]
fn test_intermediate_estimates_are_finite() -> EngineResult<()> {
    let dataset = homes(500);
    let mut engine = engine(dataset.clone(), SamplerSpec::UniformRandom { sample_size: 25, seed: Some(1) });
    let id = engine.submit(mean_price_by_city(&dataset)?)?;
    let count_id = engine.submit(QueryDefinition::count(vec![dataset.field("rooms")?]))?;

    for _ in 0..3 {
        engine.run_one();
    }

    for query_id in [id, count_id] {
        let query = engine.query(query_id).expect("query is registered");
        for (_, interval) in query.intervals() {
            let ci = interval.ci95();
            assert!(ci.low.is_finite() && ci.high.is_finite());
            assert!(interval.standard_error >= 0.0);
        }
    }
    Ok(())
}

#[test]
fn test_paused_query_waits() -> EngineResult<()> {
    let dataset = homes(30);
    let mut engine = engine(dataset.clone(), SamplerSpec::UniformNumBlocks { num_blocks: 3 });
    let a = engine.submit(mean_price_by_city(&dataset)?)?;
    let b = engine.submit(QueryDefinition::count(vec![dataset.field("city")?]))?;

    engine.pause(a)?;
    assert_eq!(engine.run_all(), 3);
    assert!(engine.query(b).is_some_and(|q| q.is_done()));
    assert_eq!(engine.query(a).map(|q| q.progress().processed_blocks), Some(0));
    assert_eq!(engine.queue().len(), 3);

    engine.resume(a)?;
    assert_eq!(engine.run_all(), 3);
    assert!(engine.ongoing().is_empty());
    Ok(())
}

#[test]
fn test_on_job_done_reports_progress() -> EngineResult<()> {
    let dataset = homes(50);
    let mut engine = engine(dataset.clone(), SamplerSpec::UniformNumBlocks { num_blocks: 5 });

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    engine.set_on_job_done(move |query| sink.lock().push(query.progress().processed_blocks));

    engine.submit(mean_price_by_city(&dataset)?)?;
    engine.run_all();
    assert_eq!(*seen.lock(), vec![1, 2, 3, 4, 5]);
    Ok(())
}

#[test]
fn test_removed_query_is_not_folded() -> EngineResult<()> {
    let dataset = homes(40);
    let mut engine = engine(dataset.clone(), SamplerSpec::UniformNumBlocks { num_blocks: 2 });
    let a = engine.submit(mean_price_by_city(&dataset)?)?;
    let b = engine.submit(QueryDefinition::count(vec![dataset.field("city")?]))?;

    let popped = engine.pop_job().expect("job is pending");
    assert_eq!(popped.query_id, a);
    let removed = engine.remove(a)?;
    assert_eq!(removed.progress().processed_blocks, 0);
    assert!(engine.execute(popped).is_none());

    assert_eq!(engine.run_all(), 2);
    assert!(engine.query(b).is_some_and(|q| q.is_done()));
    assert!(engine.query(a).is_none());
    Ok(())
}

#[test]
fn test_empty_dataset_completes_on_request() -> EngineResult<()> {
    let dataset = Arc::new(Dataset::from_json("empty", &json!([]), None, 10)?);
    let mut engine = engine(dataset, SamplerSpec::default());

    let template = QueryTemplate::Empty.combine(&homes(30).field("city")?);
    let definition = template.definition().expect("frequency query");
    let id = engine.submit(definition)?;

    assert!(engine.queue().is_empty());
    assert!(engine.ongoing().is_empty());
    let query = engine.query(id).expect("query is registered");
    assert!(query.is_done());
    assert!(query.intervals().is_empty());
    assert!(engine.run_one().is_none());
    Ok(())
}

#[test]
fn test_drill_down_selects_bucket_rows() -> EngineResult<()> {
    let dataset = homes(60);
    let mut engine = engine(dataset.clone(), SamplerSpec::UniformNumBlocks { num_blocks: 3 });
    let id = engine.submit(QueryDefinition::count(vec![dataset.field("city")?, dataset.field("rooms")?]))?;
    engine.run_all();

    let query = engine.query(id).expect("query is registered");
    for (key, value) in query.result_list() {
        let rows = engine.select(&AndPredicate::from_key(&key), None);
        assert_eq!(rows.len() as u64, value.count);
    }
    Ok(())
}
