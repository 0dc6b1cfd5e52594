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

//! Invariants of sampling, folding and progress that must hold for all inputs

use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use progdb_common::{DataType, Value, VlType};
use progdb_core::{
    AccumulatorKind, AggregateValue, AndPredicate, Dataset, Engine, EngineConfig, Field, GroupBy, Priority, QueryDefinition, SampleBlock, Sampler, SamplerSpec,
    UniformNumBlocksSampler, UniformRandomSampler,
};
use std::sync::Arc;

fn is_partition(blocks: &[SampleBlock], n: usize) -> bool {
    let mut seen: Vec<usize> = blocks.iter().flat_map(|b| b.row_indices.iter().copied()).collect();
    seen.sort_unstable();
    seen == (0..n).collect::<Vec<_>>()
}

fn arb_value() -> impl Strategy<Value = Option<f64>> {
    prop_oneof![
        4 => (-1e4_f64..1e4_f64).prop_map(Some),
        1 => Just(None),
    ]
}

fn arb_kind() -> impl Strategy<Value = AccumulatorKind> {
    prop::sample::select(AccumulatorKind::ALL.to_vec())
}

fn fold(kind: AccumulatorKind, values: &[Option<f64>]) -> AggregateValue {
    values.iter().fold(kind.init_partial_value(), |acc, v| kind.reduce(acc, *v))
}

proptest! {
    #[test]
    fn prop_num_blocks_sampler_covers_rows(n in 0usize..2000, k in 1usize..64) {
        let blocks = UniformNumBlocksSampler::new(k).unwrap().plan(n);
        prop_assert!(is_partition(&blocks, n));
        prop_assert!(blocks.len() <= k);
        if n > 0 {
            let size = n.div_ceil(k);
            prop_assert!(blocks.iter().all(|b| b.len() <= size && !b.is_empty()));
        }
    }

    #[test]
    fn prop_random_sampler_covers_rows(n in 0usize..2000, size in 1usize..300, seed in any::<u64>()) {
        let blocks = UniformRandomSampler::new(size, Some(seed)).unwrap().plan(n);
        prop_assert!(is_partition(&blocks, n));
        prop_assert_eq!(blocks.len(), n.div_ceil(size));
    }

    #[test]
    fn prop_block_order_does_not_change_result(
        kind in arb_kind(),
        values in prop::collection::vec(arb_value(), 0..200),
        block_size in 1usize..32,
        seed in any::<u64>(),
    ) {
        let partials: Vec<AggregateValue> = values.chunks(block_size).map(|chunk| fold(kind, chunk)).collect();
        let forward = partials.iter().fold(kind.init_accumulated_value(), |acc, p| kind.accumulate(acc, *p));

        let mut shuffled = partials.clone();
        shuffled.shuffle(&mut StdRng::seed_from_u64(seed));
        let permuted = shuffled.iter().fold(kind.init_accumulated_value(), |acc, p| kind.accumulate(acc, *p));

        prop_assert_eq!(forward.count, permuted.count);
        prop_assert_eq!(forward.null_count, permuted.null_count);
        prop_assert!((forward.sum - permuted.sum).abs() <= 1e-6 * (1.0 + forward.sum.abs()));
        prop_assert!((forward.ssum - permuted.ssum).abs() <= 1e-6 * (1.0 + forward.ssum.abs()));
        prop_assert_eq!(forward.min, permuted.min);
        prop_assert_eq!(forward.max, permuted.max);

        let sequential = fold(kind, &values);
        prop_assert_eq!(forward.count, sequential.count);
        prop_assert_eq!(forward.count, values.len() as u64);
    }

    #[test]
    fn prop_progress_is_monotonic(rows in 0usize..300, num_blocks in 1usize..12) {
        let city = Arc::new(Field::categorical("city", 0, DataType::String, VlType::Dozen, false));
        let data = (0..rows).map(|i| vec![Value::Text(format!("c{}", i % 4))]).collect();
        let dataset = Arc::new(Dataset::new("p", vec![city.clone()], data));

        let config = EngineConfig { sampler: SamplerSpec::UniformNumBlocks { num_blocks }, ..Default::default() };
        let mut engine = Engine::new(dataset, config).unwrap();
        let query = engine.create_query(QueryDefinition::new(AccumulatorKind::Count, None, GroupBy::new(vec![city]), AndPredicate::default())).unwrap();
        let total_blocks = query.progress().total_blocks;
        let id = engine.request(query, Priority::Lowest);

        let mut last_blocks = 0;
        let mut last_count = 0;
        while let Some(report) = engine.run_one() {
            prop_assert!(report.progress.processed_blocks > last_blocks);
            prop_assert!(report.progress.processed_blocks <= total_blocks);
            prop_assert!(report.progress.processed_rows <= rows);
            last_blocks = report.progress.processed_blocks;

            let count: u64 = engine.query(id).unwrap().result().values().map(|v| v.count).sum();
            prop_assert!(count >= last_count);
            last_count = count;
        }

        prop_assert_eq!(last_blocks, total_blocks);
        prop_assert_eq!(last_count, rows as u64);
    }
}
