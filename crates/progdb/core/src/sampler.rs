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

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::{EngineError, EngineResult};

/// A disjoint slice of the dataset's row indices, processed by one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleBlock {
    pub index: usize,
    pub row_indices: Vec<usize>,
}

impl SampleBlock {
    pub fn len(&self) -> usize {
        self.row_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_indices.is_empty()
    }
}

/// Policy that partitions the rows `[0, n)` into sample blocks.
///
/// The blocks returned by [`Sampler::plan`] must be pairwise disjoint and
/// their union must be exactly `{0, .., n - 1}`.
pub trait Sampler: fmt::Debug + Send + Sync {
    fn plan(&self, n: usize) -> Vec<SampleBlock>;
    /// Serializable description of this sampler
    fn spec(&self) -> SamplerSpec;
}

/// Cuts the rows, in their original order, into a fixed number of blocks.
#[derive(Debug, Clone)]
pub struct UniformNumBlocksSampler {
    num_blocks: usize,
}

impl UniformNumBlocksSampler {
    pub fn new(num_blocks: usize) -> EngineResult<Self> {
        if num_blocks == 0 {
            return Err(EngineError::InvalidSampler("number of blocks must be positive".to_string()));
        }
        Ok(Self { num_blocks })
    }
}

impl Sampler for UniformNumBlocksSampler {
    fn plan(&self, n: usize) -> Vec<SampleBlock> {
        if n == 0 {
            return Vec::new();
        }

        let block_size = n.div_ceil(self.num_blocks);
        (0..n)
            .step_by(block_size)
            .enumerate()
            .map(|(index, start)| SampleBlock {
                index,
                row_indices: (start..(start + block_size).min(n)).collect(),
            })
            .collect()
    }

    fn spec(&self) -> SamplerSpec {
        SamplerSpec::UniformNumBlocks { num_blocks: self.num_blocks }
    }
}

/// Shuffles the rows once and cuts them into blocks of a fixed size.
#[derive(Debug, Clone)]
pub struct UniformRandomSampler {
    sample_size: usize,
    seed: Option<u64>,
}

impl UniformRandomSampler {
    pub fn new(sample_size: usize, seed: Option<u64>) -> EngineResult<Self> {
        if sample_size == 0 {
            return Err(EngineError::InvalidSampler("sample size must be positive".to_string()));
        }
        Ok(Self { sample_size, seed })
    }
}

impl Sampler for UniformRandomSampler {
    fn plan(&self, n: usize) -> Vec<SampleBlock> {
        let mut indices: Vec<usize> = (0..n).collect();
        match self.seed {
            Some(seed) => indices.shuffle(&mut StdRng::seed_from_u64(seed)),
            None => indices.shuffle(&mut rand::thread_rng()),
        }

        indices
            .chunks(self.sample_size)
            .enumerate()
            .map(|(index, chunk)| SampleBlock { index, row_indices: chunk.to_vec() })
            .collect()
    }

    fn spec(&self) -> SamplerSpec {
        SamplerSpec::UniformRandom {
            sample_size: self.sample_size,
            seed: self.seed,
        }
    }
}

/// Serializable sampler selection, as found in engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SamplerSpec {
    UniformNumBlocks { num_blocks: usize },
    UniformRandom {
        sample_size: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seed: Option<u64>,
    },
}

impl SamplerSpec {
    pub fn build(&self) -> EngineResult<Arc<dyn Sampler>> {
        let sampler: Arc<dyn Sampler> = match *self {
            Self::UniformNumBlocks { num_blocks } => Arc::new(UniformNumBlocksSampler::new(num_blocks)?),
            Self::UniformRandom { sample_size, seed } => Arc::new(UniformRandomSampler::new(sample_size, seed)?),
        };
        Ok(sampler)
    }
}

impl Default for SamplerSpec {
    fn default() -> Self {
        Self::UniformRandom { sample_size: 1000, seed: None }
    }
}
