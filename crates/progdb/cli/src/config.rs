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

use anyhow::Result;
use progdb_core::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "PROGDB_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Decimal places when printing estimates
    pub precision: usize,
    /// Print intervals after every block rather than only at the end
    pub every_block: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { precision: 3, every_block: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub engine: EngineConfig,
    pub output: OutputConfig,
}

impl CliConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Loads the config from `--config`, then `PROGDB_CONFIG`, falling back to defaults.
    pub fn resolve(cli_config: Option<PathBuf>) -> Result<Self> {
        let config = if let Some(config_path) = cli_config {
            Self::load_from_file(config_path)?
        } else if let Ok(env_config) = std::env::var(CONFIG_ENV) {
            Self::load_from_file(env_config)?
        } else {
            Self::default()
        };

        config.engine.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use progdb_core::{SamplerSpec, SchedulerKind};
    use std::io::Write;

    #[test]
    fn test_load_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[engine]
scheduler = "RoundRobin"
default_priority = "Highest"

[engine.sampler]
kind = "uniform_num_blocks"
num_blocks = 8

[output]
precision = 1
"#
        )
        .unwrap();

        let config = CliConfig::resolve(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.engine.scheduler, SchedulerKind::RoundRobin);
        assert_eq!(config.engine.sampler, SamplerSpec::UniformNumBlocks { num_blocks: 8 });
        assert_eq!(config.output.precision, 1);
        assert!(config.output.every_block);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[engine.sampler]\nkind = \"uniform_random\"\nsample_size = 0").unwrap();
        assert!(CliConfig::resolve(Some(file.path().to_path_buf())).is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = CliConfig::default();
        let parsed: CliConfig = toml::from_str(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }
}
