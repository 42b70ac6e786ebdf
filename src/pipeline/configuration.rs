/*
Copyright 2021 Jakub Lewandowski

This file is part of Observed Wind Interpolation (wind-interp).

Observed Wind Interpolation (wind-interp) is a free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 3 of the License, or
(at your option) any later version.

Observed Wind Interpolation (wind-interp) is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with Observed Wind Interpolation (wind-interp). If not, see https://www.gnu.org/licenses/.
*/

//! Module responsible for parsing and checking the configuration file.
//!
//! To provide meaningful error messages. The configuration file uses
//! [YAML](https://en.wikipedia.org/wiki/YAML) and `serde` to enforce
//! strong typing and automatic type checking.
//!
//! The structures and their fields in this module directly correspond to
//! the fields inside `config.yaml` so you can check this documentation
//! for more details how to set the config file.

use crate::constants::{DEFAULT_DENSIFY_RATIO, DEFAULT_TARGET_INTERVAL, MSL, U10, V10};
use crate::errors::ConfigError;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Fields with information about input files.
#[derive(Clone, PartialEq, Debug, Deserialize)]
pub struct Input {
    /// Gridded ERA5 dataset (NetCDF) with `msl`, `u10` and `v10`
    /// on a (time, latitude, longitude) grid.
    pub dataset: PathBuf,

    /// Text file with station wind observations,
    /// one `DATE TIME SPEED DIRECTION` record per line.
    pub observations: PathBuf,

    /// _(Optional)_ Number of leading native time steps to process.
    ///
    /// Defaults to the full native length. Cannot be less than `2`.
    #[serde(default)]
    pub timesteps: Option<usize>,
}

impl Input {
    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        if let Some(steps) = self.timesteps {
            if steps < 2 {
                return Err(ConfigError::OutOfBounds(
                    "At least 2 native timesteps must be processed",
                ));
            }
        }

        Ok(())
    }
}

/// Fields with information about output files.
#[derive(Clone, PartialEq, Debug, Deserialize)]
pub struct Output {
    /// Path of the output NetCDF file. The file must not exist.
    pub dataset: PathBuf,

    /// _(Optional)_ Path of a CSV file to which the observed
    /// wind components aligned to the target axis are written.
    #[serde(default)]
    pub components_csv: Option<PathBuf>,

    /// _(Optional)_ Whether to store latitude in reversed order.
    ///
    /// Defaults to `true`.
    #[serde(default = "Output::default_reverse_latitude")]
    pub reverse_latitude: bool,
}

impl Output {
    fn default_reverse_latitude() -> bool {
        true
    }
}

/// Rule used to densify spatially-resolved fields in time.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DensifierKind {
    Midpoint,
    NearestHold,
    Linear,
}

/// What the aligner does with target steps before the first
/// or after the last observation on the target axis.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgePolicy {
    /// Fail with an alignment error.
    Fail,

    /// Hold the nearest observed value.
    NearestHold,
}

/// _(Optional)_ Fields controlling the temporal interpolation.
#[derive(Clone, PartialEq, Debug, Deserialize)]
pub struct Interpolation {
    /// _(Optional)_ Spacing of the target time axis in seconds.
    ///
    /// Defaults to `1800`. Must be positive. This value is not checked
    /// against the native time step, so an interval that does not
    /// divide the native step produces an axis that does not
    /// subdivide it cleanly.
    #[serde(default = "Interpolation::default_interval")]
    pub interval: i64,

    /// _(Optional)_ Number of target steps per native step used
    /// by the midpoint densifier.
    ///
    /// Defaults to `2`. Cannot be less than `1`.
    #[serde(default = "Interpolation::default_ratio")]
    pub ratio: usize,

    /// _(Optional)_ Densification rule. Defaults to `midpoint`.
    #[serde(default = "Interpolation::default_densifier")]
    pub densifier: DensifierKind,

    /// _(Optional)_ Edge handling of the observation alignment.
    /// Defaults to `fail`.
    #[serde(default = "Interpolation::default_edge_policy")]
    pub edge_policy: EdgePolicy,

    /// _(Optional)_ Spatially-resolved variables interpolated in time
    /// cell by cell. Defaults to `["msl"]`.
    ///
    /// Cannot be empty and cannot contain the broadcast wind components.
    #[serde(default = "Interpolation::default_variables")]
    pub variables: Vec<String>,
}

impl Interpolation {
    fn default_interval() -> i64 {
        DEFAULT_TARGET_INTERVAL
    }

    fn default_ratio() -> usize {
        DEFAULT_DENSIFY_RATIO
    }

    fn default_densifier() -> DensifierKind {
        DensifierKind::Midpoint
    }

    fn default_edge_policy() -> EdgePolicy {
        EdgePolicy::Fail
    }

    fn default_variables() -> Vec<String> {
        vec![MSL.to_string()]
    }

    /// Checks if interpolation settings are within limits.
    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        if self.interval < 1 {
            return Err(ConfigError::OutOfBounds(
                "Target interval cannot be shorter than 1 s",
            ));
        }

        if self.ratio < 1 {
            return Err(ConfigError::OutOfBounds(
                "Densification ratio cannot be less than 1",
            ));
        }

        if self.variables.is_empty() {
            return Err(ConfigError::OutOfBounds(
                "At least one variable must be interpolated",
            ));
        }

        if self.variables.iter().any(|v| v == U10 || v == V10) {
            return Err(ConfigError::OutOfBounds(
                "Wind components are broadcast from observations and cannot be interpolated",
            ));
        }

        Ok(())
    }
}

impl Default for Interpolation {
    fn default() -> Self {
        Interpolation {
            interval: Interpolation::default_interval(),
            ratio: Interpolation::default_ratio(),
            densifier: Interpolation::default_densifier(),
            edge_policy: Interpolation::default_edge_policy(),
            variables: Interpolation::default_variables(),
        }
    }
}

/// _(Optional)_ Fields with information about
/// resources available for the program.
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize)]
pub struct Resources {
    /// _(Optional)_ Thread count used for field densification.
    ///
    /// Cannot be less than `1`. Defaults to `1`.
    #[serde(default = "Resources::default_threads")]
    pub threads: u16,

    /// _(Optional)_ Heap memory limit in MB.
    /// Useful for enabling meaningful Out-of-memory error messages,
    /// as the whole native and output datasets are held in memory.
    ///
    /// Cannot be less than `128`. Defaults to whole addressable-space
    /// (`2^32` or `2^64` bytes).
    #[serde(default = "Resources::default_memory")]
    pub memory: usize,
}

impl Resources {
    fn default_threads() -> u16 {
        1
    }

    fn default_memory() -> usize {
        usize::MAX / (1024 * 1024)
    }

    /// Checks if thread count and memory limit are
    /// above limits.
    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        if self.threads < 1 {
            return Err(ConfigError::OutOfBounds(
                "Available threads cannot be less than 1",
            ));
        }

        if self.memory < 128 {
            return Err(ConfigError::OutOfBounds(
                "Available memory cannot be less than 128 MB",
            ));
        }

        Ok(())
    }
}

impl Default for Resources {
    fn default() -> Self {
        Resources {
            threads: Resources::default_threads(),
            memory: Resources::default_memory(),
        }
    }
}

/// Main config structure representing the fields in
/// configuration file.
#[derive(Clone, PartialEq, Debug, Deserialize)]
pub struct Config {
    pub input: Input,

    pub output: Output,

    #[serde(default)]
    pub interpolation: Interpolation,

    #[serde(default)]
    pub resources: Resources,
}

impl Config {
    /// Config structure constructor, responsible for
    /// deserializing configuration and checking it.
    pub fn new_from_file(file_path: &Path) -> Result<Config, ConfigError> {
        let data = fs::read(file_path)?;
        Config::new_from_slice(data.as_slice())
    }

    fn new_from_slice(data: &[u8]) -> Result<Config, ConfigError> {
        let config: Config = serde_yaml::from_slice(data)?;

        config.input.check_bounds()?;
        config.interpolation.check_bounds()?;
        config.resources.check_bounds()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, DensifierKind, EdgePolicy};
    use crate::errors::ConfigError;

    #[test]
    fn minimal_config_uses_defaults() {
        let yaml = "
input:
  dataset: era5_data_20121027_20121029.nc
  observations: spd_dir2.txt
output:
  dataset: era5_data_30min_obs_wind.nc
";
        let config = Config::new_from_slice(yaml.as_bytes()).unwrap();

        assert_eq!(config.input.timesteps, None);
        assert_eq!(config.interpolation.interval, 1800);
        assert_eq!(config.interpolation.ratio, 2);
        assert_eq!(config.interpolation.densifier, DensifierKind::Midpoint);
        assert_eq!(config.interpolation.edge_policy, EdgePolicy::Fail);
        assert_eq!(config.interpolation.variables, vec!["msl".to_string()]);
        assert!(config.output.reverse_latitude);
        assert!(config.output.components_csv.is_none());
        assert_eq!(config.resources.threads, 1);
    }

    #[test]
    fn full_config() {
        let yaml = "
input:
  dataset: in.nc
  observations: obs.txt
  timesteps: 24
output:
  dataset: out.nc
  components_csv: components.csv
  reverse_latitude: false
interpolation:
  interval: 900
  ratio: 4
  densifier: linear
  edge_policy: nearest_hold
  variables: [msl, sp]
resources:
  threads: 4
  memory: 2048
";
        let config = Config::new_from_slice(yaml.as_bytes()).unwrap();

        assert_eq!(config.input.timesteps, Some(24));
        assert_eq!(config.interpolation.interval, 900);
        assert_eq!(config.interpolation.densifier, DensifierKind::Linear);
        assert_eq!(config.interpolation.edge_policy, EdgePolicy::NearestHold);
        assert_eq!(config.interpolation.variables.len(), 2);
        assert!(!config.output.reverse_latitude);
        assert_eq!(config.resources.memory, 2048);
    }

    #[test]
    fn broadcast_variable_cannot_be_interpolated() {
        let yaml = "
input:
  dataset: in.nc
  observations: obs.txt
output:
  dataset: out.nc
interpolation:
  variables: [msl, u10]
";
        let result = Config::new_from_slice(yaml.as_bytes());

        assert!(matches!(result, Err(ConfigError::OutOfBounds(_))));
    }

    #[test]
    fn non_positive_interval_is_rejected() {
        let yaml = "
input:
  dataset: in.nc
  observations: obs.txt
output:
  dataset: out.nc
interpolation:
  interval: 0
";
        let result = Config::new_from_slice(yaml.as_bytes());

        assert!(matches!(result, Err(ConfigError::OutOfBounds(_))));
    }
}
