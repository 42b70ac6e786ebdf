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

//! Module containing the interpolation pipeline.
//!
//! The pipeline runs in following stages:
//!
//! 1. Station observations are read, filtered and deduplicated
//!    ([`observations`]).
//! 2. Observed speed and direction are decomposed into eastward and
//!    northward components, as direction cannot be interpolated directly
//!    because of its wraparound at 360 deg ([`components`]).
//! 3. A regular target time axis spanning the native axis of the gridded
//!    dataset is built, and the component series is reindexed onto it with
//!    gaps filled linearly in time ([`alignment`]).
//! 4. Spatially-resolved fields (mean sea level pressure by default) are
//!    densified cell by cell, and observed wind components are broadcast
//!    uniformly over the grid ([`densifier`]).
//! 5. The output dataset is assembled with every other variable carried
//!    through and canonical time metadata ([`assembler`]).
//!
//! Nothing is written until the output dataset is fully assembled.

mod alignment;
mod assembler;
mod bisection;
mod components;
mod configuration;
mod dataset;
mod densifier;
mod diagnostics;
mod observations;
mod progress;

#[cfg(test)]
mod super_tests;

use self::{
    alignment::{align_components, build_target_axis},
    assembler::Assembler,
    components::{resolve_components, ComponentSample},
    configuration::Config,
    dataset::{Dataset, TimeAxis},
    densifier::densifier_from_config,
    observations::ObservationTable,
    progress::{BarObserver, PipelineEvent, ProgressObserver},
};
use crate::{
    constants::{CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH, U10, V10},
    errors::{AlignmentError, OutputError, PipelineError},
    ALLOCATOR,
};
use chrono::Duration;
use log::{debug, info};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::{env, path::PathBuf};

/// Main pipeline function, responsible for all processing steps.
///
/// It reads the provided configuration and inputs, interpolates
/// them onto the target time axis and writes the output dataset.
pub fn main() -> Result<(), PipelineError> {
    info!("Preparing the pipeline core");

    let core = Core::new()?;

    // densified fields and both broadcast components
    let observer = BarObserver::new(core.config.interpolation.variables.len() + 2);

    let interpolated = run(
        &core.config,
        &core.threadpool,
        &core.dataset,
        &core.observations,
        &observer,
    )?;

    diagnostics::log_observed_wind(&interpolated.aligned);
    diagnostics::log_field_ranges(&interpolated.dataset);

    info!("Writing output");

    let mut single_precision: Vec<&str> = core
        .config
        .interpolation
        .variables
        .iter()
        .map(String::as_str)
        .collect();
    single_precision.extend([U10, V10]);

    let output_path = &core.config.output.dataset;
    interpolated
        .dataset
        .write_to_file(output_path, &single_precision)?;

    observer.notify(&PipelineEvent::OutputWritten { path: output_path });

    if let Some(csv_path) = &core.config.output.components_csv {
        info!("Writing aligned wind components to {}", csv_path.display());
        diagnostics::save_components_csv(&interpolated.aligned, csv_path)?;
    }

    diagnostics::log_run_summary(&core.dataset.time, &interpolated.target);

    Ok(())
}

/// Results of the pipeline run kept for writing and diagnostics.
#[derive(Clone, Debug)]
pub struct Interpolated {
    pub target: TimeAxis,
    pub aligned: Vec<ComponentSample>,
    pub dataset: Dataset,
}

/// Runs all processing stages on already loaded inputs.
///
/// Inputs are only read, and the result is fully built in memory.
pub fn run(
    config: &Config,
    threadpool: &ThreadPool,
    native: &Dataset,
    observations: &ObservationTable,
    observer: &dyn ProgressObserver,
) -> Result<Interpolated, PipelineError> {
    observer.notify(&PipelineEvent::ObservationsLoaded {
        valid: observations.len(),
        dropped: observations.dropped(),
    });

    let samples = resolve_components(observations.records())?;

    let interval = Duration::try_seconds(config.interpolation.interval)
        .ok_or(AlignmentError::InvalidInterval(config.interpolation.interval))?;
    let target = build_target_axis(&native.time, interval)?;

    observer.notify(&PipelineEvent::TargetAxisBuilt {
        native_steps: native.time.len(),
        target_steps: target.len(),
    });

    let aligned = align_components(&samples, &target, config.interpolation.edge_policy)?;

    let densifier = densifier_from_config(&config.interpolation);
    debug!("Densifying fields with {} rule", densifier.name());

    let assembler = Assembler {
        densifier: densifier.as_ref(),
        variables: &config.interpolation.variables,
        threadpool,
    };

    let mut dataset = assembler.assemble(native, &target, &aligned, observer)?;

    if config.output.reverse_latitude {
        debug!("Reversing latitude order");
        dataset = dataset.reverse_latitude();
    }

    Ok(Interpolated {
        target,
        aligned,
        dataset,
    })
}

/// Structure containing pipeline inputs.
///
/// To run the pipeline the configuration and both inputs need to be
/// loaded and checked, which is done before any processing starts.
#[derive(Debug)]
pub struct Core {
    pub config: Config,
    pub threadpool: ThreadPool,
    pub dataset: Dataset,
    pub observations: ObservationTable,
}

impl Core {
    /// Pipeline [`Core`] constructor.
    pub fn new() -> Result<Self, PipelineError> {
        let config_path = env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        debug!("Reading configuration from {}", config_path.display());
        let config = Config::new_from_file(&config_path)?;

        check_output_paths(&config)?;

        debug!("Setting memory limit");
        ALLOCATOR
            .set_limit(config.resources.memory * 1024 * 1024)
            .map_err(|_| PipelineError::MemoryLimit(config.resources.memory))?;

        debug!("Setting up ThreadPool");
        let threadpool = ThreadPoolBuilder::new()
            .num_threads(config.resources.threads as usize)
            .build()?;

        info!("Reading gridded dataset from {}", config.input.dataset.display());
        let mut dataset = Dataset::new_from_file(&config.input.dataset)?;

        if let Some(steps) = config.input.timesteps {
            info!("Using first {} of {} native timesteps", steps, dataset.time.len());
            dataset = dataset.select_time_steps(steps)?;
        }

        let observations = ObservationTable::new_from_file(&config.input.observations)?;

        Ok(Core {
            config,
            threadpool,
            dataset,
            observations,
        })
    }
}

/// Fails early when any output file is already present,
/// so that no work is done that could not be saved.
fn check_output_paths(config: &Config) -> Result<(), OutputError> {
    let paths = [Some(&config.output.dataset), config.output.components_csv.as_ref()];

    for path in paths.into_iter().flatten() {
        if path.exists() {
            return Err(OutputError::FileExists(path.display().to_string()));
        }
    }

    Ok(())
}
