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

//! Module reporting pipeline progress.
//!
//! Pipeline stages do not write to the console directly. Instead they
//! send [`PipelineEvent`]s to a [`ProgressObserver`], which decides
//! how (and if) to report them.

use crate::constants::PROGRESS_LOG_EVERY;
use crate::Float;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use std::path::Path;

/// Notable moments of the pipeline run.
#[derive(Clone, PartialEq, Debug)]
pub enum PipelineEvent<'a> {
    ObservationsLoaded { valid: usize, dropped: usize },
    TargetAxisBuilt { native_steps: usize, target_steps: usize },
    FieldDensified { name: &'a str, steps: usize },
    BroadcastStep { step: usize, total: usize, u: Float, v: Float },
    FieldBroadcast { name: &'a str, steps: usize },
    DatasetAssembled { variables: usize },
    OutputWritten { path: &'a Path },
}

pub trait ProgressObserver {
    fn notify(&self, event: &PipelineEvent);
}

/// Observer writing events as log records.
#[derive(Copy, Clone, Debug, Default)]
pub struct LogObserver;

impl ProgressObserver for LogObserver {
    fn notify(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::ObservationsLoaded { valid, dropped } => {
                info!("Read {} wind observations ({} records dropped)", valid, dropped)
            }
            PipelineEvent::TargetAxisBuilt {
                native_steps,
                target_steps,
            } => info!(
                "Interpolating {} native timesteps onto {} target timesteps",
                native_steps, target_steps
            ),
            PipelineEvent::FieldDensified { name, steps } => {
                info!("Interpolated {} to {} timesteps", name, steps)
            }
            PipelineEvent::BroadcastStep { step, total, u, v } => {
                if step % PROGRESS_LOG_EVERY == 0 {
                    info!("Timestep {}/{}: U10={:.2} m/s, V10={:.2} m/s", step + 1, total, u, v);
                } else {
                    debug!("Timestep {}/{}: U10={:.2} m/s, V10={:.2} m/s", step + 1, total, u, v);
                }
            }
            PipelineEvent::FieldBroadcast { name, steps } => {
                info!("Broadcast observed {} over the grid at {} timesteps", name, steps)
            }
            PipelineEvent::DatasetAssembled { variables } => {
                info!("Assembled output dataset with {} variables", variables)
            }
            PipelineEvent::OutputWritten { path } => {
                info!("Output written to {}", path.display())
            }
        }
    }
}

/// Observer showing a progress bar of processed fields,
/// with every event also passed to the [`LogObserver`].
pub struct BarObserver {
    bar: ProgressBar,
    log: LogObserver,
}

impl BarObserver {
    pub fn new(fields_count: usize) -> Self {
        let bar = ProgressBar::new(fields_count as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{prefix} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
                .progress_chars("#>-"),
        );
        bar.set_prefix("Processed fields");

        BarObserver {
            bar,
            log: LogObserver,
        }
    }
}

impl ProgressObserver for BarObserver {
    fn notify(&self, event: &PipelineEvent) {
        self.log.notify(event);

        match event {
            PipelineEvent::FieldDensified { .. } | PipelineEvent::FieldBroadcast { .. } => {
                self.bar.inc(1)
            }
            PipelineEvent::DatasetAssembled { .. } => {
                self.bar.finish_with_message("All fields processed")
            }
            _ => {}
        }
    }
}
