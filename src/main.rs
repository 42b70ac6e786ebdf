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

//! Observed Wind Interpolation (wind-interp) post-processes ERA5
//! reanalysis fields for hurricane case studies ahead of SCHISM
//! hydrodynamic model runs.
//!
//! The program takes a gridded ERA5 dataset with hourly mean sea
//! level pressure and 10 m wind, together with wind observations
//! from a single station, and produces a dataset at finer (by default
//! half-hourly) time resolution. Pressure is interpolated in time cell
//! by cell, while the wind components are derived from observations
//! and broadcast over the whole grid.

mod constants;
mod errors;
mod pipeline;

use cap::Cap;
use env_logger::Env;
use log::{error, info};
use std::alloc;

type Float = f64;

/// Global allocator used by the program.
///
/// Use of static global allocator allows for capping the memory to the limit set by user
/// in configuration file and in effect provide better [OOM error](https://en.wikipedia.org/wiki/Out_of_memory) handling.
#[global_allocator]
static ALLOCATOR: Cap<alloc::System> = Cap::new(alloc::System, usize::MAX);

/// The main program function.
/// Prepares the runtime environment and calls the [`pipeline::main`].
///
/// To provide meaningful and high-quality error messages the `env_logger`
/// needs to be initiated before any log messages are possible to occur.
fn main() {
    #[cfg(not(feature = "debug"))]
    let logger_env = Env::new().filter_or("WIND_INTERP_LOG_LEVEL", "info");

    #[cfg(feature = "debug")]
    let logger_env = Env::new().filter_or("WIND_INTERP_LOG_LEVEL", "debug");

    env_logger::Builder::from_env(logger_env)
        .format_timestamp_millis()
        .init();

    match pipeline::main() {
        Ok(_) => info!("Interpolation finished. Check the output file and log."),
        Err(err) => {
            error!("Interpolation failed with error: {}", err);
            std::process::exit(1);
        }
    }
}
