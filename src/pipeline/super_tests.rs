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

//! Tests of the whole pipeline on in-memory inputs.

use super::configuration::{
    Config, DensifierKind, EdgePolicy, Input, Interpolation, Output, Resources,
};
use super::dataset::tests::synthetic_dataset;
use super::observations::ObservationTable;
use super::progress::tests::RecordingObserver;
use super::{run, Interpolated};
use crate::errors::{AlignmentError, AssemblyError, ObservationError, PipelineError};
use float_cmp::approx_eq;
use ndarray::{s, Axis};
use rayon::ThreadPoolBuilder;
use std::path::PathBuf;

/// 2012-10-28 00:00:00 UTC
const START: i64 = 1_351_382_400;

const OBSERVATIONS: &str = "
2012-10-28 00:00 10.0 0.0
2012-10-28 00:30 NaN 180.0
2012-10-28 01:00 10.0 270.0
2012-10-28 01:30 55.0 400.0
2012-10-28 01:30 abc 90.0
2012-10-28 02:00 20.0 270.0
";

fn config(interpolation: Interpolation) -> Config {
    Config {
        input: Input {
            dataset: PathBuf::from("era5_data_20121027_20121029.nc"),
            observations: PathBuf::from("spd_dir2.txt"),
            timesteps: None,
        },
        output: Output {
            dataset: PathBuf::from("era5_data_30min_obs_wind.nc"),
            components_csv: None,
            reverse_latitude: true,
        },
        interpolation,
        resources: Resources::default(),
    }
}

fn run_with(interpolation: Interpolation, observations: &str) -> Result<Interpolated, PipelineError> {
    let native = synthetic_dataset(&[START, START + 3600, START + 7200], 3, 4);
    let observations = ObservationTable::new_from_reader(observations.as_bytes()).unwrap();
    let threadpool = ThreadPoolBuilder::new().num_threads(2).build().unwrap();

    run(
        &config(interpolation),
        &threadpool,
        &native,
        &observations,
        &RecordingObserver::default(),
    )
}

#[test]
fn half_hourly_output_from_hourly_input() {
    let native = synthetic_dataset(&[START, START + 3600, START + 7200], 3, 4);

    let result = run_with(Interpolation::default(), OBSERVATIONS).unwrap();
    let output = &result.dataset;

    assert_eq!(
        output.time.timestamps(),
        vec![START, START + 1800, START + 3600, START + 5400, START + 7200]
    );
    assert_eq!(output.time_name, "time");

    let u: Vec<f64> = result.aligned.iter().map(|sample| sample.u).collect();
    let v: Vec<f64> = result.aligned.iter().map(|sample| sample.v).collect();
    let expected_u = [0.0, 5.0, 10.0, 15.0, 20.0];
    let expected_v = [-10.0, -5.0, 0.0, 0.0, 0.0];

    for step in 0..5 {
        assert!(approx_eq!(f64, u[step], expected_u[step], epsilon = 1e-9));
        assert!(approx_eq!(f64, v[step], expected_v[step], epsilon = 1e-9));

        let u10 = output.variables["u10"].data.index_axis(Axis(0), step);
        assert!(u10.iter().all(|&value| value == u[step]));
    }

    for name in native.variables.keys() {
        assert!(output.variables.contains_key(name));
    }
    assert!(output.variable_count() >= native.variable_count());
}

#[test]
fn latitude_is_reversed_consistently() {
    let native = synthetic_dataset(&[START, START + 3600, START + 7200], 3, 4);

    let result = run_with(Interpolation::default(), OBSERVATIONS).unwrap();
    let output = &result.dataset;

    let reversed_lat = native.latitude.values.slice(s![..;-1]).to_owned();
    assert_eq!(output.latitude.values, reversed_lat);

    let msl_in = native.gridded_field("msl").unwrap().data;
    let msl_out = output.gridded_field("msl").unwrap().data;

    for j in 0..3 {
        assert_eq!(
            msl_out.slice(s![0, j, ..]),
            msl_in.slice(s![0, 2 - j, ..])
        );
        assert_eq!(
            msl_out.slice(s![1, j, ..]),
            (&msl_in.slice(s![0, 2 - j, ..]) + &msl_in.slice(s![1, 2 - j, ..])) / 2.0
        );
    }

    // passthrough sst is 290 + t + j in native order
    let sst_out = &output.variables["sst"].data;
    assert_eq!(sst_out.iter().next(), Some(&292.0));
}

#[test]
fn uncovered_end_fails_by_default() {
    let observations = "
2012-10-28 00:00 10.0 0.0
2012-10-28 01:00 10.0 270.0
";

    let result = run_with(Interpolation::default(), observations);

    assert!(matches!(
        result,
        Err(PipelineError::Alignment(AlignmentError::UncoveredTimestep(_)))
    ));
}

#[test]
fn uncovered_end_is_held_when_configured() {
    let observations = "
2012-10-28 00:00 10.0 0.0
2012-10-28 01:00 10.0 270.0
";
    let interpolation = Interpolation {
        edge_policy: EdgePolicy::NearestHold,
        ..Interpolation::default()
    };

    let result = run_with(interpolation, observations).unwrap();

    let last = result.aligned.last().unwrap();
    assert!(approx_eq!(f64, last.u, 10.0, epsilon = 1e-9));
    assert_eq!(result.aligned.len(), 5);
}

#[test]
fn non_dividing_interval_needs_time_based_densifier() {
    let interpolation = Interpolation {
        interval: 2400,
        ..Interpolation::default()
    };

    let result = run_with(interpolation, OBSERVATIONS);

    assert!(matches!(
        result,
        Err(PipelineError::Assembly(AssemblyError::Densify(..)))
    ));

    let interpolation = Interpolation {
        interval: 2400,
        densifier: DensifierKind::Linear,
        ..Interpolation::default()
    };

    let result = run_with(interpolation, OBSERVATIONS).unwrap();

    assert_eq!(
        result.dataset.time.timestamps(),
        vec![START, START + 2400, START + 4800, START + 7200]
    );
    assert_eq!(result.dataset.variables["msl"].data.shape(), &[4, 3, 4]);
}

#[test]
fn empty_observations_are_rejected() {
    let result = ObservationTable::new_from_reader("2012-10-28 00:00 120.0 10.0\n".as_bytes());

    assert!(matches!(result, Err(ObservationError::EmptyData)));
}

#[test]
fn unrepresentable_interval_is_rejected() {
    let interpolation = Interpolation {
        interval: i64::MAX,
        ..Interpolation::default()
    };

    let result = run_with(interpolation, OBSERVATIONS);

    assert!(matches!(
        result,
        Err(PipelineError::Alignment(AlignmentError::InvalidInterval(i64::MAX)))
    ));
}
