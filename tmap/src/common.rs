pub use clap::{Args, Parser, Subcommand, ValueEnum};
pub use log::info;

pub use matrix_util::common_io::{mkdir, write_lines};
pub use matrix_util::traits::{IoOps, SampleOps};
pub use ndarray::prelude::*;

pub use tmap::*;

/// Plans `0 -> 1 -> ... -> k` read from files, one per consecutive
/// pair of time points
pub struct TimeSeriesPlans {
    pub store: DenseCouplingStore<usize>,
    pub num_time_points: usize,
}

/// Read one dense plan per file and check that consecutive plans
/// share their time point
pub fn read_time_series_plans(plan_files: &[Box<str>]) -> anyhow::Result<TimeSeriesPlans> {
    if plan_files.is_empty() {
        return Err(anyhow::anyhow!("need at least one plan file"));
    }

    let mut plans = Vec::with_capacity(plan_files.len());
    for file in plan_files {
        let plan = Array2::<f64>::read_file(file)?;
        info!("{}: {} x {}", file, plan.nrows(), plan.ncols());
        plans.push(plan);
    }

    for (t, w) in plans.windows(2).enumerate() {
        if w[0].ncols() != w[1].nrows() {
            return Err(anyhow::anyhow!(
                "time point {}: {} has {} columns but {} has {} rows",
                t + 1,
                plan_files[t],
                w[0].ncols(),
                plan_files[t + 1],
                w[1].nrows()
            ));
        }
    }

    let num_time_points = plans.len() + 1;
    let store = DenseCouplingStore::from_time_series(plans)?;
    Ok(TimeSeriesPlans {
        store,
        num_time_points,
    })
}

impl TimeSeriesPlans {
    /// Make `(0, last)` directly queryable and return its dimensions
    pub fn first_to_last(&mut self) -> anyhow::Result<(usize, usize, (usize, usize))> {
        let last = self.num_time_points - 1;
        let dims = if last > 1 {
            let points: Vec<usize> = (0..self.num_time_points).collect();
            self.store.insert_composite(&points)?
        } else {
            self.store.dims(&0, &last)?
        };
        Ok((0, last, dims))
    }
}
