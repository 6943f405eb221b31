use crate::coupling::*;

use indicatif::{ParallelProgressIterator, ProgressBar, ProgressDrawTarget};
use log::{debug, info, warn};
use matrix_util::common_io::open_buf_reader;
use matrix_util::traits::{MassOps, ShapeOps};
use matrix_util::utils::{generate_minibatch_intervals, unique_with_counts};
use ndarray::prelude::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use rand_distr::{weighted::WeightedIndex, Distribution};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BATCH_SIZE: usize = 256;
pub const DEFAULT_SEED: u64 = 42;

/// added to the column sums before they are used as divisors
pub const COLUMN_SUM_EPS: f64 = 1e-12;

/// How to sample from a transport map
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// maximum number of distinct source rows pushed through the
    /// coupling at once; bounds the `source_dim x batch_size`
    /// indicator matrix and nothing else
    pub batch_size: usize,

    /// correct target weights for unequal mass growth
    pub account_for_unbalancedness: bool,

    /// required with `account_for_unbalancedness`; column sums are
    /// raised to `1 - interpolation_parameter`
    pub interpolation_parameter: Option<f64>,

    /// source rows are drawn from a generator seeded with `seed`;
    /// targets of row `r` from one seeded with `(seed, r)`
    pub seed: u64,

    /// passed through to every `push`/`pull`
    pub query: QueryOptions,

    pub show_progress: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            account_for_unbalancedness: false,
            interpolation_parameter: None,
            seed: DEFAULT_SEED,
            query: QueryOptions::default(),
            show_progress: false,
        }
    }
}

impl SamplerConfig {
    /// Read a (partial) configuration from a JSON file; missing
    /// fields take their default values
    pub fn from_json(file: &str) -> anyhow::Result<Self> {
        let reader = open_buf_reader(file)?;
        let config: Self = serde_json::from_reader(reader)
            .map_err(|e| anyhow::anyhow!("failed to parse {}: {}", file, e))?;
        Ok(config)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_query(mut self, query: QueryOptions) -> Self {
        self.query = query;
        self
    }

    /// Turn on the growth correction
    pub fn unbalanced(mut self, interpolation_parameter: f64) -> Self {
        self.account_for_unbalancedness = true;
        self.interpolation_parameter = Some(interpolation_parameter);
        self
    }

    /// The exponent `1 - interpolation_parameter` applied to column
    /// sums, or `None` for balanced sampling
    pub fn unbalanced_exponent(&self) -> anyhow::Result<Option<f64>> {
        let exponent = self.checked_exponent()?;
        if !self.account_for_unbalancedness && self.interpolation_parameter.is_some() {
            warn!("`interpolation_parameter` is ignored without `account_for_unbalancedness`");
        }
        Ok(exponent)
    }

    /// Check the configuration without logging anything
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.batch_size > 0, "`batch_size` must be positive");
        self.checked_exponent()?;
        Ok(())
    }

    fn checked_exponent(&self) -> anyhow::Result<Option<f64>> {
        if !self.account_for_unbalancedness {
            return Ok(None);
        }

        let Some(t) = self.interpolation_parameter else {
            anyhow::bail!(
                "`interpolation_parameter` must be provided when `account_for_unbalancedness` is set"
            );
        };

        if !t.is_finite() || !(0.0..=1.0).contains(&t) {
            anyhow::bail!("`interpolation_parameter` must lie in [0, 1], got {}", t);
        }

        Ok(Some(1.0 - t))
    }
}

/// Sampled source rows with the targets drawn for each of them
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TmapSample {
    /// distinct source rows in ascending order
    pub rows: Vec<usize>,
    /// `cols[i]` are the targets drawn for `rows[i]`
    pub cols: Vec<Vec<usize>>,
}

impl TmapSample {
    /// total number of `(source, target)` draws
    pub fn n_samples(&self) -> usize {
        self.cols.iter().map(|c| c.len()).sum()
    }

    /// flatten to one `(source, target)` pair per draw
    pub fn pairs(&self) -> Vec<(usize, usize)> {
        self.rows
            .iter()
            .zip(self.cols.iter())
            .flat_map(|(&r, cols)| cols.iter().map(move |&c| (r, c)))
            .collect()
    }

    /// Frequencies of the draws as a `source_dim x target_dim` matrix
    /// summing to one
    pub fn empirical_coupling(
        &self,
        source_dim: usize,
        target_dim: usize,
    ) -> anyhow::Result<Array2<f64>> {
        let mut ret = Array2::<f64>::zeros((source_dim, target_dim));
        for (r, c) in self.pairs() {
            let x = ret.get_mut((r, c)).ok_or_else(|| {
                anyhow::anyhow!(
                    "draw ({}, {}) outside {} x {}",
                    r,
                    c,
                    source_dim,
                    target_dim
                )
            })?;
            *x += 1.0;
        }
        let n = self.n_samples();
        if n > 0 {
            ret /= n as f64;
        }
        Ok(ret)
    }
}

/// Draw `(source, target)` pairs from a transport map
pub trait TmapSampleOps: CouplingOps + Sync {
    /// Sample `n_samples` source rows in proportion to the (possibly
    /// growth-corrected) row marginal of the `(start, end)` coupling,
    /// then for each distinct row as many targets as it was drawn,
    /// from the row's conditional target distribution.
    ///
    /// # Arguments
    /// * `start`, `end` - the pair of distributions to query
    /// * `n_samples` - number of source draws
    /// * `source_dim`, `target_dim` - sizes of the two index spaces
    /// * `config` - batching, growth correction, seed and query flags
    ///
    /// # Returns
    /// `TmapSample` with `rows.len() == cols.len()` and `n_samples`
    /// draws in total
    fn sample_from_tmap(
        &self,
        start: &Self::Key,
        end: &Self::Key,
        n_samples: usize,
        source_dim: usize,
        target_dim: usize,
        config: &SamplerConfig,
    ) -> anyhow::Result<TmapSample> {
        let exponent = config.unbalanced_exponent()?;

        anyhow::ensure!(n_samples > 0, "`n_samples` must be positive");
        anyhow::ensure!(
            source_dim > 0 && target_dim > 0,
            "empty distributions: {} x {}",
            source_dim,
            target_dim
        );
        anyhow::ensure!(config.batch_size > 0, "`batch_size` must be positive");

        let plans = PlanSelection::single(start, end);

        // 1. target weights, optionally corrected for growth
        let mut mass = Array1::<f64>::ones(target_dim);

        let col_sums = match exponent {
            Some(exponent) => {
                let ones = Array2::<f64>::ones((source_dim, 1));
                let col_sums = self
                    .push(start, end, ones.view(), &config.query, &plans)?
                    .squeeze_to_vector(target_dim)?
                    .mapv(|x| x + COLUMN_SUM_EPS);
                mass.zip_mut_with(&col_sums, |m, &c| *m /= c.powf(exponent));
                debug!("column sums: {:?}", col_sums);
                Some(col_sums)
            }
            None => None,
        };

        // 2. source rows
        let row_probability = self
            .pull(
                start,
                end,
                mass.view().insert_axis(Axis(1)),
                &config.query,
                &plans,
            )?
            .squeeze_to_vector(source_dim)?
            .normalize_mass();

        let row_sampler = WeightedIndex::new(row_probability.iter()).map_err(|e| {
            anyhow::anyhow!(
                "cannot sample source rows of ({:?}, {:?}): {}",
                start,
                end,
                e
            )
        })?;

        let mut rng = SmallRng::seed_from_u64(config.seed);
        let rows_sampled: Vec<usize> = (0..n_samples)
            .map(|_| row_sampler.sample(&mut rng))
            .collect();

        let (rows, counts) = unique_with_counts(&rows_sampled, source_dim)?;

        // 3. targets given rows, batch by batch
        let intervals = generate_minibatch_intervals(rows.len(), config.batch_size);

        info!(
            "({:?}, {:?}): {} draws over {} distinct source rows in {} batch(es)",
            start,
            end,
            n_samples,
            rows.len(),
            intervals.len()
        );

        let pb = ProgressBar::new(intervals.len() as u64);
        if !config.show_progress {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        }

        let batches = intervals
            .par_iter()
            .progress_with(pb.clone())
            .map(|&(lb, ub)| {
                sample_targets_given_rows(
                    self,
                    start,
                    end,
                    &rows[lb..ub],
                    &counts[lb..ub],
                    (source_dim, target_dim),
                    col_sums.as_ref(),
                    &plans,
                    config,
                )
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        pb.finish_and_clear();

        let cols: Vec<Vec<usize>> = batches.into_iter().flatten().collect();
        debug_assert_eq!(cols.len(), rows.len());

        Ok(TmapSample { rows, cols })
    }
}

impl<C> TmapSampleOps for C where C: CouplingOps + Sync {}

/// A generator that depends only on the seed and the source row, so
/// the draws do not depend on how rows are split into batches
fn row_rng(seed: u64, row: usize) -> SmallRng {
    const GOLDEN: u64 = 0x9E37_79B9_7F4A_7C15;
    SmallRng::seed_from_u64(seed ^ (row as u64).wrapping_add(1).wrapping_mul(GOLDEN))
}

#[allow(clippy::too_many_arguments)]
fn sample_targets_given_rows<C>(
    coupling: &C,
    start: &C::Key,
    end: &C::Key,
    rows: &[usize],
    counts: &[usize],
    (source_dim, target_dim): (usize, usize),
    col_sums: Option<&Array1<f64>>,
    plans: &PlanSelection<C::Key>,
    config: &SamplerConfig,
) -> anyhow::Result<Vec<Vec<usize>>>
where
    C: CouplingOps + ?Sized,
{
    let nrows = rows.len();

    let mut indicator = Array2::<f64>::zeros((source_dim, nrows));
    for (j, &r) in rows.iter().enumerate() {
        indicator[(r, j)] = 1.0;
    }

    // target_dim x nrows: column j is the target distribution of rows[j]
    let mut col_p_given_row = coupling.push(start, end, indicator.view(), &config.query, plans)?;
    col_p_given_row.ensure_dim(target_dim, nrows)?;

    if let Some(col_sums) = col_sums {
        col_p_given_row /= &col_sums.view().insert_axis(Axis(1));
    }

    rows.iter()
        .zip(counts.iter())
        .enumerate()
        .map(|(j, (&r, &n))| -> anyhow::Result<Vec<usize>> {
            let p_j = col_p_given_row.column(j).to_owned().normalize_mass();
            let col_sampler = WeightedIndex::new(p_j.iter()).map_err(|e| {
                anyhow::anyhow!("cannot sample targets of source row {}: {}", r, e)
            })?;
            let mut rng = row_rng(config.seed, r);
            Ok((0..n).map(|_| col_sampler.sample(&mut rng)).collect())
        })
        .collect()
}
