use crate::coupling::*;
use fnv::FnvHashMap as HashMap;
use log::{debug, info};
use matrix_util::traits::MassOps;
use ndarray::prelude::*;
use std::fmt::Debug;
use std::hash::Hash;

/// Dense transport plans kept in memory, one `source x target` matrix
/// per `(start, end)` pair
///
/// * `push` - optionally rescale input columns to unit mass, then for
///   each plan in the selection, optionally divide rows by the plan's
///   source marginal (row sums) and apply `planᵀ`
/// * `pull` - the same backwards: target marginal (column sums) and
///   `plan`, walking the selection from the last plan to the first
///
#[derive(Clone, Debug)]
pub struct DenseCouplingStore<K> {
    plans: HashMap<PlanKey<K>, Array2<f64>>,
}

impl<K> DenseCouplingStore<K>
where
    K: Clone + Eq + Hash + Debug + Send + Sync,
{
    pub fn new() -> Self {
        Self {
            plans: HashMap::default(),
        }
    }

    /// Register the plan between `start` and `end`, replacing any
    /// previous one
    pub fn insert(&mut self, start: &K, end: &K, plan: Array2<f64>) -> anyhow::Result<()> {
        if plan.is_empty() {
            return Err(anyhow::anyhow!(
                "empty plan for ({:?}, {:?}): {} x {}",
                start,
                end,
                plan.nrows(),
                plan.ncols()
            ));
        }

        if plan.iter().any(|&x| !x.is_finite() || x < 0.0) {
            return Err(anyhow::anyhow!(
                "plan ({:?}, {:?}) must be finite and non-negative",
                start,
                end
            ));
        }

        debug!(
            "plan ({:?}, {:?}): {} x {}, total mass {}",
            start,
            end,
            plan.nrows(),
            plan.ncols(),
            plan.sum()
        );
        self.plans.insert((start.clone(), end.clone()), plan);
        Ok(())
    }

    pub fn get(&self, start: &K, end: &K) -> anyhow::Result<&Array2<f64>> {
        self.plans
            .get(&(start.clone(), end.clone()))
            .ok_or_else(|| anyhow::anyhow!("no plan stored for ({:?}, {:?})", start, end))
    }

    /// `(source_dim, target_dim)` of a stored plan
    pub fn dims(&self, start: &K, end: &K) -> anyhow::Result<(usize, usize)> {
        Ok(self.get(start, end)?.dim())
    }

    pub fn keys(&self) -> Vec<PlanKey<K>> {
        self.plans.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    /// Multiply the plans chained through `points` and store the
    /// product under `(first, last)`
    pub fn insert_composite(&mut self, points: &[K]) -> anyhow::Result<(usize, usize)> {
        let selection = PlanSelection::chain(points)?;
        let start = &points[0];
        let end = &points[points.len() - 1];

        let mut product: Option<Array2<f64>> = None;
        for (s, e) in selection.steps(start, end)? {
            let plan = self.get(s, e)?;
            product = Some(match product {
                None => plan.clone(),
                Some(acc) => {
                    if acc.ncols() != plan.nrows() {
                        return Err(anyhow::anyhow!(
                            "cannot compose: {} target points before ({:?}, {:?}) but {} source points in it",
                            acc.ncols(),
                            s,
                            e,
                            plan.nrows()
                        ));
                    }
                    acc.dot(plan)
                }
            });
        }

        let product = product.ok_or_else(|| anyhow::anyhow!("nothing to compose"))?;
        let dim = product.dim();
        info!(
            "composed {} plans from {:?} to {:?}: {} x {}",
            points.len() - 1,
            start,
            end,
            dim.0,
            dim.1
        );
        self.insert(start, end, product)?;
        Ok(dim)
    }

    fn transport(
        &self,
        steps: &[PlanKey<K>],
        data: ArrayView2<f64>,
        options: &QueryOptions,
        forward: bool,
    ) -> anyhow::Result<Array2<f64>> {
        let mut data = data.to_owned();

        if options.normalize {
            data.normalize_mass_inplace();
        }

        let ordered: Vec<&PlanKey<K>> = if forward {
            steps.iter().collect()
        } else {
            steps.iter().rev().collect()
        };

        for (s, e) in ordered {
            let plan = self.get(s, e)?;
            let (plan, marginal_axis) = if forward {
                (plan.t(), Axis(1))
            } else {
                (plan.view(), Axis(0))
            };

            if data.nrows() != plan.ncols() {
                return Err(anyhow::anyhow!(
                    "{} through ({:?}, {:?}): data has {} rows but the plan expects {}",
                    if forward { "push" } else { "pull" },
                    s,
                    e,
                    data.nrows(),
                    plan.ncols()
                ));
            }

            if options.scale_by_marginals {
                let marginal = self.get(s, e)?.sum_axis(marginal_axis);
                divide_rows_by(&mut data, &marginal);
            }

            data = plan.dot(&data);
        }
        Ok(data)
    }
}

impl DenseCouplingStore<usize> {
    /// Plans between consecutive time points `0 -> 1 -> ... -> k`
    pub fn from_time_series(plans: Vec<Array2<f64>>) -> anyhow::Result<Self> {
        let mut ret = Self::new();
        for (t, plan) in plans.into_iter().enumerate() {
            ret.insert(&t, &(t + 1), plan)?;
        }
        Ok(ret)
    }
}

impl<K> Default for DenseCouplingStore<K>
where
    K: Clone + Eq + Hash + Debug + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

/// `data[i, :] /= marginal[i]`; rows with no marginal mass become zero
fn divide_rows_by(data: &mut Array2<f64>, marginal: &Array1<f64>) {
    for (mut row, &m) in data.rows_mut().into_iter().zip(marginal.iter()) {
        if m > 0.0 {
            row.mapv_inplace(|x| x / m);
        } else {
            row.fill(0.0);
        }
    }
}

impl<K> CouplingOps for DenseCouplingStore<K>
where
    K: Clone + Eq + Hash + Debug + Send + Sync,
{
    type Key = K;

    fn push(
        &self,
        start: &K,
        end: &K,
        data: ArrayView2<f64>,
        options: &QueryOptions,
        plans: &PlanSelection<K>,
    ) -> anyhow::Result<Array2<f64>> {
        let steps = plans.steps(start, end)?;
        self.transport(steps, data, options, true)
    }

    fn pull(
        &self,
        start: &K,
        end: &K,
        data: ArrayView2<f64>,
        options: &QueryOptions,
        plans: &PlanSelection<K>,
    ) -> anyhow::Result<Array2<f64>> {
        let steps = plans.steps(start, end)?;
        self.transport(steps, data, options, false)
    }
}
