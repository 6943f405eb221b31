use fnv::FnvHashMap as HashMap;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;

/// An ordered pair of distributions `(start, end)`
pub type PlanKey<K> = (K, K);

/// Flags forwarded untouched to every coupling query. What they mean
/// numerically is up to the coupling implementation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryOptions {
    pub normalize: bool,
    pub scale_by_marginals: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            normalize: true,
            scale_by_marginals: false,
        }
    }
}

/// Which stored plans answer a query on `(start, end)`.
///
/// A query on `(t0, tk)` may be answered by a single plan or by a
/// chain `(t0, t1), (t1, t2), ..., (tk-1, tk)` applied in order.
#[derive(Clone, Debug)]
pub struct PlanSelection<K> {
    plans: HashMap<PlanKey<K>, Vec<PlanKey<K>>>,
}

impl<K> PlanSelection<K>
where
    K: Clone + Eq + Hash + Debug,
{
    pub fn new() -> Self {
        Self {
            plans: HashMap::default(),
        }
    }

    /// `{(start, end): [(start, end)]}`
    pub fn single(start: &K, end: &K) -> Self {
        let key = (start.clone(), end.clone());
        let mut plans = HashMap::default();
        plans.insert(key.clone(), vec![key]);
        Self { plans }
    }

    /// `{(t0, tk): [(t0, t1), ..., (tk-1, tk)]}` from consecutive points
    pub fn chain(points: &[K]) -> anyhow::Result<Self> {
        if points.len() < 2 {
            return Err(anyhow::anyhow!(
                "need at least two points to chain plans, got {}",
                points.len()
            ));
        }
        let steps: Vec<PlanKey<K>> = points
            .windows(2)
            .map(|w| (w[0].clone(), w[1].clone()))
            .collect();
        let mut ret = Self::new();
        ret.insert(&points[0], &points[points.len() - 1], steps)?;
        Ok(ret)
    }

    /// Register `steps` for `(start, end)`. Steps must be contiguous,
    /// begin at `start` and finish at `end`.
    pub fn insert(&mut self, start: &K, end: &K, steps: Vec<PlanKey<K>>) -> anyhow::Result<()> {
        let (first, last) = match (steps.first(), steps.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                return Err(anyhow::anyhow!(
                    "no plans given for ({:?}, {:?})",
                    start,
                    end
                ))
            }
        };

        if &first.0 != start || &last.1 != end {
            return Err(anyhow::anyhow!(
                "plans {:?} do not connect {:?} to {:?}",
                steps,
                start,
                end
            ));
        }

        if let Some(w) = steps.windows(2).find(|w| w[0].1 != w[1].0) {
            return Err(anyhow::anyhow!("broken chain between {:?} and {:?}", w[0], w[1]));
        }

        self.plans.insert((start.clone(), end.clone()), steps);
        Ok(())
    }

    /// The plans answering `(start, end)` in forward order
    pub fn steps(&self, start: &K, end: &K) -> anyhow::Result<&[PlanKey<K>]> {
        self.plans
            .get(&(start.clone(), end.clone()))
            .map(|v| v.as_slice())
            .ok_or_else(|| anyhow::anyhow!("({:?}, {:?}) is not among the selected plans", start, end))
    }
}

impl<K> Default for PlanSelection<K>
where
    K: Clone + Eq + Hash + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Query a transport coupling between pairs of distributions.
///
/// Both queries act column by column so that several mass vectors can
/// be transported in one call.
pub trait CouplingOps {
    type Key: Clone + Eq + Hash + Debug + Send + Sync;

    /// Image of source-side mass through the coupling
    /// * `data` - `source_dim x k`
    /// * returns `target_dim x k`
    fn push(
        &self,
        start: &Self::Key,
        end: &Self::Key,
        data: ArrayView2<f64>,
        options: &QueryOptions,
        plans: &PlanSelection<Self::Key>,
    ) -> anyhow::Result<Array2<f64>>;

    /// Pre-image of target-side mass through the coupling
    /// * `data` - `target_dim x k`
    /// * returns `source_dim x k`
    fn pull(
        &self,
        start: &Self::Key,
        end: &Self::Key,
        data: ArrayView2<f64>,
        options: &QueryOptions,
        plans: &PlanSelection<Self::Key>,
    ) -> anyhow::Result<Array2<f64>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_of_time_points() -> anyhow::Result<()> {
        let sel = PlanSelection::chain(&[0, 1, 2])?;
        assert_eq!(sel.steps(&0, &2)?, &[(0, 1), (1, 2)]);
        assert!(sel.steps(&0, &1).is_err());
        assert!(PlanSelection::chain(&[0]).is_err());
        Ok(())
    }

    #[test]
    fn broken_chain_rejected() {
        let mut sel = PlanSelection::new();
        assert!(sel.insert(&"a", &"c", vec![("a", "b"), ("x", "c")]).is_err());
        assert!(sel.insert(&"a", &"c", vec![("a", "b")]).is_err());
        assert!(sel.insert(&"a", &"c", vec![]).is_err());
        assert!(sel.insert(&"a", &"c", vec![("a", "b"), ("b", "c")]).is_ok());
    }
}
