use crate::coupling::*;
use matrix_util::traits::{MassOps, ShapeOps};
use ndarray::prelude::*;

fn indicator(dim: usize, cells: &[usize]) -> anyhow::Result<Array2<f64>> {
    if cells.is_empty() {
        return Err(anyhow::anyhow!("no cells selected"));
    }
    let mut ret = Array2::<f64>::zeros((dim, 1));
    for &i in cells {
        if i >= dim {
            return Err(anyhow::anyhow!("cell {} out of range (n = {})", i, dim));
        }
        ret[(i, 0)] = 1.0;
    }
    Ok(ret)
}

/// Where the source `cells` go: distribution over `end` cells
pub fn descendants<C>(
    coupling: &C,
    start: &C::Key,
    end: &C::Key,
    (source_dim, target_dim): (usize, usize),
    cells: &[usize],
) -> anyhow::Result<Array1<f64>>
where
    C: CouplingOps + ?Sized,
{
    let data = indicator(source_dim, cells)?;
    Ok(coupling
        .push(
            start,
            end,
            data.view(),
            &QueryOptions::default(),
            &PlanSelection::single(start, end),
        )?
        .squeeze_to_vector(target_dim)?
        .normalize_mass())
}

/// Where the target `cells` come from: distribution over `start` cells
pub fn ancestors<C>(
    coupling: &C,
    start: &C::Key,
    end: &C::Key,
    (source_dim, target_dim): (usize, usize),
    cells: &[usize],
) -> anyhow::Result<Array1<f64>>
where
    C: CouplingOps + ?Sized,
{
    let data = indicator(target_dim, cells)?;
    Ok(coupling
        .pull(
            start,
            end,
            data.view(),
            &QueryOptions::default(),
            &PlanSelection::single(start, end),
        )?
        .squeeze_to_vector(source_dim)?
        .normalize_mass())
}

/// Outgoing mass of each source cell relative to a uniform source
/// marginal `1/source_dim`. Values above one mark cells expanding
/// between `start` and `end`, values below one cells shrinking.
pub fn growth_rates<C>(
    coupling: &C,
    start: &C::Key,
    end: &C::Key,
    (source_dim, target_dim): (usize, usize),
) -> anyhow::Result<Array1<f64>>
where
    C: CouplingOps + ?Sized,
{
    let ones = Array2::<f64>::ones((target_dim, 1));
    let raw = QueryOptions {
        normalize: false,
        scale_by_marginals: false,
    };
    let row_sums = coupling
        .pull(
            start,
            end,
            ones.view(),
            &raw,
            &PlanSelection::single(start, end),
        )?
        .squeeze_to_vector(source_dim)?;
    Ok(row_sums * source_dim as f64)
}
