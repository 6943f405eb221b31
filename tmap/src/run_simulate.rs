use crate::common::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;

#[derive(Args, Debug, Clone)]
pub struct SimArgs {
    /// number of cells at each time point (comma-separated, at least two)
    #[arg(long, short = 'n', value_delimiter(','), required = true)]
    n_cells: Vec<usize>,

    /// log-normal σ of per-cell growth; 0 keeps every plan balanced
    #[arg(long, default_value_t = 0.0)]
    growth_sigma: f64,

    /// random seed
    #[arg(long, default_value_t = 42)]
    rseed: u64,

    /// Output header
    #[arg(long, short, required = true)]
    out: Box<str>,
}

/// Random plans between consecutive time points. Each plan carries
/// unit mass over uniform source cells before growth is applied.
pub fn simulate_plans(args: &SimArgs) -> anyhow::Result<Vec<Array2<f64>>> {
    if args.n_cells.len() < 2 {
        return Err(anyhow::anyhow!("need at least two time points"));
    }
    if args.n_cells.iter().any(|&n| n == 0) {
        return Err(anyhow::anyhow!("every time point needs cells"));
    }

    let mut rng = SmallRng::seed_from_u64(args.rseed);
    let mut plans = vec![];

    for w in args.n_cells.windows(2) {
        let (m, n) = (w[0], w[1]);
        let mut plan = Array2::<f64>::runif_with(m, n, &mut rng);

        // each source cell sends 1/m
        for mut row in plan.rows_mut() {
            let tot = row.sum();
            row.mapv_inplace(|x| x / tot / m as f64);
        }

        if args.growth_sigma > 0.0 {
            let growth = Array2::<f64>::rlognormal_with(m, 1, (0.0, args.growth_sigma), &mut rng)?;
            plan *= &growth;
        }

        plans.push(plan);
    }
    Ok(plans)
}

pub fn run_simulate(args: &SimArgs) -> anyhow::Result<()> {
    let plans = simulate_plans(args)?;
    mkdir(&args.out)?;

    for (t, plan) in plans.iter().enumerate() {
        let plan_file = format!("{}.plan_{}.tsv.gz", args.out, t);
        plan.to_tsv(&plan_file)?;
        info!(
            "wrote {} x {} plan {} -> {}: {}",
            plan.nrows(),
            plan.ncols(),
            t,
            t + 1,
            plan_file
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sim_args(n_cells: Vec<usize>, growth_sigma: f64) -> SimArgs {
        SimArgs {
            n_cells,
            growth_sigma,
            rseed: 1,
            out: "unused".into(),
        }
    }

    #[test]
    fn balanced_plans_have_uniform_rows() -> anyhow::Result<()> {
        let plans = simulate_plans(&sim_args(vec![4, 6, 3], 0.0))?;
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].dim(), (4, 6));
        assert_eq!(plans[1].dim(), (6, 3));
        for row_sum in plans[0].sum_axis(Axis(1)).iter() {
            assert_abs_diff_eq!(*row_sum, 0.25, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(plans[1].sum(), 1.0, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn growth_changes_row_mass() -> anyhow::Result<()> {
        let plans = simulate_plans(&sim_args(vec![50, 10], 1.0))?;
        let row_sums = plans[0].sum_axis(Axis(1));
        assert!(row_sums.iter().any(|&x| (x - 0.02).abs() > 1e-6));
        assert!(simulate_plans(&sim_args(vec![5], 0.0)).is_err());
        assert!(simulate_plans(&sim_args(vec![5, 0], 0.0)).is_err());
        Ok(())
    }
}
