use crate::common::*;
use tmap::trajectory::{ancestors, descendants, growth_rates};

#[derive(Args, Debug, Clone)]
pub struct GrowthArgs {
    /// Plan file (dense `source x target` matrix)
    plan_file: Box<str>,

    /// Output header
    #[arg(long, short, required = true)]
    out: Box<str>,
}

#[derive(ValueEnum, Clone, Debug, PartialEq)]
pub enum Direction {
    Forward,
    Backward,
}

#[derive(Args, Debug, Clone)]
pub struct FateArgs {
    /// Plan files between consecutive time points `0 -> 1 -> ...`
    #[arg(required = true)]
    plan_files: Vec<Box<str>>,

    /// cell indexes (comma-separated): source cells for `forward`,
    /// target cells for `backward`
    #[arg(long, short, value_delimiter(','), required = true)]
    cells: Vec<usize>,

    /// forward gives descendants, backward gives ancestors
    #[arg(long, value_enum, default_value = "forward")]
    direction: Direction,

    /// Output header
    #[arg(long, short, required = true)]
    out: Box<str>,
}

pub fn run_growth(args: &GrowthArgs) -> anyhow::Result<()> {
    let mut plans = read_time_series_plans(std::slice::from_ref(&args.plan_file))?;
    let (start, end, dims) = plans.first_to_last()?;

    let growth = growth_rates(&plans.store, &start, &end, dims)?;

    let growth_file = format!("{}.growth.tsv.gz", args.out);
    mkdir(&growth_file)?;
    write_lines(&growth.to_vec(), &growth_file)?;
    info!("wrote {} growth rates: {}", growth.len(), growth_file);
    Ok(())
}

pub fn run_fate(args: &FateArgs) -> anyhow::Result<()> {
    let mut plans = read_time_series_plans(&args.plan_files)?;
    let (start, end, dims) = plans.first_to_last()?;

    let (prob, suffix) = match args.direction {
        Direction::Forward => (
            descendants(&plans.store, &start, &end, dims, &args.cells)?,
            "descendants",
        ),
        Direction::Backward => (
            ancestors(&plans.store, &start, &end, dims, &args.cells)?,
            "ancestors",
        ),
    };

    let fate_file = format!("{}.{}.tsv.gz", args.out, suffix);
    mkdir(&fate_file)?;
    write_lines(&prob.to_vec(), &fate_file)?;
    info!("wrote {} {}: {}", prob.len(), suffix, fate_file);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run_simulate::{run_simulate, SimArgs};
    use approx::assert_abs_diff_eq;
    use matrix_util::common_io::read_lines_of_words_delim;

    #[derive(Parser)]
    struct TestGrowthCli {
        #[command(flatten)]
        args: GrowthArgs,
    }

    #[derive(Parser)]
    struct TestFateCli {
        #[command(flatten)]
        args: FateArgs,
    }

    #[derive(Parser)]
    struct TestSimCli {
        #[command(flatten)]
        args: SimArgs,
    }

    fn read_vector(file: &str) -> anyhow::Result<Array1<f64>> {
        let words = read_lines_of_words_delim(file, "\t")?;
        let values = words
            .iter()
            .map(|w| w[0].parse::<f64>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Array1::from_vec(values))
    }

    #[test]
    fn growth_of_simulated_balanced_plan_is_one() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("sim");
        let out = out.to_str().unwrap();

        let sim = TestSimCli::try_parse_from(["tmap", "-n", "7,4", "--out", out])?;
        run_simulate(&sim.args)?;

        let plan_0 = format!("{}.plan_0.tsv.gz", out);
        let growth_out = format!("{}_growth", out);
        let cli = TestGrowthCli::try_parse_from([
            "tmap",
            plan_0.as_str(),
            "--out",
            growth_out.as_str(),
        ])?;
        run_growth(&cli.args)?;

        let growth = read_vector(&format!("{}.growth.tsv.gz", growth_out))?;
        assert_eq!(growth.len(), 7);
        assert_abs_diff_eq!(growth, Array1::<f64>::ones(7), epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn fate_forward_and_backward() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let plan_file = dir.path().join("plan.tsv");
        let plan_file = plan_file.to_str().unwrap();
        array![[0.2, 0.1, 0.0], [0.0, 0.3, 0.4]].to_tsv(plan_file)?;

        let out = dir.path().join("fate");
        let out = out.to_str().unwrap();

        let cli = TestFateCli::try_parse_from(["tmap", plan_file, "--cells", "1", "--out", out])?;
        assert_eq!(cli.args.direction, Direction::Forward);
        run_fate(&cli.args)?;
        let desc = read_vector(&format!("{}.descendants.tsv.gz", out))?;
        assert_abs_diff_eq!(desc, array![0.0, 3.0 / 7.0, 4.0 / 7.0], epsilon = 1e-12);

        // target 0 is only reached from source 0
        let cli = TestFateCli::try_parse_from([
            "tmap",
            plan_file,
            "-c",
            "0",
            "--direction",
            "backward",
            "--out",
            out,
        ])?;
        run_fate(&cli.args)?;
        let anc = read_vector(&format!("{}.ancestors.tsv.gz", out))?;
        assert_abs_diff_eq!(anc, array![1.0, 0.0], epsilon = 1e-12);

        let cli = TestFateCli::try_parse_from(["tmap", plan_file, "--cells", "5", "--out", out])?;
        assert!(run_fate(&cli.args).is_err());
        Ok(())
    }
}
