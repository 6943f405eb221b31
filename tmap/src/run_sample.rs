use crate::common::*;
use matrix_util::common_io::open_buf_writer;
use serde::Serialize;
use std::io::Write;

#[derive(Args, Debug, Clone)]
pub struct SampleArgs {
    /// Plan files between consecutive time points `0 -> 1 -> ...`,
    /// dense `source x target` matrices (`.tsv`, `.csv`, optionally `.gz`)
    #[arg(required = true)]
    plan_files: Vec<Box<str>>,

    /// number of source draws
    #[arg(long, short = 'n', default_value_t = 1000)]
    n_samples: usize,

    /// sampler configuration in JSON; the options below override it
    #[arg(long)]
    config: Option<Box<str>>,

    /// maximum number of distinct source cells per batch
    #[arg(long, short = 'b')]
    batch_size: Option<usize>,

    /// random seed
    #[arg(long)]
    rseed: Option<u64>,

    /// correct for unbalanced growth (needs `--interpolation-parameter`)
    #[arg(long, default_value_t = false)]
    unbalanced: bool,

    /// fraction of the interval in [0, 1] attributed to growth
    #[arg(long, short = 't')]
    interpolation_parameter: Option<f64>,

    /// do not rescale query mass to one
    #[arg(long, default_value_t = false)]
    no_normalize: bool,

    /// divide query mass by the plan marginals
    #[arg(long, default_value_t = false)]
    scale_by_marginals: bool,

    /// show a progress bar
    #[arg(long, default_value_t = false)]
    progress: bool,

    /// Output header
    #[arg(long, short, required = true)]
    out: Box<str>,
}

#[derive(Serialize, Debug)]
struct SampleSummary<'a> {
    plan_files: &'a [Box<str>],
    start: usize,
    end: usize,
    source_dim: usize,
    target_dim: usize,
    n_samples: usize,
    n_distinct_sources: usize,
    config: &'a SamplerConfig,
}

/// Start from `--config` (or defaults) and apply the flags given
pub fn sampler_config(args: &SampleArgs) -> anyhow::Result<SamplerConfig> {
    let mut config = match args.config.as_deref() {
        Some(file) => SamplerConfig::from_json(file)?,
        None => SamplerConfig::default(),
    };

    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(rseed) = args.rseed {
        config.seed = rseed;
    }
    if args.unbalanced {
        config.account_for_unbalancedness = true;
    }
    if args.interpolation_parameter.is_some() {
        config.interpolation_parameter = args.interpolation_parameter;
    }
    if args.no_normalize {
        config.query.normalize = false;
    }
    if args.scale_by_marginals {
        config.query.scale_by_marginals = true;
    }
    if args.progress {
        config.show_progress = true;
    }
    Ok(config)
}

pub fn run_sample(args: &SampleArgs) -> anyhow::Result<()> {
    let config = sampler_config(args)?;
    // fail on a bad configuration before reading any plan
    config.validate()?;

    let mut plans = read_time_series_plans(&args.plan_files)?;
    let (start, end, (source_dim, target_dim)) = plans.first_to_last()?;

    info!(
        "sampling {} cells from time point {} to {}",
        args.n_samples, start, end
    );

    let sample = plans.store.sample_from_tmap(
        &start,
        &end,
        args.n_samples,
        source_dim,
        target_dim,
        &config,
    )?;

    mkdir(&args.out)?;

    let pairs_file = format!("{}.pairs.tsv.gz", args.out);
    let mut lines = vec!["source\ttarget".to_string().into_boxed_str()];
    lines.extend(
        sample
            .pairs()
            .into_iter()
            .map(|(r, c)| format!("{}\t{}", r, c).into_boxed_str()),
    );
    write_lines(&lines, &pairs_file)?;
    info!("wrote {} pairs: {}", sample.n_samples(), pairs_file);

    let summary = SampleSummary {
        plan_files: &args.plan_files,
        start,
        end,
        source_dim,
        target_dim,
        n_samples: sample.n_samples(),
        n_distinct_sources: sample.rows.len(),
        config: &config,
    };
    let summary_file = format!("{}.summary.json", args.out);
    let mut writer = open_buf_writer(&summary_file)?;
    serde_json::to_writer_pretty(&mut writer, &summary)?;
    writer.flush()?;
    info!("wrote {}", summary_file);

    Ok(())
}
