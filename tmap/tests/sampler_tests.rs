use matrix_util::traits::SampleOps;
use ndarray::prelude::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tmap::*;

fn random_store(m: usize, n: usize, seed: u64) -> anyhow::Result<DenseCouplingStore<&'static str>> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let plan = Array2::<f64>::runif_with(m, n, &mut rng);
    let mut store = DenseCouplingStore::new();
    store.insert(&"t0", &"t1", plan)?;
    Ok(store)
}

/// Every query returns uniform mass, whatever it is asked
struct UniformCoupling {
    source_dim: usize,
    target_dim: usize,
}

impl CouplingOps for UniformCoupling {
    type Key = usize;

    fn push(
        &self,
        _start: &usize,
        _end: &usize,
        data: ArrayView2<f64>,
        _options: &QueryOptions,
        _plans: &PlanSelection<usize>,
    ) -> anyhow::Result<Array2<f64>> {
        let k = data.ncols();
        Ok(Array2::from_elem((self.target_dim, k), 1.0 / self.target_dim as f64))
    }

    fn pull(
        &self,
        _start: &usize,
        _end: &usize,
        data: ArrayView2<f64>,
        _options: &QueryOptions,
        _plans: &PlanSelection<usize>,
    ) -> anyhow::Result<Array2<f64>> {
        let k = data.ncols();
        Ok(Array2::from_elem((self.source_dim, k), 1.0 / self.source_dim as f64))
    }
}

/// Counts calls and records the flags it was given
struct RecordingCoupling<C> {
    inner: C,
    calls: AtomicUsize,
    options: Mutex<Vec<QueryOptions>>,
}

impl<C> RecordingCoupling<C> {
    fn new(inner: C) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            options: Mutex::new(vec![]),
        }
    }

    fn record(&self, options: &QueryOptions) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.options.lock().unwrap().push(*options);
    }
}

impl<C: CouplingOps> CouplingOps for RecordingCoupling<C> {
    type Key = C::Key;

    fn push(
        &self,
        start: &Self::Key,
        end: &Self::Key,
        data: ArrayView2<f64>,
        options: &QueryOptions,
        plans: &PlanSelection<Self::Key>,
    ) -> anyhow::Result<Array2<f64>> {
        self.record(options);
        self.inner.push(start, end, data, options, plans)
    }

    fn pull(
        &self,
        start: &Self::Key,
        end: &Self::Key,
        data: ArrayView2<f64>,
        options: &QueryOptions,
        plans: &PlanSelection<Self::Key>,
    ) -> anyhow::Result<Array2<f64>> {
        self.record(options);
        self.inner.pull(start, end, data, options, plans)
    }
}

/// Returns one column too many from `push`
struct WrongShapeCoupling;

impl CouplingOps for WrongShapeCoupling {
    type Key = usize;

    fn push(
        &self,
        _start: &usize,
        _end: &usize,
        data: ArrayView2<f64>,
        _options: &QueryOptions,
        _plans: &PlanSelection<usize>,
    ) -> anyhow::Result<Array2<f64>> {
        Ok(Array2::ones((3, data.ncols() + 1)))
    }

    fn pull(
        &self,
        _start: &usize,
        _end: &usize,
        data: ArrayView2<f64>,
        _options: &QueryOptions,
        _plans: &PlanSelection<usize>,
    ) -> anyhow::Result<Array2<f64>> {
        Ok(Array2::ones((3, data.ncols())))
    }
}

#[test]
fn counts_and_ranges() -> anyhow::Result<()> {
    let (m, n) = (40, 25);
    let store = random_store(m, n, 1)?;

    for &n_samples in &[1, 17, 2000] {
        let sample = store.sample_from_tmap(
            &"t0",
            &"t1",
            n_samples,
            m,
            n,
            &SamplerConfig::default().with_batch_size(8),
        )?;

        assert_eq!(sample.rows.len(), sample.cols.len());
        assert_eq!(sample.n_samples(), n_samples);
        assert!(sample.rows.windows(2).all(|w| w[0] < w[1]));
        assert!(sample.rows.iter().all(|&r| r < m));
        assert!(sample.cols.iter().flatten().all(|&c| c < n));
        assert!(sample.cols.iter().all(|c| !c.is_empty()));
    }
    Ok(())
}

#[test]
fn unbalanced_without_interpolation_parameter_fails_early() -> anyhow::Result<()> {
    let coupling = RecordingCoupling::new(random_store(5, 4, 2)?);
    let config = SamplerConfig {
        account_for_unbalancedness: true,
        interpolation_parameter: None,
        ..Default::default()
    };

    let err = coupling
        .sample_from_tmap(&"t0", &"t1", 100, 5, 4, &config)
        .unwrap_err();

    assert!(err.to_string().contains("interpolation_parameter"));
    assert_eq!(coupling.calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[test]
fn identity_coupling_maps_rows_to_themselves() -> anyhow::Result<()> {
    let k = 6;
    let mut store = DenseCouplingStore::new();
    store.insert(&0, &1, Array2::<f64>::eye(k))?;

    for config in [
        SamplerConfig::default(),
        SamplerConfig::default().unbalanced(0.5).with_batch_size(2),
    ] {
        let sample = store.sample_from_tmap(&0, &1, 1000, k, k, &config)?;
        assert_eq!(sample.n_samples(), 1000);
        for (r, cols) in sample.rows.iter().zip(sample.cols.iter()) {
            assert!(cols.iter().all(|c| c == r));
        }
    }
    Ok(())
}

#[test]
fn uniform_coupling_gives_uniform_rows() -> anyhow::Result<()> {
    let (m, n) = (5, 3);
    let coupling = UniformCoupling {
        source_dim: m,
        target_dim: n,
    };
    let n_samples = 50_000;

    let sample = coupling.sample_from_tmap(&0, &1, n_samples, m, n, &SamplerConfig::default())?;

    let freq = sample.empirical_coupling(m, n)?;
    for row_freq in freq.sum_axis(Axis(1)).iter() {
        assert!((row_freq - 1.0 / m as f64).abs() < 0.01, "{}", row_freq);
    }
    for col_freq in freq.sum_axis(Axis(0)).iter() {
        assert!((col_freq - 1.0 / n as f64).abs() < 0.01, "{}", col_freq);
    }
    Ok(())
}

#[test]
fn batch_size_does_not_change_the_sample() -> anyhow::Result<()> {
    let (m, n) = (30, 20);
    let store = random_store(m, n, 3)?;

    let run = |batch_size: usize, config: SamplerConfig| {
        store.sample_from_tmap(&"t0", &"t1", 3000, m, n, &config.with_batch_size(batch_size))
    };

    for config in [
        SamplerConfig::default(),
        SamplerConfig::default().unbalanced(0.3),
    ] {
        let one = run(1, config.clone())?;
        let some = run(7, config.clone())?;
        let all = run(m, config.clone())?;
        assert_eq!(one, some);
        assert_eq!(one, all);
    }
    Ok(())
}

#[test]
fn seeded_runs_are_reproducible() -> anyhow::Result<()> {
    let store = random_store(12, 9, 4)?;
    let config = SamplerConfig::default().with_seed(2024);

    let a = store.sample_from_tmap(&"t0", &"t1", 500, 12, 9, &config)?;
    let b = store.sample_from_tmap(&"t0", &"t1", 500, 12, 9, &config)?;
    assert_eq!(a, b);
    Ok(())
}

#[test]
fn query_flags_are_passed_through() -> anyhow::Result<()> {
    let coupling = RecordingCoupling::new(random_store(10, 8, 5)?);
    let query = QueryOptions {
        normalize: false,
        scale_by_marginals: true,
    };
    let config = SamplerConfig::default()
        .with_query(query)
        .with_batch_size(3)
        .unbalanced(0.5);

    coupling.sample_from_tmap(&"t0", &"t1", 200, 10, 8, &config)?;

    let options = coupling.options.lock().unwrap();
    // column sums, row marginal, then at least one batch
    assert!(options.len() >= 3);
    assert!(options.iter().all(|o| *o == query));
    Ok(())
}

#[test]
fn growth_correction_favours_slow_growing_targets() -> anyhow::Result<()> {
    // row 0 sends everything to target 0, row 1 splits over targets 1
    // and 2, so target 0 collects twice the mass of the others
    let plan = array![[0.5, 0.0, 0.0], [0.0, 0.25, 0.25]];
    let mut store = DenseCouplingStore::new();
    store.insert(&0, &1, plan)?;

    let n_samples = 20_000;
    let fraction_of_row_1 = |sample: &TmapSample| {
        let freq = sample.empirical_coupling(2, 3).unwrap();
        freq.row(1).sum()
    };

    let balanced = store.sample_from_tmap(&0, &1, n_samples, 2, 3, &SamplerConfig::default())?;
    assert!((fraction_of_row_1(&balanced) - 0.5).abs() < 0.02);

    let corrected = store.sample_from_tmap(
        &0,
        &1,
        n_samples,
        2,
        3,
        &SamplerConfig::default().unbalanced(0.0),
    )?;
    assert!((fraction_of_row_1(&corrected) - 2.0 / 3.0).abs() < 0.02);

    for sample in [&balanced, &corrected] {
        for (&r, cols) in sample.rows.iter().zip(sample.cols.iter()) {
            if r == 0 {
                assert!(cols.iter().all(|&c| c == 0));
            } else {
                assert!(cols.iter().all(|&c| c == 1 || c == 2));
            }
        }
    }

    // attributing all growth to the interval undoes the correction
    let undone = store.sample_from_tmap(
        &0,
        &1,
        n_samples,
        2,
        3,
        &SamplerConfig::default().unbalanced(1.0),
    )?;
    assert_eq!(undone, balanced);
    Ok(())
}

#[test]
fn growth_correction_reweights_targets_within_a_row() -> anyhow::Result<()> {
    // row 0 splits evenly over targets with column sums 0.25 and 0.75;
    // dividing its conditional by them gives 1/0.25 : 1/0.75 = 3 : 1
    let plan = array![[0.25, 0.25], [0.0, 0.5]];
    let mut store = DenseCouplingStore::new();
    store.insert(&0, &1, plan)?;

    let n_samples = 20_000;
    let target_0_given_row_0 = |sample: &TmapSample| {
        let freq = sample.empirical_coupling(2, 2).unwrap();
        freq[(0, 0)] / freq.row(0).sum()
    };

    let balanced = store.sample_from_tmap(&0, &1, n_samples, 2, 2, &SamplerConfig::default())?;
    assert!((target_0_given_row_0(&balanced) - 0.5).abs() < 0.02);

    let corrected = store.sample_from_tmap(
        &0,
        &1,
        n_samples,
        2,
        2,
        &SamplerConfig::default().unbalanced(0.5),
    )?;
    assert!((target_0_given_row_0(&corrected) - 0.75).abs() < 0.02);

    // row 1 still only reaches target 1
    for (&r, cols) in corrected.rows.iter().zip(corrected.cols.iter()) {
        if r == 1 {
            assert!(cols.iter().all(|&c| c == 1));
        }
    }
    Ok(())
}

#[test]
fn degenerate_and_malformed_couplings_are_errors() -> anyhow::Result<()> {
    let mut store = DenseCouplingStore::new();
    store.insert(&0, &1, Array2::<f64>::zeros((3, 3)))?;
    let err = store
        .sample_from_tmap(&0, &1, 10, 3, 3, &SamplerConfig::default())
        .unwrap_err();
    assert!(err.to_string().contains("source rows"));

    // unknown pair surfaces from the coupling unchanged
    let err = store
        .sample_from_tmap(&1, &2, 10, 3, 3, &SamplerConfig::default())
        .unwrap_err();
    assert!(err.to_string().contains("no plan stored"));

    // dimensions that do not match the stored plan
    assert!(store
        .sample_from_tmap(&0, &1, 10, 4, 3, &SamplerConfig::default())
        .is_err());

    let err = WrongShapeCoupling
        .sample_from_tmap(&0, &1, 10, 3, 3, &SamplerConfig::default())
        .unwrap_err();
    assert!(err.to_string().contains("expected"));

    assert!(store
        .sample_from_tmap(&0, &1, 0, 3, 3, &SamplerConfig::default())
        .is_err());
    assert!(store
        .sample_from_tmap(&0, &1, 10, 3, 3, &SamplerConfig::default().with_batch_size(0))
        .is_err());
    Ok(())
}

#[test]
fn config_from_json_fills_defaults() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let file = dir.path().join("sampler.json");
    std::fs::write(
        &file,
        r#"{ "batch_size": 16, "account_for_unbalancedness": true,
             "interpolation_parameter": 0.4, "query": { "scale_by_marginals": true } }"#,
    )?;

    let config = SamplerConfig::from_json(file.to_str().unwrap())?;
    assert_eq!(config.batch_size, 16);
    assert_eq!(config.seed, 42);
    assert!(config.query.normalize);
    assert!(config.query.scale_by_marginals);
    approx::assert_abs_diff_eq!(config.unbalanced_exponent()?.unwrap(), 0.6, epsilon = 1e-12);
    Ok(())
}
