pub use ndarray::prelude::*;
pub use rand::Rng;
pub use rand_distr::LogNormal;
pub use rayon::prelude::*;

use crate::traits::*;
use num_traits::Float;

fn total<'a, T, I>(xx: I) -> T
where
    T: Float + 'a,
    I: IntoIterator<Item = &'a T>,
{
    xx.into_iter().fold(T::zero(), |acc, &x| acc + x)
}

fn has_mass<T: Float>(tot: T) -> bool {
    tot > T::zero() && tot.is_finite()
}

impl<T> MassOps for Array1<T>
where
    T: Float,
{
    type Mat = Self;
    type Scalar = T;

    fn normalize_mass_inplace(&mut self) {
        let tot = total(self.iter());
        if has_mass(tot) {
            self.mapv_inplace(|x| x / tot);
        }
    }

    fn normalize_mass(&self) -> Self::Mat {
        let mut ret = self.clone();
        ret.normalize_mass_inplace();
        ret
    }

    fn column_mass(&self) -> Vec<Self::Scalar> {
        vec![total(self.iter())]
    }
}

impl<T> MassOps for Array2<T>
where
    T: Float,
{
    type Mat = Self;
    type Scalar = T;

    fn normalize_mass_inplace(&mut self) {
        for mut x_j in self.columns_mut() {
            let tot = total(x_j.iter());
            if has_mass(tot) {
                x_j.mapv_inplace(|x| x / tot);
            }
        }
    }

    fn normalize_mass(&self) -> Self::Mat {
        let mut ret = self.clone();
        ret.normalize_mass_inplace();
        ret
    }

    fn column_mass(&self) -> Vec<Self::Scalar> {
        self.columns().into_iter().map(|x_j| total(x_j.iter())).collect()
    }
}

impl<T> ShapeOps for Array2<T>
where
    T: Clone,
{
    type Vec = Array1<T>;

    fn squeeze_to_vector(self, len: usize) -> anyhow::Result<Self::Vec> {
        match self.dim() {
            (nrow, 1) if nrow == len => Ok(self.index_axis_move(Axis(1), 0)),
            (1, ncol) if ncol == len => Ok(self.index_axis_move(Axis(0), 0)),
            (nrow, ncol) => Err(anyhow::anyhow!(
                "expected a vector of length {}, but found a {} x {} matrix",
                len,
                nrow,
                ncol
            )),
        }
    }

    fn ensure_dim(&self, nrow: usize, ncol: usize) -> anyhow::Result<()> {
        if self.dim() != (nrow, ncol) {
            return Err(anyhow::anyhow!(
                "expected a {} x {} matrix, but found {} x {}",
                nrow,
                ncol,
                self.nrows(),
                self.ncols()
            ));
        }
        Ok(())
    }
}

impl SampleOps for Array2<f64> {
    type Mat = Self;
    type Scalar = f64;

    fn runif(dd: usize, nn: usize) -> Self::Mat {
        let mut ret = Array2::zeros((dd, nn));
        ret.par_map_inplace(|x| *x = rand::rng().random::<f64>());
        ret
    }

    fn runif_with<R: Rng>(dd: usize, nn: usize, rng: &mut R) -> Self::Mat {
        Array2::from_shape_simple_fn((dd, nn), || rng.random::<f64>())
    }

    fn rlognormal_with<R: Rng>(
        dd: usize,
        nn: usize,
        param: (f64, f64),
        rng: &mut R,
    ) -> anyhow::Result<Self::Mat> {
        let (mu, sigma) = param;
        anyhow::ensure!(
            mu.is_finite() && sigma.is_finite() && sigma >= 0.0,
            "log-normal needs finite mu and sigma >= 0, got ({}, {})",
            mu,
            sigma
        );
        let dist = LogNormal::new(mu, sigma)?;
        Ok(Array2::from_shape_simple_fn((dd, nn), || rng.sample(dist)))
    }
}
