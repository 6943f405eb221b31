use crate::common_io::Delimiter;
use rand::Rng;

/// Treat non-negative arrays as (unnormalized) probability mass
pub trait MassOps {
    type Mat;
    type Scalar;

    /// Rescale to unit mass: a vector as a whole, a matrix column by
    /// column. Vectors/columns without positive finite mass are left
    /// unchanged.
    fn normalize_mass_inplace(&mut self);

    fn normalize_mass(&self) -> Self::Mat;

    /// Total mass, a vector as a whole, a matrix column by column
    fn column_mass(&self) -> Vec<Self::Scalar>;
}

/// Coerce the output of a query into the shape we expect
pub trait ShapeOps {
    type Vec;

    /// Collapse a `(len, 1)` or `(1, len)` matrix into a vector of
    /// length `len`; anything else is an error.
    fn squeeze_to_vector(self, len: usize) -> anyhow::Result<Self::Vec>;

    /// Fail unless the shape is exactly `(nrow, ncol)`
    fn ensure_dim(&self, nrow: usize, ncol: usize) -> anyhow::Result<()>;
}

/// Operations to sample random matrices
pub trait SampleOps {
    type Mat;
    type Scalar;

    /// Sample a matrix from a uniform distribution `U(0,1)`
    fn runif(dd: usize, nn: usize) -> Self::Mat;

    /// Sample a matrix from `U(0,1)` with a given random source
    fn runif_with<R: Rng>(dd: usize, nn: usize, rng: &mut R) -> Self::Mat;

    /// Sample a matrix from a log-normal distribution with `param`
    /// `(μ, σ)` of the underlying normal
    fn rlognormal_with<R: Rng>(
        dd: usize,
        nn: usize,
        param: (f64, f64),
        rng: &mut R,
    ) -> anyhow::Result<Self::Mat>;
}

/// Read and write matrices from and to files
pub trait IoOps {
    type Scalar;
    type Mat;

    fn read_file_delim(file: &str, delim: impl Into<Delimiter>) -> anyhow::Result<Self::Mat>;

    /// Pick the delimiter by extension (`.csv` or else tab/space)
    fn read_file(file: &str) -> anyhow::Result<Self::Mat> {
        Self::read_file_delim(file, Delimiter::from_file_name(file))
    }

    fn write_file_delim(&self, file: &str, delim: &str) -> anyhow::Result<()>;

    fn to_tsv(&self, tsv_file: &str) -> anyhow::Result<()> {
        self.write_file_delim(tsv_file, "\t")
    }

    fn to_csv(&self, csv_file: &str) -> anyhow::Result<()> {
        self.write_file_delim(csv_file, ",")
    }
}
