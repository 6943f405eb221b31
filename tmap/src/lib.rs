//! Sampling and trajectory queries over transport maps between
//! pairs of cell populations (time points or conditions).
//!
//! The coupling itself comes from an external optimal transport
//! solver and is only seen through [`coupling::CouplingOps`].

pub mod coupling;
pub mod dense_coupling;
pub mod sampler;
pub mod trajectory;

pub use coupling::{CouplingOps, PlanKey, PlanSelection, QueryOptions};
pub use dense_coupling::DenseCouplingStore;
pub use sampler::{SamplerConfig, TmapSample, TmapSampleOps};
