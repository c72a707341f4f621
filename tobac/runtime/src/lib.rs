#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use tobac_core as core;
pub use tobac_directory as directory;

mod admission;
mod args;
mod metrics;
mod resolve;

pub use self::{
    admission::Admission,
    args::Args,
    metrics::AdmissionMetrics,
    resolve::{ClusterResolver, ResolveExisting},
};
