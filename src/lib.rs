pub mod error;
pub mod config;
pub mod candidate;
pub mod optimizer;
pub mod ibg;
pub mod worker;
pub mod profiler;
pub mod wfa;
pub mod session;

pub use crate::{candidate::{CandidatePool, Configuration, Index, IndexDescriptor, IndexId, IndexKind, Snapshot}, config::AdvisorConfig, error::{AdvisorError, AdvisorResult, OracleError}, profiler::{ProfiledQuery, Profiler}, session::TuningSession, wfa::WorkFunctionAlgorithm};
