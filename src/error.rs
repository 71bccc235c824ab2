use std::{error::Error, fmt::Display};

use crate::{candidate::IndexId, optimizer::StatementCategory};

pub type AdvisorResult<T> = Result<T, AdvisorError>;

#[derive(Debug)]
pub enum OracleError {
    Io(std::io::Error),
    Execution(String),
}

impl From<std::io::Error> for OracleError {
    fn from(io_error: std::io::Error) -> Self {
        OracleError::Io(io_error)
    }
}

impl Display for OracleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OracleError::Io(e) => write!(f, "what-if call failed with I/O error: {}", e),
            OracleError::Execution(msg) => write!(f, "what-if call failed: {}", msg),
        }
    }
}

impl Error for OracleError {}

#[derive(Debug)]
pub enum AdvisorError {
    Oracle(OracleError),
    // A node of the benefit graph breaks its invariants. Always a constructor bug.
    InconsistentGraph(String),
    CapacityExceeded { what: &'static str, limit: usize },
    ConcurrentAccessViolation(String),
    WorkerTerminated(String),
    UnsupportedStatement(StatementCategory),
    UnknownIndex(IndexId),
    InvalidConfig(String),
}

impl From<OracleError> for AdvisorError {
    fn from(oracle_error: OracleError) -> Self {
        AdvisorError::Oracle(oracle_error)
    }
}

impl From<std::io::Error> for AdvisorError {
    fn from(io_error: std::io::Error) -> Self {
        AdvisorError::Oracle(OracleError::Io(io_error))
    }
}

impl Display for AdvisorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdvisorError::Oracle(e) => write!(f, "{}", e),
            AdvisorError::InconsistentGraph(msg) => write!(f, "inconsistent index benefit graph: {}", msg),
            AdvisorError::CapacityExceeded { what, limit } => write!(f, "{} exceeds its capacity of {}", what, limit),
            AdvisorError::ConcurrentAccessViolation(msg) => write!(f, "concurrent access violation: {}", msg),
            AdvisorError::WorkerTerminated(name) => write!(f, "worker '{}' terminated unexpectedly", name),
            AdvisorError::UnsupportedStatement(category) => write!(f, "statements of category {:?} are not profiled", category),
            AdvisorError::UnknownIndex(id) => write!(f, "index {} is not part of the candidate pool", id),
            AdvisorError::InvalidConfig(msg) => write!(f, "invalid advisor configuration: {}", msg),
        }
    }
}

impl Error for AdvisorError {}
