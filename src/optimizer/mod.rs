/*
    The advisor never looks at SQL itself. Everything it knows about a statement comes from an
    optimizer that can answer "what if" questions: how expensive would this statement be if
    exactly this configuration of candidate indexes existed, and which of those indexes would
    its plan actually use. Those calls are expensive (a full optimization pass each), which is
    why the index benefit graph works so hard to avoid them.
 */
pub mod synthetic;

use std::sync::Arc;

use ahash::AHashMap;

use crate::{candidate::{Configuration, IndexId, Snapshot}, error::OracleError};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StatementCategory {
    Query,
    Modification,
    SchemaChange,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhatIfResult {
    pub cost: f64,
    // The part of the configuration the chosen plan touches
    pub used_indexes: Configuration,
}

impl WhatIfResult {
    pub fn new(cost: f64, used_indexes: Configuration) -> WhatIfResult {
        WhatIfResult { cost, used_indexes }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExplainInfo {
    pub category: StatementCategory,
    // Extra cost a modifying statement pays per materialized index
    pub maintenance_costs: AHashMap<IndexId, f64>,
}

impl ExplainInfo {
    pub fn query() -> ExplainInfo {
        ExplainInfo { category: StatementCategory::Query, maintenance_costs: AHashMap::new() }
    }

    pub fn modification(maintenance_costs: AHashMap<IndexId, f64>) -> ExplainInfo {
        ExplainInfo { category: StatementCategory::Modification, maintenance_costs }
    }

    pub fn schema_change() -> ExplainInfo {
        ExplainInfo { category: StatementCategory::SchemaChange, maintenance_costs: AHashMap::new() }
    }

    pub fn maintenance_cost(&self, index: IndexId) -> f64 {
        match self.category {
            StatementCategory::Modification => self.maintenance_costs.get(&index).copied().unwrap_or(0.0),
            _ => 0.0,
        }
    }
}

// Cost function of a single statement. Must be deterministic within one round.
#[cfg_attr(test, mockall::automock)]
pub trait WhatIfOracle {
    fn evaluate(&self, config: &Configuration) -> Result<WhatIfResult, OracleError>;
}

impl<F> WhatIfOracle for F where F: Fn(&Configuration) -> Result<WhatIfResult, OracleError> {
    fn evaluate(&self, config: &Configuration) -> Result<WhatIfResult, OracleError> {
        self(config)
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait WhatIfOptimizer: Send + Sync {
    fn explain(&self, sql: &str, snapshot: &Snapshot) -> Result<ExplainInfo, OracleError>;
    fn what_if(&self, sql: &str, config: &Configuration) -> Result<WhatIfResult, OracleError>;
}

// Binds one statement to an optimizer, which turns it into that statement's cost function.
pub struct StatementOracle {
    optimizer: Arc<dyn WhatIfOptimizer>,
    sql: String,
}

impl StatementOracle {
    pub fn new(optimizer: Arc<dyn WhatIfOptimizer>, sql: &str) -> StatementOracle {
        StatementOracle { optimizer, sql: sql.to_string() }
    }
}

impl WhatIfOracle for StatementOracle {
    fn evaluate(&self, config: &Configuration) -> Result<WhatIfResult, OracleError> {
        self.optimizer.what_if(&self.sql, config)
    }
}
