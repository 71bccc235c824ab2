use std::{sync::Arc, time::Instant};

use log::{info, warn};

use crate::{candidate::{CandidatePool, Configuration, IndexDescriptor, Snapshot}, error::{AdvisorError, AdvisorResult}, ibg::{IbgAnalyzer, IbgConstructor, IndexBenefitGraph, InteractionBank, InteractionLogger}, optimizer::{ExplainInfo, StatementCategory, StatementOracle, WhatIfOptimizer}, worker::{AnalysisJob, ConstructionJob, Worker}};

// Everything one profiling round learned about a statement
#[derive(Clone)]
pub struct ProfiledQuery {
    pub sql: String,
    pub explain_info: ExplainInfo,
    pub snapshot: Snapshot,
    pub ibg: Arc<IndexBenefitGraph>,
    pub interaction_bank: Arc<InteractionBank>,
    pub what_if_call_count: usize,
    pub analysis_millis: u64,
}

impl ProfiledQuery {
    /*
        Cost of running the statement with exactly the given indexes materialized. Indexes the
        snapshot didn't know about are ignored. If the graph can't answer exactly we take the
        upper bound, which never makes a configuration look better than it is. Modifications
        additionally pay for keeping every materialized index up to date.
     */
    pub fn total_cost(&self, config: &Configuration) -> f64 {
        let analyzer = IbgAnalyzer::new(self.ibg.clone());
        let bound = analyzer.cost_bounds(config);
        let cost = if bound.is_exact() { bound.low } else { bound.high };
        let maintenance = config.iter()
            .filter(|&id| self.snapshot.contains(id))
            .map(|id| self.explain_info.maintenance_cost(id))
            .sum::<f64>();
        cost + maintenance
    }
}

/*
    Drives one round per statement. The pool only ever grows through add_candidate and
    process_vote, a round just takes a snapshot of it. The interaction bank is replaced as a whole
    once analysis succeeded, so a failing round leaves no trace.
 */
pub struct Profiler {
    optimizer: Arc<dyn WhatIfOptimizer>,
    pool: Arc<CandidatePool>,
    bank: Arc<InteractionBank>,
    construction: Worker<ConstructionJob>,
    analysis: Worker<AnalysisJob>,
}

impl Profiler {
    pub fn new(optimizer: Arc<dyn WhatIfOptimizer>, pool: Arc<CandidatePool>) -> AdvisorResult<Profiler> {
        Ok(Profiler {
            optimizer,
            pool,
            bank: Arc::new(InteractionBank::new()),
            construction: Worker::new("ibg-construction")?,
            analysis: Worker::new("ibg-analysis")?,
        })
    }

    pub fn process_query(&mut self, sql: &str) -> AdvisorResult<ProfiledQuery> {
        match self.profile(sql) {
            Ok(profiled) => Ok(profiled),
            Err(e) => {
                warn!("Profiling of '{}' aborted: {}", sql, e);
                Err(e)
            }
        }
    }

    fn profile(&mut self, sql: &str) -> AdvisorResult<ProfiledQuery> {
        let mut logger = InteractionLogger::start();
        let snapshot = self.pool.snapshot();
        let explain_info = self.optimizer.explain(sql, &snapshot)?;
        if explain_info.category == StatementCategory::SchemaChange {
            return Err(AdvisorError::UnsupportedStatement(explain_info.category));
        }

        let oracle = StatementOracle::new(self.optimizer.clone(), sql);
        let constructor = IbgConstructor::new(snapshot.clone(), Box::new(oracle));
        self.construction.start(ConstructionJob::new(constructor))?;
        let ibg = Arc::new(self.construction.wait_until_done()?);
        let what_if_call_count = ibg.what_if_calls();

        logger.record_what_if_calls(what_if_call_count);
        let analysis_start = Instant::now();
        self.analysis.start(AnalysisJob::new(ibg.clone(), self.bank.as_ref().clone(), logger))?;
        let output = self.analysis.wait_until_done()?;
        let analysis_millis = analysis_start.elapsed().as_millis() as u64;
        self.bank = Arc::new(output.bank);

        info!("Profiled '{}': {} candidates, {} IBG nodes, {} what-if calls, {} interactions updated in {}ms",
            sql, snapshot.len(), ibg.node_count(), what_if_call_count, output.stats.interactions_updated, analysis_millis);
        Ok(ProfiledQuery {
            sql: sql.to_string(),
            explain_info,
            snapshot,
            ibg,
            interaction_bank: self.bank.clone(),
            what_if_call_count,
            analysis_millis,
        })
    }

    // A positive vote for an index nobody proposed yet makes it a candidate. A negative vote
    // never adds anything.
    pub fn process_vote(&self, descriptor: IndexDescriptor, positive: bool) -> AdvisorResult<Snapshot> {
        if positive {
            self.pool.add_candidate(descriptor)?;
        }
        Ok(self.pool.snapshot())
    }

    pub fn add_candidate(&self, descriptor: IndexDescriptor) -> AdvisorResult<Snapshot> {
        self.pool.add_candidate(descriptor)?;
        Ok(self.pool.snapshot())
    }

    pub fn interaction_bank(&self) -> Arc<InteractionBank> {
        self.bank.clone()
    }

    pub fn pool(&self) -> &Arc<CandidatePool> {
        &self.pool
    }
}
