use std::sync::Arc;

use log::debug;

use crate::{candidate::{CandidatePool, Index, IndexDescriptor}, config::AdvisorConfig, error::AdvisorResult, ibg::InteractionBank, optimizer::WhatIfOptimizer, profiler::Profiler, wfa::WorkFunctionAlgorithm};

// One tuning session: a candidate pool, a profiler feeding off it and the WFA turning profiles into
// recommendations. The WFA only sees rounds that were profiled successfully.
pub struct TuningSession {
    profiler: Profiler,
    wfa: WorkFunctionAlgorithm,
}

impl TuningSession {
    pub fn new(optimizer: Arc<dyn WhatIfOptimizer>, config: &AdvisorConfig) -> AdvisorResult<TuningSession> {
        config.validate()?;
        let pool = Arc::new(CandidatePool::new(config.max_candidates));
        Ok(TuningSession {
            profiler: Profiler::new(optimizer, pool)?,
            wfa: WorkFunctionAlgorithm::new(config)?,
        })
    }

    pub fn add_candidate(&self, descriptor: IndexDescriptor) -> AdvisorResult<Arc<Index>> {
        self.profiler.pool().add_candidate(descriptor)
    }

    pub fn process_statement(&mut self, sql: &str) -> AdvisorResult<Vec<Arc<Index>>> {
        let profiled = self.profiler.process_query(sql)?;
        self.wfa.new_task(&profiled)?;
        Ok(self.wfa.get_recommendation())
    }

    pub fn vote(&mut self, descriptor: IndexDescriptor, positive: bool) -> AdvisorResult<()> {
        self.profiler.process_vote(descriptor.clone(), positive)?;
        match self.profiler.pool().find(&descriptor) {
            Some(index) => self.wfa.vote(&index, positive),
            None => {
                debug!("Ignoring negative vote for {}.{:?}, it never was a candidate", descriptor.table, descriptor.columns);
                Ok(())
            }
        }
    }

    pub fn recommendation(&mut self) -> Vec<Arc<Index>> {
        self.wfa.get_recommendation()
    }

    pub fn pool(&self) -> &Arc<CandidatePool> {
        self.profiler.pool()
    }

    pub fn interaction_bank(&self) -> Arc<InteractionBank> {
        self.profiler.interaction_bank()
    }

    pub fn wfa(&self) -> &WorkFunctionAlgorithm {
        &self.wfa
    }
}

#[cfg(test)]
mod test {
    use crate::{error::AdvisorError, optimizer::synthetic::{PlanMenu, SyntheticOptimizer}};

    use super::*;

    #[test]
    fn vote_for_new_index_test() {
        let optimizer = Arc::new(SyntheticOptimizer::new());
        let mut session = TuningSession::new(optimizer, &AdvisorConfig::default()).unwrap();
        session.vote(IndexDescriptor::btree("t", &["x"], 5.0), false).unwrap();
        assert!(session.pool().is_empty());
        session.vote(IndexDescriptor::btree("t", &["x"], 5.0), true).unwrap();
        assert_eq!(session.pool().len(), 1);
        assert_eq!(session.wfa().hot_set().len(), 1);
        // A positive vote alone doesn't materialize anything
        assert!(session.recommendation().is_empty());
    }

    #[test]
    fn invalid_config_test() {
        let optimizer = Arc::new(SyntheticOptimizer::new());
        let config = AdvisorConfig::default().with_hot_set_size(17);
        assert!(matches!(TuningSession::new(optimizer, &config),
            Err(AdvisorError::CapacityExceeded { what: "hot set", limit: 16 })));
    }

    #[test]
    fn statement_round_test() {
        let optimizer = Arc::new(SyntheticOptimizer::new());
        optimizer.register_query("SELECT * FROM t WHERE x = 1", PlanMenu::new(1000.0).with_plan(&[0], 10.0));
        let mut session = TuningSession::new(optimizer, &AdvisorConfig::default()).unwrap();
        let x = session.add_candidate(IndexDescriptor::btree("t", &["x"], 5.0)).unwrap();
        let recommendation = session.process_statement("SELECT * FROM t WHERE x = 1").unwrap();
        assert_eq!(recommendation, vec![x]);
        assert!(session.interaction_bank().is_empty());
    }
}
