use std::sync::{atomic::{AtomicUsize, Ordering}, Arc};

use oxid_tune::{ibg::{IbgAnalyzer, InteractionBank, InteractionLogger}, optimizer::{synthetic::{PlanMenu, SyntheticOptimizer}, ExplainInfo, WhatIfOptimizer, WhatIfResult}, AdvisorConfig, AdvisorError, CandidatePool, Configuration, IndexDescriptor, IndexId, OracleError, Profiler, Snapshot, TuningSession};

const A: IndexId = 0;
const B: IndexId = 1;
const C: IndexId = 2;

// Answers from a fixed table, exactly what a real optimizer reported for one statement
struct TableOptimizer {
    calls: AtomicUsize,
}

impl WhatIfOptimizer for TableOptimizer {
    fn explain(&self, _sql: &str, _snapshot: &Snapshot) -> Result<ExplainInfo, OracleError> {
        Ok(ExplainInfo::query())
    }

    fn what_if(&self, _sql: &str, config: &Configuration) -> Result<WhatIfResult, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let ids = config.iter().collect::<Vec<_>>();
        let (cost, used) = match ids.as_slice() {
            [A, B, C] => (100.0, vec![A, B]),
            [B, C] => (180.0, vec![B]),
            [A, C] => (150.0, vec![A]),
            [C] => (200.0, vec![]),
            [] => (300.0, vec![]),
            _ => return Err(OracleError::Execution(format!("no plan for {}", config))),
        };
        Ok(WhatIfResult::new(cost, Configuration::from_ids(config.capacity(), used)))
    }
}

fn abc_pool() -> Arc<CandidatePool> {
    let pool = Arc::new(CandidatePool::new(16));
    for column in ["a", "b", "c"] {
        pool.add_candidate(IndexDescriptor::btree("t", &[column], 10.0)).unwrap();
    }
    pool
}

#[test]
fn end_to_end_abc_test() {
    let optimizer = Arc::new(TableOptimizer { calls: AtomicUsize::new(0) });
    let mut profiler = Profiler::new(optimizer.clone(), abc_pool()).unwrap();
    let profiled = profiler.process_query("SELECT * FROM t WHERE a = ? AND b = ?").unwrap();
    let ibg = &profiled.ibg;

    let root = ibg.root();
    let removed = ibg.children(root).map(|(index, _)| index).collect::<Vec<_>>();
    assert_eq!(removed, vec![A, B]);
    assert_eq!(profiled.what_if_call_count, optimizer.calls.load(Ordering::SeqCst));

    let analyzer = IbgAnalyzer::new(ibg.clone());
    let full = Configuration::full(3);
    assert_eq!(analyzer.benefit(A, &full), Some(180.0 - 100.0));
    let a_c = Configuration::from_ids(3, [A, C]);
    let bound = analyzer.cost_bounds(&a_c);
    assert!(bound.is_exact());
    assert_eq!(bound.low, 150.0);
    assert_eq!(analyzer.exact_cost(&a_c), Some(150.0));

    let mut bank = InteractionBank::new();
    analyzer.analyze(&mut bank, &mut InteractionLogger::start()).unwrap();
    assert_eq!(bank.interaction(A, B), profiled.interaction_bank.interaction(B, A));
}

#[test]
fn round_abort_test() {
    let optimizer = Arc::new(SyntheticOptimizer::new());
    optimizer.register_query("SELECT * FROM t WHERE a = 1", PlanMenu::new(500.0).with_plan(&[A], 50.0));
    optimizer.register_query("SELECT * FROM t WHERE b = 1", PlanMenu::new(500.0).with_plan(&[B], 50.0).with_plan(&[B, C], 20.0));
    let mut session = TuningSession::new(optimizer.clone(), &AdvisorConfig::default()).unwrap();
    for column in ["a", "b", "c"] {
        session.add_candidate(IndexDescriptor::btree("t", &[column], 10.0)).unwrap();
    }
    let before = session.process_statement("SELECT * FROM t WHERE a = 1").unwrap();
    assert_eq!(before.iter().map(|i| i.id).collect::<Vec<_>>(), vec![A]);
    let generation = session.pool().generation();
    let bank = session.interaction_bank();
    let round = session.wfa().round();

    // The optimizer dies after the empty configuration and the root
    optimizer.set_call_limit(Some(optimizer.what_if_calls() + 2));
    let result = session.process_statement("SELECT * FROM t WHERE b = 1");
    assert!(matches!(result, Err(AdvisorError::Oracle(OracleError::Execution(_)))));

    assert_eq!(session.pool().generation(), generation);
    assert_eq!(session.pool().len(), 3);
    assert!(Arc::ptr_eq(&bank, &session.interaction_bank()));
    assert_eq!(session.wfa().round(), round);
    assert_eq!(session.recommendation(), before);
}

#[test]
fn schema_change_round_test() {
    let optimizer = Arc::new(SyntheticOptimizer::new());
    optimizer.register("ALTER TABLE t ADD COLUMN d INTEGER", ExplainInfo::schema_change(), PlanMenu::new(1.0));
    let mut session = TuningSession::new(optimizer.clone(), &AdvisorConfig::default()).unwrap();
    session.add_candidate(IndexDescriptor::btree("t", &["a"], 10.0)).unwrap();
    assert!(matches!(session.process_statement("ALTER TABLE t ADD COLUMN d INTEGER"), Err(AdvisorError::UnsupportedStatement(_))));
    assert_eq!(optimizer.what_if_calls(), 0);
    assert_eq!(session.wfa().round(), 0);
}

#[test]
fn hot_set_readmission_test() {
    let optimizer = Arc::new(SyntheticOptimizer::new());
    for (column, id) in [("a", A), ("b", B), ("c", C)] {
        optimizer.register_query(&format!("SELECT * FROM t WHERE {} = 1", column), PlanMenu::new(100.0).with_plan(&[id], 10.0));
    }
    let config = AdvisorConfig::default().with_hot_set_size(2);
    let mut session = TuningSession::new(optimizer, &config).unwrap();
    for column in ["a", "b", "c"] {
        session.add_candidate(IndexDescriptor::btree("t", &[column], 10.0)).unwrap();
    }
    for column in ["a", "b", "c", "a"] {
        session.process_statement(&format!("SELECT * FROM t WHERE {} = 1", column)).unwrap();
        assert!(session.wfa().hot_set().len() <= 2);
    }
    let hot = session.wfa().hot_set().iter().map(|i| i.id).collect::<Vec<_>>();
    assert_eq!(hot, vec![A, C]);
}

#[test]
fn determinism_test() {
    let workload = [
        "SELECT * FROM t WHERE a = 1 AND b = 2",
        "SELECT * FROM t WHERE c = 3",
        "UPDATE t SET a = 0",
        "SELECT * FROM t WHERE a = 1 AND b = 2",
        "SELECT * FROM t WHERE c = 3",
    ];
    let run = || {
        let optimizer = Arc::new(SyntheticOptimizer::new());
        optimizer.register_query(workload[0], PlanMenu::new(300.0).with_plan(&[A, B], 100.0).with_plan(&[A], 150.0));
        optimizer.register_query(workload[1], PlanMenu::new(400.0).with_plan(&[C], 40.0).with_plan(&[B, C], 30.0));
        let mut maintenance = ahash::AHashMap::new();
        maintenance.insert(A, 60.0);
        maintenance.insert(B, 20.0);
        optimizer.register(workload[2], ExplainInfo::modification(maintenance), PlanMenu::new(200.0).with_plan(&[A], 150.0));
        let config = AdvisorConfig::default().with_hot_set_size(2).with_vote_weight(0.5);
        let mut session = TuningSession::new(optimizer, &config).unwrap();
        for column in ["a", "b", "c"] {
            session.add_candidate(IndexDescriptor::btree("t", &[column], 25.0)).unwrap();
        }
        let mut recommendations = Vec::new();
        for (i, sql) in workload.iter().enumerate() {
            let recommendation = session.process_statement(sql).unwrap();
            recommendations.push(recommendation.iter().map(|i| i.id).collect::<Vec<_>>());
            if i == 2 {
                session.vote(IndexDescriptor::btree("t", &["c"], 25.0), true).unwrap();
            }
        }
        recommendations
    };
    assert_eq!(run(), run());
}
