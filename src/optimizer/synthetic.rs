use std::sync::atomic::{AtomicUsize, Ordering};

use ahash::AHashMap;
use parking_lot::RwLock;
use rand::{seq::SliceRandom, Rng};

use crate::{candidate::{Configuration, IndexId, Snapshot}, error::OracleError};

use super::{ExplainInfo, WhatIfOptimizer, WhatIfResult};

/*
    A stand-in optimizer for tests and demos. Every statement gets a "menu" of access plans, each
    plan needing a set of indexes and having a fixed cost. The cost of a configuration is the
    cheapest plan whose indexes are all present (there is always an index-free fallback plan) and
    the used indexes are exactly that plan's indexes. This has the properties a real optimizer is
    assumed to have: adding indexes never makes a statement more expensive and removing an index
    the chosen plan doesn't use doesn't change anything.
 */

#[derive(Debug, Clone, PartialEq)]
pub struct AccessPlan {
    pub required: Vec<IndexId>,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanMenu {
    base_cost: f64,
    plans: Vec<AccessPlan>,
}

impl PlanMenu {
    pub fn new(base_cost: f64) -> PlanMenu {
        PlanMenu { base_cost, plans: Vec::new() }
    }

    pub fn with_plan(mut self, required: &[IndexId], cost: f64) -> PlanMenu {
        self.plans.push(AccessPlan { required: required.to_vec(), cost });
        self
    }

    // Plans of one to three indexes drawn from the candidates, each cheaper than the fallback.
    pub fn random<R: Rng>(rng: &mut R, candidates: &[IndexId], n_plans: usize) -> PlanMenu {
        let base_cost = rng.gen_range(1_000.0..10_000.0);
        let mut menu = PlanMenu::new(base_cost);
        if candidates.is_empty() {
            return menu;
        }
        for _ in 0..n_plans {
            let width = rng.gen_range(1..=candidates.len().min(3));
            let mut required = candidates.choose_multiple(rng, width).copied().collect::<Vec<_>>();
            required.sort_unstable();
            let cost = base_cost * rng.gen_range(0.05..0.95);
            menu = menu.with_plan(&required, cost);
        }
        menu
    }

    pub fn base_cost(&self) -> f64 {
        self.base_cost
    }

    pub fn evaluate(&self, config: &Configuration) -> WhatIfResult {
        let mut best: Option<&AccessPlan> = None;
        let mut best_cost = self.base_cost;
        for plan in &self.plans {
            // Strictly cheaper only, so ties always go to the earlier plan
            if plan.cost < best_cost && plan.required.iter().all(|&id| config.contains(id)) {
                best = Some(plan);
                best_cost = plan.cost;
            }
        }
        let used = match best {
            Some(plan) => Configuration::from_ids(config.capacity(), plan.required.iter().copied()),
            None => Configuration::empty(config.capacity()),
        };
        WhatIfResult::new(best_cost, used)
    }
}

pub struct SyntheticOptimizer {
    statements: RwLock<AHashMap<String, (ExplainInfo, PlanMenu)>>,
    what_if_calls: AtomicUsize,
    // Calls beyond this number fail, used to inject optimizer errors
    call_limit: AtomicUsize,
}

impl SyntheticOptimizer {
    pub fn new() -> SyntheticOptimizer {
        SyntheticOptimizer {
            statements: RwLock::new(AHashMap::new()),
            what_if_calls: AtomicUsize::new(0),
            call_limit: AtomicUsize::new(usize::MAX),
        }
    }

    pub fn register(&self, sql: &str, explain_info: ExplainInfo, menu: PlanMenu) {
        self.statements.write().insert(sql.to_string(), (explain_info, menu));
    }

    pub fn register_query(&self, sql: &str, menu: PlanMenu) {
        self.register(sql, ExplainInfo::query(), menu);
    }

    pub fn set_call_limit(&self, limit: Option<usize>) {
        self.call_limit.store(limit.unwrap_or(usize::MAX), Ordering::SeqCst);
    }

    pub fn what_if_calls(&self) -> usize {
        self.what_if_calls.load(Ordering::SeqCst)
    }
}

impl Default for SyntheticOptimizer {
    fn default() -> Self {
        SyntheticOptimizer::new()
    }
}

impl WhatIfOptimizer for SyntheticOptimizer {
    fn explain(&self, sql: &str, _snapshot: &Snapshot) -> Result<ExplainInfo, OracleError> {
        self.statements.read().get(sql)
            .map(|(info, _)| info.clone())
            .ok_or_else(|| OracleError::Execution(format!("unknown statement '{}'", sql)))
    }

    fn what_if(&self, sql: &str, config: &Configuration) -> Result<WhatIfResult, OracleError> {
        let calls = self.what_if_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if calls > self.call_limit.load(Ordering::SeqCst) {
            return Err(OracleError::Execution(format!("optimizer unavailable after {} calls", calls - 1)));
        }
        let statements = self.statements.read();
        let (_, menu) = statements.get(sql)
            .ok_or_else(|| OracleError::Execution(format!("unknown statement '{}'", sql)))?;
        Ok(menu.evaluate(config))
    }
}

#[cfg(test)]
mod test {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn cheapest_feasible_plan_test() {
        let menu = PlanMenu::new(300.0)
            .with_plan(&[0, 1], 100.0)
            .with_plan(&[0], 150.0);
        let full = menu.evaluate(&Configuration::full(3));
        assert_eq!(full.cost, 100.0);
        assert_eq!(full.used_indexes, Configuration::from_ids(3, [0, 1]));
        let only_a = menu.evaluate(&Configuration::from_ids(3, [0, 2]));
        assert_eq!(only_a.cost, 150.0);
        assert_eq!(only_a.used_indexes, Configuration::from_ids(3, [0]));
        let nothing = menu.evaluate(&Configuration::from_ids(3, [2]));
        assert_eq!(nothing.cost, 300.0);
        assert!(nothing.used_indexes.is_empty());
    }

    #[test]
    fn random_menus_are_monotone_test() {
        let mut rng = StdRng::seed_from_u64(77);
        for _ in 0..20 {
            let menu = PlanMenu::random(&mut rng, &[0, 1, 2, 3, 4], 6);
            for mask in 0u32..32 {
                let config = Configuration::from_ids(5, (0..5).filter(|b| mask & (1 << b) != 0));
                let result = menu.evaluate(&config);
                assert!(result.used_indexes.is_subset_of(&config));
                for extra in 0..5 {
                    assert!(menu.evaluate(&config.with(extra)).cost <= result.cost);
                    if config.contains(extra) && !result.used_indexes.contains(extra) {
                        assert_eq!(menu.evaluate(&config.without(extra)), result);
                    }
                }
            }
        }
    }

    #[test]
    fn call_limit_test() {
        let optimizer = SyntheticOptimizer::new();
        optimizer.register_query("q", PlanMenu::new(10.0));
        optimizer.set_call_limit(Some(1));
        assert!(optimizer.what_if("q", &Configuration::empty(0)).is_ok());
        assert!(matches!(optimizer.what_if("q", &Configuration::empty(0)), Err(OracleError::Execution(_))));
        optimizer.set_call_limit(None);
        assert!(optimizer.what_if("q", &Configuration::empty(0)).is_ok());
        assert_eq!(optimizer.what_if_calls(), 3);
    }
}
