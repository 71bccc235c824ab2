use std::sync::Arc;

use ahash::AHashMap;
use oxid_tune::{optimizer::{synthetic::{PlanMenu, SyntheticOptimizer}, ExplainInfo}, AdvisorConfig, AdvisorResult, IndexDescriptor, TuningSession};

// Small workload against the synthetic optimizer, printing what the advisor recommends after each statement.
fn main() {
    println!("OxidTune - Online Index Advisor");
    if let Err(e) = run() {
        println!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> AdvisorResult<()> {
    let config = AdvisorConfig::new();
    let optimizer = Arc::new(SyntheticOptimizer::new());
    let mut session = TuningSession::new(optimizer.clone(), &config)?;

    let people_age = session.add_candidate(IndexDescriptor::btree("people", &["age"], 40.0))?;
    let people_name = session.add_candidate(IndexDescriptor::btree("people", &["name"], 40.0))?;
    let people_age_name = session.add_candidate(IndexDescriptor::btree("people", &["age", "name"], 80.0))?;

    optimizer.register_query("SELECT name FROM people WHERE age = 42",
        PlanMenu::new(1000.0).with_plan(&[people_age.id], 120.0).with_plan(&[people_age_name.id], 60.0));
    optimizer.register_query("SELECT age FROM people WHERE name = 'Ada'",
        PlanMenu::new(1000.0).with_plan(&[people_name.id], 90.0));
    let mut maintenance = AHashMap::new();
    for index in session.pool().snapshot().iter() {
        maintenance.insert(index.id, 25.0);
    }
    optimizer.register("UPDATE people SET age = age + 1", ExplainInfo::modification(maintenance),
        PlanMenu::new(500.0));

    let workload = [
        "SELECT name FROM people WHERE age = 42",
        "SELECT name FROM people WHERE age = 42",
        "SELECT age FROM people WHERE name = 'Ada'",
        "UPDATE people SET age = age + 1",
        "SELECT name FROM people WHERE age = 42",
        "SELECT age FROM people WHERE name = 'Ada'",
    ];
    for sql in workload {
        let recommendation = session.process_statement(sql)?;
        println!("{}", sql);
        for index in &recommendation {
            println!("    {}", index);
        }
        if recommendation.is_empty() {
            println!("    (no indexes)");
        }
    }

    session.vote(IndexDescriptor::btree("people", &["name"], 40.0), false)?;
    println!("After a negative vote on people(name): {} hot indexes, {} what-if calls in total",
        session.wfa().hot_set().len(), optimizer.what_if_calls());
    Ok(())
}
