/*
    Construction and analysis of a benefit graph each run on their own long lived thread. The
    caller hands a job over, may do other work, and then blocks until it's done. Both channels
    hold a single element: a worker only ever has one job in flight and starting a second one
    before collecting the first is a caller bug.
 */
use std::{sync::Arc, thread::{self, JoinHandle}};

use crossbeam::channel::{bounded, Receiver, Sender};
use log::{debug, error};

use crate::{error::{AdvisorError, AdvisorResult}, ibg::{AnalysisStats, IbgAnalyzer, IbgConstructor, IndexBenefitGraph, InteractionBank, InteractionLogger}};

pub trait Job: Send + 'static {
    type Output: Send + 'static;

    fn run(self) -> AdvisorResult<Self::Output>;
}

pub struct Worker<J: Job> {
    name: String,
    jobs: Option<Sender<J>>,
    results: Receiver<AdvisorResult<J::Output>>,
    outstanding: bool,
    handle: Option<JoinHandle<()>>,
}

impl<J: Job> Worker<J> {
    pub fn new(name: &str) -> AdvisorResult<Worker<J>> {
        let (job_sender, job_receiver) = bounded::<J>(1);
        let (result_sender, result_receiver) = bounded::<AdvisorResult<J::Output>>(1);
        let thread_name = name.to_string();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                loop {
                    match job_receiver.recv() {
                        Ok(job) => {
                            if result_sender.send(job.run()).is_err() {
                                error!("Nobody is waiting for the results of worker {}", thread_name);
                                break;
                            }
                        }
                        Err(_) => {
                            debug!("Shutting down worker {}!", thread_name);
                            break;
                        }
                    }
                }
            })
            .map_err(|e| AdvisorError::WorkerTerminated(format!("{} (failed to spawn: {})", name, e)))?;
        Ok(Worker {
            name: name.to_string(),
            jobs: Some(job_sender),
            results: result_receiver,
            outstanding: false,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_busy(&self) -> bool {
        self.outstanding
    }

    pub fn start(&mut self, job: J) -> AdvisorResult<()> {
        if self.outstanding {
            return Err(AdvisorError::ConcurrentAccessViolation(format!(
                "worker {} already has a job in flight", self.name)));
        }
        let jobs = self.jobs.as_ref()
            .ok_or_else(|| AdvisorError::WorkerTerminated(self.name.clone()))?;
        jobs.send(job).map_err(|_| AdvisorError::WorkerTerminated(self.name.clone()))?;
        self.outstanding = true;
        Ok(())
    }

    pub fn wait_until_done(&mut self) -> AdvisorResult<J::Output> {
        if !self.outstanding {
            return Err(AdvisorError::ConcurrentAccessViolation(format!(
                "waiting on worker {} without a job", self.name)));
        }
        self.outstanding = false;
        match self.results.recv() {
            Ok(result) => result,
            // The thread is gone, most likely a panic inside the job
            Err(_) => Err(AdvisorError::WorkerTerminated(self.name.clone())),
        }
    }
}

impl<J: Job> Drop for Worker<J> {
    fn drop(&mut self) {
        // Closing the job channel ends the worker loop
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("worker {} panicked", self.name);
            }
        }
    }
}

pub struct ConstructionJob {
    constructor: IbgConstructor,
}

impl ConstructionJob {
    pub fn new(constructor: IbgConstructor) -> ConstructionJob {
        ConstructionJob { constructor }
    }
}

impl Job for ConstructionJob {
    type Output = IndexBenefitGraph;

    fn run(mut self) -> AdvisorResult<IndexBenefitGraph> {
        self.constructor.run()?;
        self.constructor.finish()
    }
}

pub struct AnalysisJob {
    analyzer: IbgAnalyzer,
    bank: InteractionBank,
    logger: InteractionLogger,
}

#[derive(Debug)]
pub struct AnalysisOutput {
    pub bank: InteractionBank,
    pub stats: AnalysisStats,
}

impl AnalysisJob {
    // Works on its own copy of the bank, the caller decides whether to keep the result
    pub fn new(graph: Arc<IndexBenefitGraph>, bank: InteractionBank, logger: InteractionLogger) -> AnalysisJob {
        AnalysisJob { analyzer: IbgAnalyzer::new(graph), bank, logger }
    }
}

impl Job for AnalysisJob {
    type Output = AnalysisOutput;

    fn run(mut self) -> AdvisorResult<AnalysisOutput> {
        let stats = self.analyzer.analyze(&mut self.bank, &mut self.logger)?;
        Ok(AnalysisOutput { bank: self.bank, stats })
    }
}

#[cfg(test)]
mod test {
    use crossbeam::channel::unbounded;

    use crate::{candidate::{CandidatePool, Configuration, IndexDescriptor}, error::OracleError, optimizer::{synthetic::PlanMenu, WhatIfResult}};

    use super::*;

    // Blocks until the test lets it go
    struct GateJob(Receiver<u32>);

    impl Job for GateJob {
        type Output = u32;

        fn run(self) -> AdvisorResult<u32> {
            self.0.recv().map_err(|_| AdvisorError::WorkerTerminated("gate".to_string()))
        }
    }

    struct PanicJob;

    impl Job for PanicJob {
        type Output = ();

        fn run(self) -> AdvisorResult<()> {
            panic!("job blew up");
        }
    }

    #[test]
    fn second_outstanding_job_is_rejected_test() {
        let mut worker = Worker::new("gate-worker").unwrap();
        let (first_gate, first_receiver) = unbounded();
        let (_second_gate, second_receiver) = unbounded();
        worker.start(GateJob(first_receiver)).unwrap();
        assert!(worker.is_busy());
        assert!(matches!(worker.start(GateJob(second_receiver)), Err(AdvisorError::ConcurrentAccessViolation(_))));
        first_gate.send(7).unwrap();
        assert_eq!(worker.wait_until_done().unwrap(), 7);
        assert!(!worker.is_busy());
    }

    #[test]
    fn wait_without_job_test() {
        let mut worker: Worker<GateJob> = Worker::new("idle-worker").unwrap();
        assert!(matches!(worker.wait_until_done(), Err(AdvisorError::ConcurrentAccessViolation(_))));
    }

    #[test]
    fn worker_is_reusable_test() {
        let mut worker = Worker::new("reused-worker").unwrap();
        for round in 0..3 {
            let (gate, receiver) = unbounded();
            worker.start(GateJob(receiver)).unwrap();
            gate.send(round).unwrap();
            assert_eq!(worker.wait_until_done().unwrap(), round);
        }
    }

    #[test]
    fn panicking_job_terminates_worker_test() {
        let mut worker = Worker::new("panic-worker").unwrap();
        worker.start(PanicJob).unwrap();
        assert!(matches!(worker.wait_until_done(), Err(AdvisorError::WorkerTerminated(_))));
        // The thread is gone, new jobs can't be handed over anymore
        assert!(matches!(worker.start(PanicJob), Err(AdvisorError::WorkerTerminated(_))));
    }

    #[test]
    fn construction_then_analysis_test() {
        let pool = CandidatePool::new(8);
        for column in ["a", "b", "c"] {
            pool.add_candidate(IndexDescriptor::btree("t", &[column], 1.0)).unwrap();
        }
        let menu = PlanMenu::new(300.0).with_plan(&[0, 1], 100.0).with_plan(&[0], 150.0).with_plan(&[1], 180.0);
        let oracle = move |config: &Configuration| -> Result<WhatIfResult, OracleError> { Ok(menu.evaluate(config)) };

        let mut construction = Worker::new("construction").unwrap();
        construction.start(ConstructionJob::new(IbgConstructor::new(pool.snapshot(), Box::new(oracle)))).unwrap();
        let graph = Arc::new(construction.wait_until_done().unwrap());
        assert_eq!(graph.node_count(), 4);

        let mut analysis = Worker::new("analysis").unwrap();
        analysis.start(AnalysisJob::new(graph, InteractionBank::new(), InteractionLogger::start())).unwrap();
        let output = analysis.wait_until_done().unwrap();
        assert_eq!(output.bank.interaction(0, 1), 70.0);
        assert!(output.stats.interactions_updated > 0);
    }

    #[test]
    fn construction_error_is_returned_test() {
        let pool = CandidatePool::new(8);
        pool.add_candidate(IndexDescriptor::btree("t", &["a"], 1.0)).unwrap();
        let oracle = |_: &Configuration| -> Result<WhatIfResult, OracleError> { Err(OracleError::Execution("down".to_string())) };
        let mut construction = Worker::new("failing-construction").unwrap();
        construction.start(ConstructionJob::new(IbgConstructor::new(pool.snapshot(), Box::new(oracle)))).unwrap();
        assert!(matches!(construction.wait_until_done(), Err(AdvisorError::Oracle(_))));
        // An error doesn't kill the worker
        assert!(!construction.is_busy());
    }
}
