//! Job state machine and the single-worker loop.
//!
//! The engine owns a job from dequeue to terminal status: it advances the
//! three stages in order, persists each stage's output, and reports every
//! transition on the event channel. Exactly one job runs at a time; jobs are
//! served strictly in submission order.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};

use anyhow::Result;
use tracing::{debug, error, info};

use crate::core::event::{Event, EventKind, Stage};
use crate::core::job::{Job, JobStatus};
use crate::core::sentinel::{PASS_SENTINEL, TESTS_WRITTEN_SENTINEL};
use crate::events::EventSink;
use crate::io::artifacts::{JobPaths, write_step};
use crate::io::config::PipelineConfig;
use crate::io::executor::{ExecRequest, Executor, execute_and_check};
use crate::io::prompt::PromptEngine;

/// Drives jobs through the three-stage workflow.
///
/// Constructed with an explicit event sink; the engine never owns or creates
/// the channel it reports on.
pub struct Engine<E> {
    executor: E,
    config: PipelineConfig,
    prompts: PromptEngine,
    events: EventSink,
    running: Arc<AtomicBool>,
}

impl<E: Executor> Engine<E> {
    pub fn new(
        executor: E,
        config: PipelineConfig,
        events: EventSink,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            executor,
            config,
            prompts: PromptEngine::new(),
            events,
            running,
        }
    }

    /// Serve the intake queue until the running flag clears.
    ///
    /// The wait on the queue is bounded by the poll interval so a `stop`
    /// request is noticed promptly. A failing job never takes the worker
    /// down; the loop moves on to the next job.
    pub fn worker_loop(&self, intake: Receiver<Job>) {
        info!("worker started");
        while self.running.load(Ordering::SeqCst) {
            match intake.recv_timeout(self.config.poll_interval()) {
                Ok(mut job) => self.process_job(&mut job),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("intake queue disconnected, worker exiting");
                    break;
                }
            }
        }
        info!("worker stopped");
    }

    /// Run one job to a terminal status.
    ///
    /// Any error escaping the stage sequence marks the job FAILED and is
    /// reported as an `error` event; it never propagates to the caller.
    pub fn process_job(&self, job: &mut Job) {
        let short = job.short_id();
        info!(job_id = %job.id, kind = %job.kind, "processing job");

        job.status = JobStatus::Running;
        self.emit(
            EventKind::Status(JobStatus::Running),
            job,
            format!("[{short}] status -> RUNNING"),
        );

        if let Err(err) = self.run_stages(job) {
            error!(job_id = %job.id, "job failed: {err:#}");
            job.status = JobStatus::Failed;
            self.emit(EventKind::Error, job, format!("[{short}] failed: {err:#}"));
        }
    }

    /// The three-stage sequence. Non-exceptional outcomes (a missed
    /// sentinel, exhausted attempts) are handled inline; only executor and
    /// filesystem errors propagate, aborting the remaining stages.
    fn run_stages(&self, job: &mut Job) -> Result<()> {
        let paths = JobPaths::new(&job.project_root, job.id);
        paths.ensure_dirs()?;

        self.stage_analyze(job, &paths)?;
        self.stage_generate_tests(job, &paths)?;
        self.stage_fix(job, &paths)?;
        Ok(())
    }

    /// Stage 1: scope and analyze. Any failure here aborts the whole job.
    fn stage_analyze(&self, job: &Job, paths: &JobPaths) -> Result<()> {
        let short = job.short_id();
        self.emit(
            EventKind::Step(Stage::Analyze),
            job,
            format!("[{short}] step 1: analyzing scope"),
        );

        let instruction = self.prompts.build_analyze(&job.project_root, &job.description)?;
        let output = self.executor.execute(&self.request(job, instruction))?;
        write_step(&paths.step1_path, &output)?;

        self.emit(
            EventKind::StepComplete(Stage::Analyze),
            job,
            format!("[{short}] step 1: analysis complete"),
        );
        Ok(())
    }

    /// Stage 2: generate failing tests. Best-effort: a missing sentinel is
    /// reported as a warning and the job continues.
    fn stage_generate_tests(&self, job: &Job, paths: &JobPaths) -> Result<()> {
        let short = job.short_id();
        self.emit(
            EventKind::Step(Stage::GenerateTests),
            job,
            format!("[{short}] step 2: generating failing tests"),
        );

        let instruction = self
            .prompts
            .build_generate_tests(&paths.step1_path, &paths.tests_dir)?;
        let (output, sentinel_found) = execute_and_check(
            &self.executor,
            &self.request(job, instruction),
            TESTS_WRITTEN_SENTINEL,
        )?;
        write_step(&paths.step2_path, &output)?;

        if sentinel_found {
            self.emit(
                EventKind::StepComplete(Stage::GenerateTests),
                job,
                format!("[{short}] step 2: tests written"),
            );
        } else {
            self.emit(
                EventKind::Warning(Stage::GenerateTests),
                job,
                format!("[{short}] step 2: sentinel missing, continuing"),
            );
        }
        Ok(())
    }

    /// Stage 3: fix with bounded retries.
    ///
    /// The loop keys on the PASS sentinel only: an explicit FAIL line and a
    /// missing sentinel both mean "try again". The accumulated attempt log
    /// is written once after the loop, however it ended.
    fn stage_fix(&self, job: &mut Job, paths: &JobPaths) -> Result<()> {
        let short = job.short_id();
        let max_attempts = self.config.max_attempts;
        self.emit(
            EventKind::Step(Stage::Fix),
            job,
            format!("[{short}] step 3: fixing and running tests"),
        );

        let mut attempt_log = String::new();
        let mut passed = false;
        let mut interrupted = false;

        for attempt in 1..=max_attempts {
            if !self.running.load(Ordering::SeqCst) {
                interrupted = true;
                break;
            }
            self.emit(
                EventKind::Attempt {
                    attempt,
                    max_attempts,
                },
                job,
                format!("[{short}] step 3: attempt {attempt}/{max_attempts}"),
            );

            let instruction = self.prompts.build_fix(
                &paths.tests_dir,
                &paths.step1_path,
                &paths.step2_path,
                attempt,
                max_attempts,
            )?;
            let (output, sentinel_found) = execute_and_check(
                &self.executor,
                &self.request(job, instruction),
                PASS_SENTINEL,
            )?;

            attempt_log.push_str(&format!("--- Attempt {attempt} ---\n{output}\n"));

            if sentinel_found {
                passed = true;
                break;
            }
        }

        write_step(&paths.step3_path, &attempt_log)?;

        if passed {
            job.status = JobStatus::Completed;
            self.emit(
                EventKind::Completed,
                job,
                format!("[{short}] done: {PASS_SENTINEL}"),
            );
        } else if interrupted {
            job.status = JobStatus::Failed;
            self.emit(
                EventKind::Failed,
                job,
                format!("[{short}] failed: worker stopped before completion"),
            );
        } else {
            job.status = JobStatus::Failed;
            self.emit(
                EventKind::Failed,
                job,
                format!("[{short}] failed: max attempts reached"),
            );
        }
        Ok(())
    }

    fn request(&self, job: &Job, instruction: String) -> ExecRequest {
        ExecRequest {
            workdir: job.project_root.clone(),
            instruction,
            timeout: self.config.exec_timeout(),
            output_limit_bytes: self.config.output_limit_bytes,
        }
    }

    fn emit(&self, kind: EventKind, job: &Job, payload: String) {
        self.events.emit(Event::new(kind, job.id, payload));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::job::JobKind;
    use crate::events::{EventStream, event_channel};
    use crate::io::executor::ExecError;
    use crate::test_support::{ScriptedExecutor, output_with_sentinel};
    use std::time::Duration;

    struct Fixture {
        engine: Engine<Arc<ScriptedExecutor>>,
        executor: Arc<ScriptedExecutor>,
        stream: EventStream,
        running: Arc<AtomicBool>,
        _temp: tempfile::TempDir,
        job: Job,
    }

    fn fixture(max_attempts: u32, responses: Vec<Result<String, ExecError>>) -> Fixture {
        let temp = tempfile::tempdir().expect("tempdir");
        let executor = Arc::new(ScriptedExecutor::new(responses));
        let (sink, stream) = event_channel();
        let running = Arc::new(AtomicBool::new(true));
        let config = PipelineConfig {
            max_attempts,
            poll_interval_ms: 20,
            ..PipelineConfig::default()
        };
        let engine = Engine::new(Arc::clone(&executor), config, sink, Arc::clone(&running));
        let job = Job::new(temp.path(), JobKind::Bug, "widget renders blank");
        Fixture {
            engine,
            executor,
            stream,
            running,
            _temp: temp,
            job,
        }
    }

    fn kinds(stream: &EventStream) -> Vec<EventKind> {
        stream.drain().iter().map(|e| e.kind).collect()
    }

    #[test]
    fn happy_path_emits_the_full_event_sequence() {
        // Stage 2 misses its sentinel (warning), stage 3 passes on the
        // second of two attempts.
        let mut fx = fixture(
            2,
            vec![
                Ok("analysis report".to_string()),
                Ok("tests, but no sentinel".to_string()),
                Ok("attempt one, no verdict".to_string()),
                Ok(output_with_sentinel("attempt two", "RESULT: PASS")),
            ],
        );

        fx.engine.process_job(&mut fx.job);

        assert_eq!(fx.job.status, JobStatus::Completed);
        assert_eq!(fx.executor.calls(), 4);
        assert_eq!(
            kinds(&fx.stream),
            vec![
                EventKind::Status(JobStatus::Running),
                EventKind::Step(Stage::Analyze),
                EventKind::StepComplete(Stage::Analyze),
                EventKind::Step(Stage::GenerateTests),
                EventKind::Warning(Stage::GenerateTests),
                EventKind::Step(Stage::Fix),
                EventKind::Attempt {
                    attempt: 1,
                    max_attempts: 2
                },
                EventKind::Attempt {
                    attempt: 2,
                    max_attempts: 2
                },
                EventKind::Completed,
            ]
        );

        let paths = JobPaths::new(&fx.job.project_root, fx.job.id);
        let step3 = std::fs::read_to_string(&paths.step3_path).expect("read step3");
        assert!(step3.contains("--- Attempt 1 ---"));
        assert!(step3.contains("--- Attempt 2 ---"));
        assert!(!step3.contains("--- Attempt 3 ---"));
    }

    #[test]
    fn stage_outputs_are_persisted_verbatim() {
        let mut fx = fixture(
            1,
            vec![
                Ok("the analysis".to_string()),
                Ok(output_with_sentinel("the tests", "RESULT: TESTS_WRITTEN")),
                Ok(output_with_sentinel("the fix", "RESULT: PASS")),
            ],
        );

        fx.engine.process_job(&mut fx.job);

        let paths = JobPaths::new(&fx.job.project_root, fx.job.id);
        assert_eq!(
            std::fs::read_to_string(&paths.step1_path).expect("step1"),
            "the analysis"
        );
        assert!(
            std::fs::read_to_string(&paths.step2_path)
                .expect("step2")
                .starts_with("the tests")
        );
        assert!(paths.tests_dir.is_dir());
    }

    #[test]
    fn stage_two_sentinel_present_completes_the_step() {
        let mut fx = fixture(
            1,
            vec![
                Ok("analysis".to_string()),
                Ok(output_with_sentinel("tests", "RESULT: TESTS_WRITTEN")),
                Ok(output_with_sentinel("fix", "RESULT: PASS")),
            ],
        );

        fx.engine.process_job(&mut fx.job);

        let observed = kinds(&fx.stream);
        assert!(observed.contains(&EventKind::StepComplete(Stage::GenerateTests)));
        assert!(!observed.contains(&EventKind::Warning(Stage::GenerateTests)));
    }

    #[test]
    fn stage_one_failure_aborts_without_touching_later_stages() {
        let mut fx = fixture(
            3,
            vec![Err(ExecError::Failed {
                exit_code: Some(2),
                stderr: "command not found".to_string(),
            })],
        );

        fx.engine.process_job(&mut fx.job);

        assert_eq!(fx.job.status, JobStatus::Failed);
        assert_eq!(fx.executor.calls(), 1);

        let events = fx.stream.drain();
        let error_events: Vec<_> = events
            .iter()
            .filter(|e| e.kind == EventKind::Error)
            .collect();
        assert_eq!(error_events.len(), 1);
        assert!(error_events[0].payload.contains("exit code 2"));
        assert!(error_events[0].payload.contains("command not found"));

        let paths = JobPaths::new(&fx.job.project_root, fx.job.id);
        assert!(!paths.step1_path.exists());
        assert!(!paths.step2_path.exists());
        assert!(!paths.step3_path.exists());
    }

    #[test]
    fn exhausted_attempts_fail_with_one_block_per_attempt() {
        // The second attempt prints an explicit FAIL sentinel; it must be
        // treated the same as no sentinel and must not end the loop early.
        let mut fx = fixture(
            3,
            vec![
                Ok("analysis".to_string()),
                Ok(output_with_sentinel("tests", "RESULT: TESTS_WRITTEN")),
                Ok("no verdict".to_string()),
                Ok(output_with_sentinel("still red", "RESULT: FAIL")),
                Ok("gave up silently".to_string()),
            ],
        );

        fx.engine.process_job(&mut fx.job);

        assert_eq!(fx.job.status, JobStatus::Failed);
        assert_eq!(fx.executor.calls(), 5);

        let events = fx.stream.drain();
        let attempts = events
            .iter()
            .filter(|e| matches!(e.kind, EventKind::Attempt { .. }))
            .count();
        assert_eq!(attempts, 3);
        let failed = events
            .iter()
            .find(|e| e.kind == EventKind::Failed)
            .expect("failed event");
        assert!(failed.payload.contains("max attempts reached"));

        let paths = JobPaths::new(&fx.job.project_root, fx.job.id);
        let step3 = std::fs::read_to_string(&paths.step3_path).expect("step3");
        assert_eq!(step3.matches("--- Attempt").count(), 3);
    }

    #[test]
    fn first_attempt_pass_stops_the_loop() {
        let mut fx = fixture(
            3,
            vec![
                Ok("analysis".to_string()),
                Ok(output_with_sentinel("tests", "RESULT: TESTS_WRITTEN")),
                Ok(output_with_sentinel("green", "RESULT: PASS")),
            ],
        );

        fx.engine.process_job(&mut fx.job);

        assert_eq!(fx.job.status, JobStatus::Completed);
        assert_eq!(fx.executor.calls(), 3);

        let paths = JobPaths::new(&fx.job.project_root, fx.job.id);
        let step3 = std::fs::read_to_string(&paths.step3_path).expect("step3");
        assert_eq!(step3.matches("--- Attempt").count(), 1);
    }

    #[test]
    fn executor_error_mid_attempt_aborts_remaining_attempts() {
        let mut fx = fixture(
            3,
            vec![
                Ok("analysis".to_string()),
                Ok(output_with_sentinel("tests", "RESULT: TESTS_WRITTEN")),
                Ok("no verdict".to_string()),
                Err(ExecError::TimedOut {
                    timeout: Duration::from_secs(1800),
                }),
            ],
        );

        fx.engine.process_job(&mut fx.job);

        assert_eq!(fx.job.status, JobStatus::Failed);
        assert_eq!(fx.executor.calls(), 4);

        let events = fx.stream.drain();
        assert!(events.iter().any(|e| {
            e.kind == EventKind::Error && e.payload.contains("timed out")
        }));
        assert!(!events.iter().any(|e| e.kind == EventKind::Failed));
    }

    #[test]
    fn status_never_moves_backward() {
        let mut fx = fixture(
            1,
            vec![
                Ok("analysis".to_string()),
                Ok("tests".to_string()),
                Ok("no verdict".to_string()),
            ],
        );
        assert_eq!(fx.job.status, JobStatus::Enqueued);

        fx.engine.process_job(&mut fx.job);
        assert!(fx.job.status.is_terminal());

        // Status events only ever announce RUNNING; terminal states arrive
        // as completed/failed/error events.
        let status_events: Vec<_> = fx
            .stream
            .drain()
            .into_iter()
            .filter(|e| matches!(e.kind, EventKind::Status(_)))
            .collect();
        assert_eq!(
            status_events.iter().map(|e| e.kind).collect::<Vec<_>>(),
            vec![EventKind::Status(JobStatus::Running)]
        );
    }

    #[test]
    fn cleared_running_flag_interrupts_the_attempt_loop() {
        let mut fx = fixture(
            5,
            vec![
                Ok("analysis".to_string()),
                Ok(output_with_sentinel("tests", "RESULT: TESTS_WRITTEN")),
            ],
        );
        fx.running.store(false, Ordering::SeqCst);

        fx.engine.process_job(&mut fx.job);

        // Stages 1 and 2 ran; no fix attempt was started.
        assert_eq!(fx.job.status, JobStatus::Failed);
        assert_eq!(fx.executor.calls(), 2);

        let events = fx.stream.drain();
        assert!(
            !events
                .iter()
                .any(|e| matches!(e.kind, EventKind::Attempt { .. }))
        );
        let failed = events
            .iter()
            .find(|e| e.kind == EventKind::Failed)
            .expect("failed event");
        assert!(failed.payload.contains("worker stopped"));

        // The attempt log is still written, empty.
        let paths = JobPaths::new(&fx.job.project_root, fx.job.id);
        assert_eq!(
            std::fs::read_to_string(&paths.step3_path).expect("step3"),
            ""
        );
    }

    #[test]
    fn worker_loop_processes_queued_jobs_then_exits_on_disconnect() {
        let fx = fixture(
            1,
            vec![
                Ok("analysis".to_string()),
                Ok(output_with_sentinel("tests", "RESULT: TESTS_WRITTEN")),
                Ok(output_with_sentinel("green", "RESULT: PASS")),
            ],
        );

        let (tx, rx) = std::sync::mpsc::channel();
        tx.send(fx.job.clone()).expect("send");
        drop(tx);

        fx.engine.worker_loop(rx);

        assert_eq!(fx.executor.calls(), 3);
        assert!(
            fx.stream
                .drain()
                .iter()
                .any(|e| e.kind == EventKind::Completed)
        );
    }
}
