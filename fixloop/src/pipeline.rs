//! Pipeline lifecycle: intake queue, worker thread, start/stop/submit.
//!
//! Two execution contexts meet here. The caller's thread submits jobs and
//! drains events; the worker thread runs the [`Engine`]. They are connected
//! only by the two one-directional queues — no other state is shared, and a
//! job belongs exclusively to the worker once submitted.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow, ensure};
use tracing::{debug, info, warn};

use crate::core::event::{Event, EventKind};
use crate::core::job::Job;
use crate::engine::Engine;
use crate::events::{EventSink, EventStream, event_channel};
use crate::io::config::PipelineConfig;
use crate::io::executor::Executor;

/// Owns the worker thread and the queues connecting it to the caller.
pub struct Pipeline<E> {
    config: PipelineConfig,
    intake_tx: Sender<Job>,
    intake_rx: Option<Receiver<Job>>,
    events: EventSink,
    stream: EventStream,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    executor: Option<E>,
}

impl<E: Executor + Send + 'static> Pipeline<E> {
    pub fn new(executor: E, config: PipelineConfig) -> Self {
        let (intake_tx, intake_rx) = mpsc::channel();
        let (events, stream) = event_channel();
        Self {
            config,
            intake_tx,
            intake_rx: Some(intake_rx),
            events,
            stream,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
            executor: Some(executor),
        }
    }

    /// Spin up the worker thread. Calling `start` while the pipeline is
    /// already running is a no-op. A stopped pipeline cannot be restarted;
    /// build a new one.
    pub fn start(&mut self) {
        if self.running.load(Ordering::SeqCst) {
            debug!("pipeline already running");
            return;
        }
        let (Some(executor), Some(intake_rx)) = (self.executor.take(), self.intake_rx.take())
        else {
            warn!("pipeline already stopped, refusing to restart");
            return;
        };

        self.running.store(true, Ordering::SeqCst);
        let engine = Engine::new(
            executor,
            self.config.clone(),
            self.events.clone(),
            Arc::clone(&self.running),
        );
        self.worker = Some(thread::spawn(move || engine.worker_loop(intake_rx)));
        info!("pipeline started");
    }

    /// True while the worker thread is live.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
            && self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Enqueue a job for processing.
    ///
    /// Safe to call from any thread, before or after `start`. The project
    /// root must exist at submission time. The `enqueued` event is emitted
    /// synchronously, before the job can reach the worker, so it always
    /// precedes that job's `status` event.
    pub fn submit(&self, job: Job) -> Result<()> {
        ensure!(
            job.project_root.is_dir(),
            "project root {} does not exist",
            job.project_root.display()
        );

        let event = Event::new(
            EventKind::Enqueued,
            job.id,
            format!("[{}] enqueued", job.short_id()),
        );
        self.events.emit(event);
        self.intake_tx
            .send(job)
            .map_err(|_| anyhow!("intake queue closed, pipeline worker is gone"))?;
        Ok(())
    }

    /// Take all pending events without blocking, in emission order.
    pub fn drain_events(&self) -> Vec<Event> {
        self.stream.drain()
    }

    /// Signal the worker to stop and wait for it to exit.
    ///
    /// The in-flight job, if any, finishes its current external invocation
    /// and stops at the next attempt boundary; no further jobs are dequeued.
    /// Waits up to the configured stop timeout, then detaches the thread
    /// rather than blocking forever. Idempotent.
    pub fn stop(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };
        info!("stopping pipeline");
        self.running.store(false, Ordering::SeqCst);

        let deadline = Instant::now() + self.config.stop_timeout();
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        if handle.is_finished() {
            let _ = handle.join();
            info!("pipeline stopped");
        } else {
            // The flag stays cleared, so a detached worker still exits at
            // its next poll or attempt boundary.
            warn!(
                timeout_secs = self.config.stop_timeout().as_secs(),
                "worker did not exit in time, detaching"
            );
        }
    }
}

impl<E> Drop for Pipeline<E> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
