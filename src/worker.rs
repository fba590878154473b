//! Background job worker.
//! Jobs go in over a crossbeam channel, events come back on another; the
//! caller's thread (a UI loop or the CLI) never blocks on matching work.
//! The worker owns nothing mutable that callers can see.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel as cb;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{EngineError, EngineWarning};
use crate::metrics::metric_names;
use crate::terms::attach::AttachTemplate;
use crate::terms::extract::ExtractionResult;
use crate::terms::glossary::Glossary;
use crate::terms::TermEngine;

#[derive(Debug, Clone)]
pub enum JobKind {
    Extract {
        glossary: Arc<Glossary>,
        text: String,
    },
    Attach {
        glossary: Arc<Glossary>,
        text: String,
        template: AttachTemplate,
    },
}

#[derive(Debug)]
struct Job {
    id: Uuid,
    kind: JobKind,
    enqueued_at: Instant,
}

#[derive(Debug, Clone)]
pub enum JobOutput {
    Extraction(ExtractionResult),
    Attachment(String),
}

/// Messages from the worker, each tagged with the job id.
#[derive(Debug, Clone)]
pub enum JobEvent {
    Started {
        id: Uuid,
    },
    Progress {
        id: Uuid,
        message: String,
    },
    Finished {
        id: Uuid,
        output: JobOutput,
        warnings: Vec<EngineWarning>,
    },
    Failed {
        id: Uuid,
        error: String,
    },
}

impl JobEvent {
    pub fn id(&self) -> Uuid {
        match self {
            JobEvent::Started { id }
            | JobEvent::Progress { id, .. }
            | JobEvent::Finished { id, .. }
            | JobEvent::Failed { id, .. } => *id,
        }
    }
}

/// Caller side of a running worker.
pub struct WorkerHandle {
    jobs: Option<cb::Sender<Job>>,
    events: cb::Receiver<JobEvent>,
    thread: Option<JoinHandle<()>>,
}

pub struct Worker;

impl Worker {
    /// Start the worker thread.
    pub fn spawn(engine: Arc<TermEngine>) -> Result<WorkerHandle, EngineError> {
        let (job_tx, job_rx) = cb::unbounded::<Job>();
        let (event_tx, event_rx) = cb::unbounded::<JobEvent>();

        let thread = std::thread::Builder::new()
            .name("term-worker".into())
            .spawn(move || {
                info!("term worker started");
                while let Ok(job) = job_rx.recv() {
                    handle_job(job, &engine, &event_tx);
                }
                info!("job channel closed, term worker exiting");
            })?;

        Ok(WorkerHandle {
            jobs: Some(job_tx),
            events: event_rx,
            thread: Some(thread),
        })
    }
}

impl WorkerHandle {
    /// Queue a job. Never blocks.
    pub fn submit(&self, kind: JobKind) -> Result<Uuid, EngineError> {
        let id = Uuid::new_v4();
        let job = Job {
            id,
            kind,
            enqueued_at: Instant::now(),
        };
        self.jobs
            .as_ref()
            .ok_or(EngineError::WorkerStopped)?
            .send(job)
            .map_err(|_| EngineError::WorkerStopped)?;
        Ok(id)
    }

    /// Event stream, for callers polling from their own loop.
    pub fn events(&self) -> &cb::Receiver<JobEvent> {
        &self.events
    }

    /// Block until job `id` finishes, passing its other events to `on_event`.
    pub fn wait_for(
        &self,
        id: Uuid,
        mut on_event: impl FnMut(&JobEvent),
    ) -> Result<(JobOutput, Vec<EngineWarning>), EngineError> {
        loop {
            let event = self.events.recv().map_err(|_| EngineError::WorkerStopped)?;
            if event.id() != id {
                on_event(&event);
                continue;
            }
            match event {
                JobEvent::Finished { output, warnings, .. } => return Ok((output, warnings)),
                JobEvent::Failed { error, .. } => return Err(EngineError::JobFailed(error)),
                other => on_event(&other),
            }
        }
    }

    /// Close the job channel and wait for the thread to drain and exit.
    pub fn shutdown(mut self) {
        self.jobs.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("term worker thread panicked");
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        // Closing the sender lets the thread exit; it is not joined here
        self.jobs.take();
    }
}

fn handle_job(job: Job, engine: &TermEngine, events: &cb::Sender<JobEvent>) {
    let Job { id, kind, enqueued_at } = job;
    let wait_us = enqueued_at.elapsed().as_micros() as f64;
    engine.metrics().record(metric_names::JOB_QUEUE_WAIT, wait_us);

    let emit = |event: JobEvent| {
        if events.send(event).is_err() {
            warn!(job = %id, "event receiver dropped");
        }
    };
    emit(JobEvent::Started { id });

    let started = Instant::now();
    let result = panic::catch_unwind(AssertUnwindSafe(|| run_job(id, kind, engine, &emit)));
    match result {
        Ok((output, warnings)) => {
            info!(
                job = %id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                warnings = warnings.len(),
                "job finished"
            );
            emit(JobEvent::Finished { id, output, warnings });
        }
        Err(_) => {
            error!(job = %id, "job panicked");
            emit(JobEvent::Failed {
                id,
                error: "job panicked".to_string(),
            });
        }
    }
}

fn run_job(
    id: Uuid,
    kind: JobKind,
    engine: &TermEngine,
    emit: &dyn Fn(JobEvent),
) -> (JobOutput, Vec<EngineWarning>) {
    let progress = |message: String| emit(JobEvent::Progress { id, message });
    match kind {
        JobKind::Extract { glossary, text } => {
            progress(format!("matching {} terms against {} bytes", glossary.len(), text.len()));
            let report = engine.extract(&glossary, &text);
            progress(format!("found {} distinct terms", report.value.len()));
            (JobOutput::Extraction(report.value), report.warnings)
        }
        JobKind::Attach {
            glossary,
            text,
            template,
        } => {
            progress(format!("attaching translations with '{template}'"));
            let report = engine.attach(&glossary, &text, &template);
            (JobOutput::Attachment(report.value), report.warnings)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terms::glossary::HeaderMode;
    use crate::terms::lemma::LemmaStore;
    use crate::terms::EngineOptions;

    fn handle() -> WorkerHandle {
        let engine = TermEngine::new(
            Arc::new(LemmaStore::builtin()),
            EngineOptions {
                detect_language: false,
                ..EngineOptions::default()
            },
        );
        Worker::spawn(Arc::new(engine)).unwrap()
    }

    fn glossary() -> Arc<Glossary> {
        Arc::new(Glossary::from_rows([["fireball", "火球术"]], HeaderMode::Absent).unwrap())
    }

    #[test]
    fn extract_job_reports_progress_then_result() {
        let worker = handle();
        let id = worker
            .submit(JobKind::Extract {
                glossary: glossary(),
                text: "Two fireballs hit the wall.".into(),
            })
            .unwrap();

        let mut seen = Vec::new();
        let (output, warnings) = worker.wait_for(id, |e| seen.push(e.clone())).unwrap();
        assert!(matches!(seen.first(), Some(JobEvent::Started { .. })));
        assert!(seen.iter().any(|e| matches!(e, JobEvent::Progress { .. })));
        assert!(warnings.is_empty());
        match output {
            JobOutput::Extraction(result) => {
                assert_eq!(result.source_terms().collect::<Vec<_>>(), ["fireball"])
            }
            other => panic!("unexpected output {other:?}"),
        }
        worker.shutdown();
    }

    #[test]
    fn jobs_complete_in_submission_order() {
        let worker = handle();
        let first = worker
            .submit(JobKind::Attach {
                glossary: glossary(),
                text: "fireball".into(),
                template: AttachTemplate::default(),
            })
            .unwrap();
        let second = worker
            .submit(JobKind::Attach {
                glossary: glossary(),
                text: "no match".into(),
                template: AttachTemplate::default(),
            })
            .unwrap();

        let mut finished = Vec::new();
        while finished.len() < 2 {
            if let JobEvent::Finished { id, output, .. } = worker.events().recv().unwrap() {
                finished.push((id, output));
            }
        }
        assert_eq!(finished[0].0, first);
        assert_eq!(finished[1].0, second);
        assert!(matches!(&finished[0].1, JobOutput::Attachment(s) if s == "fireball 火球术"));
        assert!(matches!(&finished[1].1, JobOutput::Attachment(s) if s == "no match"));
        worker.shutdown();
    }
}
