//! Single-flight text recognition around an external engine.
//!
//! The pipeline preprocesses the composite, encodes it as PNG and hands it
//! to a backend that runs the engine off the UI thread. Results come back
//! over a channel drained by [`RecognitionPipeline::poll`] once per frame.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use image::RgbaImage;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::export::{self, ExportError, ExportFormat};
use crate::preprocess;

#[cfg(not(target_arch = "wasm32"))]
pub mod tesseract;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub const NO_TEXT_PLACEHOLDER: &str = "No text detected in the image.";
pub const ERROR_TEXT: &str = "Error: Could not extract text from image.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recognition {
    pub text: String,
    /// Mean confidence in [0, 100].
    pub confidence: f32,
}

/// Advisory progress of the job in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub phase: String,
    pub fraction: f32,
}

impl Progress {
    pub fn new(phase: impl Into<String>, fraction: f32) -> Self {
        Self {
            phase: phase.into(),
            fraction: fraction.clamp(0.0, 1.0),
        }
    }

    /// Engine-reported progress mapped into the recognition band of the job.
    pub fn recognizing(engine_fraction: f32) -> Self {
        let engine_fraction = engine_fraction.clamp(0.0, 1.0);
        Self::new(
            format!("Recognizing text... {}%", (engine_fraction * 100.0).round()),
            0.2 + engine_fraction * 0.7,
        )
    }
}

#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("recognition is already in progress")]
    Busy,
    #[error("failed to encode image for recognition: {0}")]
    Encode(#[from] ExportError),
    #[error("failed to start recognition worker: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("recognition engine failed: {0}")]
    Engine(String),
    #[error("recognition worker stopped without a result")]
    Disconnected,
}

#[derive(Debug)]
pub enum RecognitionEvent {
    Progress { job: Uuid, progress: Progress },
    Finished { job: Uuid, result: Result<Recognition, RecognitionError> },
}

/// Forwards engine progress for one job.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    job: Uuid,
    events: Sender<RecognitionEvent>,
}

impl ProgressSink {
    pub fn report(&self, progress: Progress) {
        let _ = self.events.send(RecognitionEvent::Progress { job: self.job, progress });
    }
}

/// Completion handle of a job. Dropping it unfinished reports
/// [`RecognitionError::Disconnected`], so the pipeline never stays busy.
#[derive(Debug)]
pub struct Reporter {
    sink: ProgressSink,
    finished: bool,
}

impl Reporter {
    fn new(job: Uuid, events: Sender<RecognitionEvent>) -> Self {
        Self {
            sink: ProgressSink { job, events },
            finished: false,
        }
    }

    pub fn job(&self) -> Uuid {
        self.sink.job
    }

    pub fn progress_sink(&self) -> ProgressSink {
        self.sink.clone()
    }

    pub fn progress(&self, progress: Progress) {
        self.sink.report(progress);
    }

    pub fn finish(mut self, result: Result<Recognition, RecognitionError>) {
        self.finished = true;
        let _ = self.sink.events.send(RecognitionEvent::Finished { job: self.sink.job, result });
    }
}

impl Drop for Reporter {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.sink.events.send(RecognitionEvent::Finished {
                job: self.sink.job,
                result: Err(RecognitionError::Disconnected),
            });
        }
    }
}

/// Blocking engine: PNG bytes in, recognized text out.
pub trait RecognitionEngine: Send + Sync {
    fn name(&self) -> &str;

    fn recognize(&self, png: &[u8], progress: &ProgressSink) -> Result<Recognition, RecognitionError>;
}

/// Starts a job somewhere off the UI thread and reports through `reporter`.
pub trait RecognitionBackend {
    fn start(&self, png: Vec<u8>, reporter: Reporter) -> Result<(), RecognitionError>;
}

/// Runs a blocking engine on a fresh worker thread per job.
pub struct ThreadedBackend<E> {
    engine: Arc<E>,
}

impl<E: RecognitionEngine + 'static> ThreadedBackend<E> {
    pub fn new(engine: E) -> Self {
        Self { engine: Arc::new(engine) }
    }
}

impl<E: RecognitionEngine + 'static> RecognitionBackend for ThreadedBackend<E> {
    fn start(&self, png: Vec<u8>, reporter: Reporter) -> Result<(), RecognitionError> {
        let engine = Arc::clone(&self.engine);
        thread::Builder::new()
            .name("ocr-worker".into())
            .spawn(move || {
                let sink = reporter.progress_sink();
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| engine.recognize(&png, &sink)));
                let result = outcome.unwrap_or_else(|_| {
                    Err(RecognitionError::Engine(format!("{} engine panicked", engine.name())))
                });
                reporter.finish(result);
            })
            .map(|_| ())
            .map_err(RecognitionError::Spawn)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceGrade {
    High,
    Medium,
    Low,
}

impl ConfidenceGrade {
    pub fn from_percent(confidence: u32) -> Self {
        match confidence {
            80.. => ConfidenceGrade::High,
            60.. => ConfidenceGrade::Medium,
            _ => ConfidenceGrade::Low,
        }
    }
}

/// What the shell shows for a finished job.
#[derive(Debug, Clone, PartialEq)]
pub struct Presentation {
    pub text: String,
    pub confidence: u32,
    pub grade: ConfidenceGrade,
    pub word_count: usize,
}

impl Presentation {
    pub fn new(recognition: &Recognition) -> Self {
        let trimmed = recognition.text.trim();
        let confidence = recognition.confidence.clamp(0.0, 100.0).round() as u32;
        Self {
            text: if trimmed.is_empty() {
                NO_TEXT_PLACEHOLDER.to_string()
            } else {
                trimmed.to_string()
            },
            confidence,
            grade: ConfidenceGrade::from_percent(confidence),
            word_count: trimmed.split_whitespace().count(),
        }
    }

    pub fn failed() -> Self {
        Self {
            text: ERROR_TEXT.to_string(),
            confidence: 0,
            grade: ConfidenceGrade::Low,
            word_count: 0,
        }
    }

    pub fn has_text(&self) -> bool {
        self.word_count > 0
    }
}

/// Text worth copying or saving: `None` for blanks and the placeholder.
pub fn exportable_text(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == NO_TEXT_PLACEHOLDER {
        None
    } else {
        Some(trimmed)
    }
}

/// Orchestrates at most one recognition job at a time.
pub struct RecognitionPipeline {
    backend: Box<dyn RecognitionBackend>,
    events_tx: Sender<RecognitionEvent>,
    events_rx: Receiver<RecognitionEvent>,
    in_flight: Option<Uuid>,
    progress: Option<Progress>,
}

impl RecognitionPipeline {
    pub fn new(backend: Box<dyn RecognitionBackend>) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            backend,
            events_tx,
            events_rx,
            in_flight: None,
            progress: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn progress(&self) -> Option<&Progress> {
        self.progress.as_ref()
    }

    /// Start recognizing `composite`. Rejected with `Busy` while another
    /// job is outstanding; the job in flight is not affected.
    pub fn submit(&mut self, composite: &RgbaImage) -> Result<Uuid, RecognitionError> {
        if self.is_busy() {
            warn!("recognition requested while a job is in flight");
            return Err(RecognitionError::Busy);
        }

        let (processed, inverted) = preprocess::preprocess(composite);
        let png = export::encode(&processed, ExportFormat::Png, 1.0)?;

        let job = Uuid::new_v4();
        self.in_flight = Some(job);
        self.progress = Some(Progress::new("Starting text recognition...", 0.2));
        info!(
            "recognition job {job} started ({}x{}, inverted: {inverted})",
            composite.width(),
            composite.height()
        );

        if let Err(e) = self
            .backend
            .start(png, Reporter::new(job, self.events_tx.clone()))
        {
            self.in_flight = None;
            self.progress = None;
            return Err(e);
        }
        Ok(job)
    }

    /// Drain pending events. Returns the result once the job in flight
    /// finishes; events of stale jobs are dropped.
    pub fn poll(&mut self) -> Option<Result<Recognition, RecognitionError>> {
        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                RecognitionEvent::Progress { job, progress } if Some(job) == self.in_flight => {
                    self.progress = Some(progress);
                }
                RecognitionEvent::Finished { job, result } if Some(job) == self.in_flight => {
                    self.in_flight = None;
                    self.progress = None;
                    match &result {
                        Ok(r) => info!("recognition job {job} finished ({:.0}% confidence)", r.confidence),
                        Err(e) => warn!("recognition job {job} failed: {e}"),
                    }
                    return Some(result);
                }
                RecognitionEvent::Progress { job, .. } | RecognitionEvent::Finished { job, .. } => {
                    debug!("dropping event of stale recognition job {job}");
                }
            }
        }
        None
    }
}
