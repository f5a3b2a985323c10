//! Drives one image through decode, rasterize and trace, reporting progress.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use tokio::task;
use tracing::{debug, info, warn};

use crate::config::{InputLimits, PipelineSettings};
use crate::document::VectorDocument;
use crate::error::{DecodeError, VectorizeError, VectorizeResult};
use crate::input::{EncodedImage, RasterFormat, accept_bytes, accept_path};
use crate::invoker::TracingInvoker;
use crate::normalize::Normalizer;
use crate::progress::{Milestone, RunEvent, RunId, RunState};
use crate::vectorizer::RasterVectorizer;

const EVENT_CAPACITY: usize = 64;

/// Called once with the document of every run that completes while current.
pub type CompletionHandler = Arc<dyn Fn(RunId, &VectorDocument) + Send + Sync>;

/// Sequences normalization and tracing for each request.
///
/// Every call to [`Orchestrator::vectorize`] is a new run and becomes the
/// current one. An older run that is still in flight stops at its next step
/// boundary and returns [`VectorizeError::Superseded`] instead of a document.
pub struct Orchestrator<E> {
    normalizer: Normalizer,
    invoker: TracingInvoker<E>,
    limits: InputLimits,
    latest: Mutex<u64>,
    completing: Mutex<()>,
    events: broadcast::Sender<RunEvent>,
    on_complete: Option<CompletionHandler>,
}

impl<E> Orchestrator<E>
where
    E: RasterVectorizer + 'static,
{
    pub fn new(engine: E, settings: PipelineSettings) -> Self {
        Self::with_shared_engine(Arc::new(engine), settings)
    }

    pub fn with_shared_engine(engine: Arc<E>, settings: PipelineSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            normalizer: Normalizer::new(settings.limits.clone()),
            invoker: TracingInvoker::new(engine, settings.tracing)
                .with_timeout(settings.trace_timeout),
            limits: settings.limits,
            latest: Mutex::new(0),
            completing: Mutex::new(()),
            events,
            on_complete: None,
        }
    }

    /// Register the callback invoked when a current run completes.
    pub fn with_completion_handler(
        mut self,
        handler: impl Fn(RunId, &VectorDocument) + Send + Sync + 'static,
    ) -> Self {
        self.on_complete = Some(Arc::new(handler));
        self
    }

    /// Receive progress and outcome events of every subsequent run.
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.events.subscribe()
    }

    pub fn limits(&self) -> &InputLimits {
        &self.limits
    }

    /// Gate raw bytes and vectorize them. Oversized or unrecognized input is
    /// rejected before a run starts, so no events are published for it.
    pub async fn vectorize_bytes(
        &self,
        bytes: impl Into<Arc<[u8]>>,
        declared: Option<RasterFormat>,
    ) -> VectorizeResult<VectorDocument> {
        let encoded = accept_bytes(bytes, declared, &self.limits)?;
        self.vectorize(encoded).await
    }

    /// Gate a file on disk and vectorize it.
    pub async fn vectorize_path(&self, path: impl AsRef<Path>) -> VectorizeResult<VectorDocument> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let limits = self.limits.clone();
        let encoded = task::spawn_blocking(move || accept_path(&path, &limits))
            .await
            .map_err(|e| std::io::Error::other(e.to_string()))??;
        self.vectorize(encoded).await
    }

    /// Run the full pipeline for one already-gated image.
    pub async fn vectorize(&self, encoded: EncodedImage) -> VectorizeResult<VectorDocument> {
        let run = self.begin();
        debug!(run = %run.id, bytes = encoded.len(), format = %encoded.format(), "run started");
        let run = run.advance(RunState::Decoding, Milestone::Started)?;

        let normalizer = self.normalizer.clone();
        let decoded = match blocking(move || normalizer.decode(&encoded)).await {
            Ok(decoded) => decoded,
            Err(err) => return Err(run.fail(err.into())),
        };
        let run = run.advance(RunState::Decoding, Milestone::Decoded)?;

        let normalizer = self.normalizer.clone();
        let buffer = match blocking(move || normalizer.rasterize(decoded)).await {
            Ok(buffer) => buffer,
            Err(err) => return Err(run.fail(err.into())),
        };
        let run = run.advance(RunState::Tracing, Milestone::PreparedForTracing)?;

        match self.invoker.trace(buffer).await {
            Ok(document) => run.complete(document),
            Err(err) => Err(run.fail(err.into())),
        }
    }

    fn begin(&self) -> RunContext<'_> {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        *latest += 1;
        RunContext {
            id: RunId::new(*latest),
            state: RunState::Idle,
            percent: 0,
            latest: &self.latest,
            completing: &self.completing,
            events: &self.events,
            on_complete: self.on_complete.as_ref(),
        }
    }
}

async fn blocking<T, F>(f: F) -> Result<T, DecodeError>
where
    F: FnOnce() -> Result<T, DecodeError> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .map_err(|e| DecodeError::Task(e.to_string()))?
}

/// State of one in-flight run. Consumed by its terminal transition, so a run
/// can complete or fail at most once.
struct RunContext<'a> {
    id: RunId,
    state: RunState,
    percent: u8,
    latest: &'a Mutex<u64>,
    completing: &'a Mutex<()>,
    events: &'a broadcast::Sender<RunEvent>,
    on_complete: Option<&'a CompletionHandler>,
}

impl<'a> RunContext<'a> {
    fn is_current(&self) -> bool {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) == self.id.get()
    }

    fn publish(&self, event: RunEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn advance(mut self, state: RunState, milestone: Milestone) -> VectorizeResult<Self> {
        if !self.is_current() {
            return Err(self.supersede());
        }
        debug_assert!(self.state.can_advance_to(state));
        let percent = milestone.percent().max(self.percent);
        self.state = state;
        self.percent = percent;
        debug!(run = %self.id, ?state, percent, "{}", milestone.label());
        self.publish(RunEvent::Progress {
            run: self.id,
            state,
            milestone,
            percent,
        });
        Ok(self)
    }

    /// Completions are serialized on `completing`. The currency check holds
    /// `latest` only briefly, so a slow handler never blocks new runs from
    /// starting.
    fn complete(self, document: VectorDocument) -> VectorizeResult<VectorDocument> {
        let _completing = self.completing.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.is_current() {
            return Err(self.supersede());
        }

        self.publish(RunEvent::Progress {
            run: self.id,
            state: RunState::Complete,
            milestone: Milestone::Traced,
            percent: Milestone::Traced.percent(),
        });
        if let Some(handler) = self.on_complete {
            handler(self.id, &document);
        }
        self.publish(RunEvent::Completed {
            run: self.id,
            path_count: document.path_count(),
            color_count: document.color_count(),
        });

        info!(
            run = %self.id,
            paths = document.path_count(),
            colors = document.color_count(),
            bytes = document.len(),
            "vectorization complete"
        );
        Ok(document)
    }

    fn fail(self, err: VectorizeError) -> VectorizeError {
        if matches!(err, VectorizeError::Superseded { .. }) || !self.is_current() {
            return self.supersede();
        }
        info!(run = %self.id, kind = err.kind(), error = %err, "vectorization failed");
        self.publish(RunEvent::Failed {
            run: self.id,
            kind: err.kind(),
            message: err.to_string(),
        });
        err
    }

    fn supersede(self) -> VectorizeError {
        warn!(run = %self.id, state = ?self.state, "run superseded by a newer request");
        self.publish(RunEvent::Superseded { run: self.id });
        VectorizeError::Superseded { run: self.id }
    }
}
