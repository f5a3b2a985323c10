//! Runs a vectorization engine off the async executor and validates its output.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task;
use tracing::{debug, warn};

use crate::config::TracingConfig;
use crate::document::VectorDocument;
use crate::error::TracingError;
use crate::normalize::PixelBuffer;
use crate::vectorizer::RasterVectorizer;

/// Hands pixel buffers to a [`RasterVectorizer`] with a fixed profile.
pub struct TracingInvoker<E> {
    engine: Arc<E>,
    config: Arc<TracingConfig>,
    timeout: Option<Duration>,
}

impl<E> Clone for TracingInvoker<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            config: Arc::clone(&self.config),
            timeout: self.timeout,
        }
    }
}

impl<E> TracingInvoker<E>
where
    E: RasterVectorizer + 'static,
{
    pub fn new(engine: Arc<E>, config: TracingConfig) -> Self {
        Self {
            engine,
            config: Arc::new(config),
            timeout: None,
        }
    }

    /// Stop waiting for the engine after `timeout`. The engine thread itself
    /// keeps running until it returns; its result is discarded.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn config(&self) -> &TracingConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Trace `buffer` and return the validated document.
    pub async fn trace(&self, buffer: PixelBuffer) -> Result<VectorDocument, TracingError> {
        let engine = Arc::clone(&self.engine);
        let config = Arc::clone(&self.config);
        let (width, height) = buffer.dimensions();
        let started = Instant::now();

        let handle = task::spawn_blocking(move || engine.vectorize(&buffer, &config));
        let joined = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    let elapsed = started.elapsed();
                    warn!(width, height, elapsed_ms = elapsed.as_millis() as u64, "tracing timed out");
                    return Err(TracingError::Timeout { elapsed });
                }
            },
            None => handle.await,
        };

        let svg = joined.map_err(|e| TracingError::Task(e.to_string()))??;
        let document = VectorDocument::parse(svg)?;
        debug!(
            width,
            height,
            paths = document.path_count(),
            colors = document.color_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "traced pixel buffer"
        );
        Ok(document)
    }
}
