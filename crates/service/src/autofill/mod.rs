//! Text-to-record extraction behind a single-flight gate.

pub mod gemini;

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use models::PartialRecord;
use thiserror::Error;
use tracing::{debug, warn};

pub use gemini::GeminiExtractor;

pub const NO_DATA_MESSAGE: &str = "No details found in the text.";
pub const FAILED_MESSAGE: &str = "Could not extract data. Check your connection and try again.";
pub const BUSY_MESSAGE: &str = "Autofill is already running.";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AutofillError {
    #[error("autofill is not configured: missing API key")]
    NotConfigured,
    #[error("autofill request failed: {0}")]
    Request(String),
    #[error("autofill response invalid: {0}")]
    InvalidResponse(String),
}

/// Free text in, partial record out. `Ok(None)` means the text held nothing usable.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<Option<PartialRecord>, AutofillError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutofillOutcome {
    Filled(PartialRecord),
    NoData,
    Failed(String),
    Busy,
}

impl AutofillOutcome {
    /// Feedback line for the user; `None` when the form was filled.
    pub fn message(&self) -> Option<&'static str> {
        match self {
            AutofillOutcome::Filled(_) => None,
            AutofillOutcome::NoData => Some(NO_DATA_MESSAGE),
            AutofillOutcome::Failed(_) => Some(FAILED_MESSAGE),
            AutofillOutcome::Busy => Some(BUSY_MESSAGE),
        }
    }
}

/// Allows one outstanding extraction at a time.
#[derive(Debug, Default)]
pub struct AutofillGate {
    busy: AtomicBool,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl AutofillGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub async fn try_run(&self, extractor: &dyn Extractor, text: &str) -> AutofillOutcome {
        if text.trim().is_empty() {
            return AutofillOutcome::NoData;
        }
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("autofill rejected: call already outstanding");
            return AutofillOutcome::Busy;
        }
        let _guard = BusyGuard(&self.busy);

        match extractor.extract(text).await {
            Ok(Some(partial)) if !partial.is_empty() => AutofillOutcome::Filled(partial),
            Ok(_) => AutofillOutcome::NoData,
            Err(e) => {
                warn!(error = %e, "autofill extraction failed");
                AutofillOutcome::Failed(e.to_string())
            }
        }
    }
}
