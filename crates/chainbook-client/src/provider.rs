//! Provider detection and wrapping.
//!
//! The [`ProviderGateway`] turns "is a wallet capability available?"
//! into an explicit, memoized answer. Absence of a provider is a normal
//! outcome ([`ProviderResult::NotFound`]), never an error. Detection
//! runs once per application lifetime; [`ProviderGateway::discard`]
//! re-arms it for the explicit-disconnect case.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::connection::ProviderHandle;

// ---------------------------------------------------------------------------
// ProviderDetector
// ---------------------------------------------------------------------------

/// Environment probe for a wallet capability.
///
/// Implementations answer with `Some(handle)` when a wallet is
/// available and `None` otherwise. Detection has no failure mode: an
/// environment where probing itself breaks is an environment without a
/// wallet.
#[async_trait]
pub trait ProviderDetector: Send + Sync {
    /// Probes the environment once.
    async fn detect(&self) -> Option<ProviderHandle>;
}

// ---------------------------------------------------------------------------
// ProviderResult
// ---------------------------------------------------------------------------

/// Outcome of provider detection.
#[derive(Clone)]
pub enum ProviderResult {
    /// A wallet capability is available.
    Found(ProviderHandle),
    /// No wallet capability in this environment.
    NotFound,
}

impl ProviderResult {
    /// Returns the capability handle, if found.
    pub fn handle(&self) -> Option<&ProviderHandle> {
        match self {
            Self::Found(handle) => Some(handle),
            Self::NotFound => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ProviderGateway
// ---------------------------------------------------------------------------

/// Detects and wraps the wallet capability, memoizing the outcome.
pub struct ProviderGateway {
    detector: Box<dyn ProviderDetector>,
    detected: Mutex<Option<ProviderResult>>,
}

impl ProviderGateway {
    /// Creates a gateway over the given detector.
    pub fn new(detector: impl ProviderDetector + 'static) -> Self {
        Self {
            detector: Box::new(detector),
            detected: Mutex::new(None),
        }
    }

    /// Returns the detection outcome, probing at most once.
    ///
    /// Subsequent calls return the memoized result until
    /// [`discard`](Self::discard) is called.
    pub async fn detect(&self) -> ProviderResult {
        if let Some(result) = self.cached() {
            return result;
        }

        let result = match self.detector.detect().await {
            Some(handle) => {
                tracing::info!("wallet provider detected");
                ProviderResult::Found(handle)
            }
            None => {
                tracing::info!("no wallet provider in this environment");
                ProviderResult::NotFound
            }
        };

        if let Ok(mut detected) = self.detected.lock() {
            *detected = Some(result.clone());
        }
        result
    }

    /// Drops the memoized outcome so the next [`detect`](Self::detect)
    /// probes again. Used when the caller explicitly discards the
    /// provider (account disconnect).
    pub fn discard(&self) {
        if let Ok(mut detected) = self.detected.lock() {
            *detected = None;
        }
    }

    fn cached(&self) -> Option<ProviderResult> {
        self.detected.lock().ok()?.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
