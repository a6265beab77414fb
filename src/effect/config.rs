//! Configuration of an effect stream.
//!
//! An [`EffectConfig`] fixes two things for the lifetime of one effect
//! stream: how overlapping invocations are combined ([`ConcurrencyPolicy`])
//! and where isolated failures are reported ([`ErrorSink`]).
//!
//! # Examples
//!
//! ```rust
//! use effect_stream::effect::{ConcurrencyPolicy, EffectConfig};
//!
//! let config: EffectConfig<String> = EffectConfig::new()
//!     .preempt()
//!     .error_sink(|failure| eprintln!("lookup failed: {failure}"));
//! assert_eq!(config.policy(), ConcurrencyPolicy::Preempt);
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::error::{EffectFailure, ParsePolicyError};

/// Label written in front of every failure reported by the default sink.
pub const DEFAULT_ERROR_LABEL: &str = "effect handler failed";

// =============================================================================
// ConcurrencyPolicy
// =============================================================================

/// How invocations that overlap in time are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConcurrencyPolicy {
    /// Every invocation runs to completion and all outputs reach the result.
    #[default]
    Accumulate,
    /// Starting an invocation abandons the remaining output of the previous one.
    Preempt,
}

impl fmt::Display for ConcurrencyPolicy {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accumulate => formatter.write_str("accumulate"),
            Self::Preempt => formatter.write_str("preempt"),
        }
    }
}

impl FromStr for ConcurrencyPolicy {
    type Err = ParsePolicyError;

    /// Accepts `accumulate` / `merge` and `preempt` / `switch`, ignoring ASCII case.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "accumulate" | "merge" => Ok(Self::Accumulate),
            "preempt" | "switch" => Ok(Self::Preempt),
            _ => Err(ParsePolicyError {
                input: input.to_string(),
            }),
        }
    }
}

// =============================================================================
// ErrorSink
// =============================================================================

type SinkFunction<E> = dyn Fn(EffectFailure<E>) + Send + Sync;

/// Receives every failure isolated at an invocation boundary.
///
/// The sink is called once per failed invocation. An error produced by the
/// handler arrives unchanged inside [`EffectFailure::Error`]; the wrapper is
/// there so that a panic in the handler, which has no `E` value, can reach
/// the same sink as [`EffectFailure::Panic`] with the panic message.
///
/// The sink must not panic; a panicking sink unwinds through the stream.
pub struct ErrorSink<E> {
    report: Arc<SinkFunction<E>>,
}

impl<E: 'static> ErrorSink<E> {
    /// Creates a sink from a reporting function.
    pub fn new<F>(report: F) -> Self
    where
        F: Fn(EffectFailure<E>) + Send + Sync + 'static,
    {
        Self {
            report: Arc::new(report),
        }
    }

    /// Creates a sink that drops every failure.
    pub fn ignore() -> Self {
        Self::new(|_| {})
    }
}

impl<E> ErrorSink<E> {
    /// Reports one failure.
    pub fn report(&self, failure: EffectFailure<E>) {
        (self.report)(failure);
    }
}

impl<E: fmt::Debug + 'static> ErrorSink<E> {
    /// Creates the default sink, which logs through `tracing` at error level
    /// with the [`DEFAULT_ERROR_LABEL`] prefix.
    pub fn tracing() -> Self {
        Self::new(|failure: EffectFailure<E>| {
            tracing::error!(target: "effect_stream", "{DEFAULT_ERROR_LABEL}: {failure:?}");
        })
    }
}

impl<E> Clone for ErrorSink<E> {
    fn clone(&self) -> Self {
        Self {
            report: Arc::clone(&self.report),
        }
    }
}

impl<E: fmt::Debug + 'static> Default for ErrorSink<E> {
    fn default() -> Self {
        Self::tracing()
    }
}

impl<E> fmt::Debug for ErrorSink<E> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("ErrorSink").finish_non_exhaustive()
    }
}

// =============================================================================
// EffectConfig
// =============================================================================

/// Configuration of one effect stream.
///
/// - `policy`: [`ConcurrencyPolicy::Accumulate`] unless changed.
/// - `error_sink`: [`ErrorSink::tracing`] unless changed.
#[derive(Debug)]
pub struct EffectConfig<E> {
    policy: ConcurrencyPolicy,
    error_sink: ErrorSink<E>,
}

impl<E> Clone for EffectConfig<E> {
    fn clone(&self) -> Self {
        Self {
            policy: self.policy,
            error_sink: self.error_sink.clone(),
        }
    }
}

impl<E: fmt::Debug + 'static> EffectConfig<E> {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            policy: ConcurrencyPolicy::default(),
            error_sink: ErrorSink::tracing(),
        }
    }
}

impl<E: fmt::Debug + 'static> Default for EffectConfig<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EffectConfig<E> {
    /// Creates a configuration with an explicit policy and sink.
    pub const fn with_parts(policy: ConcurrencyPolicy, error_sink: ErrorSink<E>) -> Self {
        Self { policy, error_sink }
    }

    /// Returns the concurrency policy.
    pub const fn policy(&self) -> ConcurrencyPolicy {
        self.policy
    }

    /// Returns the error sink.
    pub const fn sink(&self) -> &ErrorSink<E> {
        &self.error_sink
    }

    pub(crate) fn into_parts(self) -> (ConcurrencyPolicy, ErrorSink<E>) {
        (self.policy, self.error_sink)
    }
}

impl<E: 'static> EffectConfig<E> {

    /// Sets the concurrency policy.
    #[must_use]
    pub fn policy_of(mut self, policy: ConcurrencyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Selects [`ConcurrencyPolicy::Accumulate`].
    #[must_use]
    pub fn accumulate(self) -> Self {
        self.policy_of(ConcurrencyPolicy::Accumulate)
    }

    /// Selects [`ConcurrencyPolicy::Preempt`].
    #[must_use]
    pub fn preempt(self) -> Self {
        self.policy_of(ConcurrencyPolicy::Preempt)
    }

    /// Selects [`ConcurrencyPolicy::Preempt`] when `switch` is `true`,
    /// [`ConcurrencyPolicy::Accumulate`] otherwise.
    #[must_use]
    pub fn switch(self, switch: bool) -> Self {
        if switch {
            self.preempt()
        } else {
            self.accumulate()
        }
    }

    /// Replaces the error sink with a reporting function.
    #[must_use]
    pub fn error_sink<F>(mut self, report: F) -> Self
    where
        F: Fn(EffectFailure<E>) + Send + Sync + 'static,
    {
        self.error_sink = ErrorSink::new(report);
        self
    }
}
