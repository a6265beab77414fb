//! Error types for the effect combinator.
//!
//! Handler-originated failures never terminate an effect stream. They are
//! captured at the invocation boundary as an [`EffectFailure`] and handed to
//! the configured [`ErrorSink`](crate::effect::ErrorSink).

use std::any::Any;

/// A failure captured while running one handler invocation.
///
/// `Error` carries the handler's own failure value, unwrapped: whatever the
/// handler returned as `Err`, whatever a deferred outcome rejected with, or
/// whatever a producer step failed with. `Panic` carries the message of a
/// panic raised by the handler or by polling its outcome.
///
/// # Examples
///
/// ```rust
/// use effect_stream::effect::EffectFailure;
///
/// let failure: EffectFailure<&str> = EffectFailure::Error("boom");
/// assert_eq!(format!("{failure}"), "boom");
///
/// let panic: EffectFailure<&str> = EffectFailure::Panic("index out of bounds".to_string());
/// assert_eq!(format!("{panic}"), "handler panicked: index out of bounds");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectFailure<E> {
    /// The handler failed with its own error value.
    Error(E),
    /// The handler panicked. Holds the panic message when it was a string.
    Panic(String),
}

impl<E> EffectFailure<E> {
    /// Builds a `Panic` failure from a payload caught by `catch_unwind`.
    pub(crate) fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(string) = payload.downcast_ref::<&str>() {
            (*string).to_string()
        } else if let Some(string) = payload.downcast_ref::<String>() {
            string.clone()
        } else {
            "unknown panic".to_string()
        };
        Self::Panic(message)
    }

    /// Returns `true` if the handler panicked.
    pub const fn is_panic(&self) -> bool {
        matches!(self, Self::Panic(_))
    }

    /// Returns a reference to the handler's error value, if any.
    pub const fn as_error(&self) -> Option<&E> {
        match self {
            Self::Error(error) => Some(error),
            Self::Panic(_) => None,
        }
    }

    /// Consumes the failure and returns the handler's error value, if any.
    pub fn into_error(self) -> Option<E> {
        match self {
            Self::Error(error) => Some(error),
            Self::Panic(_) => None,
        }
    }
}

impl<E: std::fmt::Display> std::fmt::Display for EffectFailure<E> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error(error) => write!(formatter, "{error}"),
            Self::Panic(message) => write!(formatter, "handler panicked: {message}"),
        }
    }
}

impl<E> std::error::Error for EffectFailure<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Error(error) => Some(error),
            Self::Panic(_) => None,
        }
    }
}

/// Returned when a string does not name a known
/// [`ConcurrencyPolicy`](crate::effect::ConcurrencyPolicy).
///
/// # Examples
///
/// ```rust
/// use effect_stream::effect::{ConcurrencyPolicy, ParsePolicyError};
///
/// let error = "parallel".parse::<ConcurrencyPolicy>().unwrap_err();
/// assert_eq!(
///     format!("{error}"),
///     "unknown concurrency policy `parallel`: expected one of accumulate, merge, preempt, switch"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePolicyError {
    /// The rejected input.
    pub input: String,
}

impl std::fmt::Display for ParsePolicyError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "unknown concurrency policy `{}`: expected one of accumulate, merge, preempt, switch",
            self.input
        )
    }
}

impl std::error::Error for ParsePolicyError {}
