//! Effect combinator for async streams.
//!
//! An effect stream calls a user-supplied handler for each event of an input
//! stream and merges everything the handlers produce into one output stream.
//!
//! # Handler Results
//!
//! A handler may return any of the shapes listed in [`Outcome`]:
//!
//! - nothing, one value, or a collection of values, emitted immediately
//! - a deferred value that resolves later to any of the above
//! - an incremental producer that yields any of the above step by step
//! - a failure
//!
//! Plain values convert through [`IntoOutcome`], so `Option<O>`, `Vec<O>`,
//! `()` and `Result<_, E>` of those work without wrapping.
//!
//! # Failure Isolation
//!
//! A failing or panicking invocation is reported to the configured
//! [`ErrorSink`] and contributes no further output. The output stream keeps
//! running. Only a failure of the input stream itself ends the output stream
//! with an error (see [`EffectExt::try_effect`]).
//!
//! # Concurrency
//!
//! Invocations overlap when a handler result takes time to complete. The
//! [`ConcurrencyPolicy`] decides what happens then: `Accumulate` keeps every
//! invocation, `Preempt` abandons the previous one whenever a new event
//! arrives.
//!
//! # Examples
//!
//! ```rust
//! use effect_stream::effect::{EffectConfig, EffectExt, Emit, Outcome};
//! use futures::{StreamExt, stream};
//!
//! # futures::executor::block_on(async {
//! let config: EffectConfig<String> = EffectConfig::new();
//! let words: Vec<String> = stream::iter(vec!["abc"])
//!     .effect(
//!         |word: &str| {
//!             let chars: Vec<String> = word.chars().map(String::from).collect();
//!             Outcome::producer(stream::iter(chars.into_iter().map(|c| Ok(Emit::One(c)))))
//!         },
//!         config,
//!     )
//!     .collect()
//!     .await;
//! assert_eq!(words, vec!["a", "b", "c"]);
//! # });
//! ```

// =============================================================================
// Handler Results
// =============================================================================

mod outcome;

pub use outcome::{Deferred, Emit, EmitIter, IntoOutcome, Outcome, OutcomeKind, Producer};

// =============================================================================
// Configuration and Failures
// =============================================================================

mod config;
mod error;

pub use config::{ConcurrencyPolicy, DEFAULT_ERROR_LABEL, EffectConfig, ErrorSink};
pub use error::{EffectFailure, ParsePolicyError};

// =============================================================================
// Invocation Pipeline
// =============================================================================

mod invocation;
mod isolate;
mod normalize;

pub use isolate::Isolated;
pub use normalize::Normalized;

// =============================================================================
// Combinators
// =============================================================================

mod ext;
mod raw;
mod scheduler;

pub use ext::EffectExt;
pub use raw::{RawEffect, RawInput};
pub use scheduler::{Effect, NeverFails, TryEffect};

// =============================================================================
// Static Assertions
// =============================================================================

static_assertions::assert_impl_all!(ConcurrencyPolicy: Send, Sync, Copy);
static_assertions::assert_impl_all!(ErrorSink<String>: Send, Sync, Clone);
static_assertions::assert_impl_all!(EffectConfig<String>: Send, Sync, Clone);
static_assertions::assert_impl_all!(Outcome<i32, String>: Send);
static_assertions::assert_impl_all!(RawInput<i32>: Send, Sync);
