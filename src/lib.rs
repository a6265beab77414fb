//! # effect-stream
//!
//! An effect combinator for async streams.
//!
//! ## Overview
//!
//! An effect stream turns every event of an input [`Stream`](futures::Stream)
//! into one invocation of a handler and merges all handler output into a
//! single stream:
//!
//! - **Result classification**: handlers return a value, a collection, a
//!   deferred value, an incremental producer, or a failure
//! - **Failure isolation**: a failed invocation is reported and skipped while
//!   the stream keeps running
//! - **Concurrency policies**: keep every overlapping invocation, or let the
//!   newest one preempt the previous
//! - **Raw mode**: one invocation that consumes the whole input stream
//!
//! ## Example
//!
//! ```rust
//! use effect_stream::prelude::*;
//! use futures::{StreamExt, stream};
//!
//! # futures::executor::block_on(async {
//! let config: EffectConfig<String> = EffectConfig::new();
//! let next: Vec<u32> = stream::iter(vec![1_u32])
//!     .effect(|id| Some(id + 1), config)
//!     .collect()
//!     .await;
//! assert_eq!(next, vec![2]);
//! # });
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// Note: Disabling redundant_closure_for_method_calls due to clippy 0.1.92 panic bug
#![allow(clippy::redundant_closure_for_method_calls)]

/// Prelude module for convenient imports.
///
/// Re-exports commonly used types and traits.
///
/// # Usage
///
/// ```rust
/// use effect_stream::prelude::*;
/// ```
pub mod prelude {
    pub use crate::effect::{
        ConcurrencyPolicy, EffectConfig, EffectExt, EffectFailure, Emit, ErrorSink, IntoOutcome,
        Outcome, RawInput,
    };
}

pub mod effect;
