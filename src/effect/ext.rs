//! Entry points of the effect combinator.

use futures::stream::Stream;

use super::config::EffectConfig;
use super::outcome::IntoOutcome;
use super::raw::{RawEffect, RawInput};
use super::scheduler::{Effect, TryEffect};

/// Extension trait adding the effect combinators to every [`Stream`].
///
/// # Examples
///
/// ```rust
/// use effect_stream::effect::{EffectConfig, EffectExt};
/// use futures::{StreamExt, stream};
///
/// # futures::executor::block_on(async {
/// let config: EffectConfig<String> = EffectConfig::new();
/// let ids: Vec<u32> = stream::iter(vec![1_u32, 2])
///     .effect(|id| Some(id + 1), config)
///     .collect()
///     .await;
/// assert_eq!(ids, vec![2, 3]);
/// # });
/// ```
pub trait EffectExt: Stream {
    /// Calls `handler` once per input event and merges the outputs of all
    /// invocations into one stream.
    ///
    /// The handler may return anything implementing [`IntoOutcome`]: a single
    /// value, a collection, nothing, a `Result`, or an explicit
    /// [`Outcome`](super::Outcome) describing a deferred value or an
    /// incremental producer. Failures of an invocation are reported to the
    /// configured [`ErrorSink`](super::ErrorSink) and never end the stream.
    fn effect<F, R, O, E>(self, handler: F, config: EffectConfig<E>) -> Effect<Self, F, O, E>
    where
        Self: Sized,
        F: FnMut(Self::Item) -> R,
        R: IntoOutcome<O, E>,
    {
        Effect::new(self, handler, config)
    }

    /// Like [`effect`](EffectExt::effect), for an input stream that can fail.
    ///
    /// An `Err` from the input ends the output stream with that error after
    /// every running invocation has been abandoned.
    fn try_effect<T, U, F, R, O, E>(
        self,
        handler: F,
        config: EffectConfig<E>,
    ) -> TryEffect<Self, F, O, E>
    where
        Self: Stream<Item = Result<T, U>> + Sized,
        F: FnMut(T) -> R,
        R: IntoOutcome<O, E>,
    {
        TryEffect::new(self, handler, config)
    }

    /// Calls `handler` exactly once with the whole input stream.
    ///
    /// The configured policy has no effect here; there is only one invocation.
    /// Every input item is handed to the handler as is, so an `Err` item of a
    /// fallible input does not end anything; use
    /// [`try_raw_effect`](EffectExt::try_raw_effect) for that.
    fn raw_effect<F, R, O, E>(
        self,
        handler: F,
        config: EffectConfig<E>,
    ) -> RawEffect<Self, Self::Item, F, O, E>
    where
        Self: Sized,
        F: FnOnce(RawInput<Self::Item>) -> R,
        R: IntoOutcome<O, E>,
    {
        RawEffect::new(self, handler, config, |_| false)
    }

    /// Like [`raw_effect`](EffectExt::raw_effect), for an input stream that
    /// can fail.
    ///
    /// The first `Err` is delivered to the handler as the last input item;
    /// the input stream is dropped right after it and [`RawInput`] reports the
    /// end of input once its backlog is taken.
    fn try_raw_effect<T, U, F, R, O, E>(
        self,
        handler: F,
        config: EffectConfig<E>,
    ) -> RawEffect<Self, Result<T, U>, F, O, E>
    where
        Self: Stream<Item = Result<T, U>> + Sized,
        F: FnOnce(RawInput<Result<T, U>>) -> R,
        R: IntoOutcome<O, E>,
    {
        RawEffect::new(self, handler, config, Result::is_err)
    }
}

impl<S: Stream + ?Sized> EffectExt for S {}
