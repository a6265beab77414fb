//! Invocation scheduling: one invocation per input event, merged output.
//!
//! [`TryEffect`] is the core combinator. For every `Ok` event of its input it
//! starts an invocation of the handler and merges the invocations' outputs
//! into a single stream according to the configured
//! [`ConcurrencyPolicy`]:
//!
//! - **Accumulate**: every invocation runs to completion and all of its output
//!   reaches the result. Outputs of concurrent invocations interleave in the
//!   order they become ready; each invocation's own output stays in order.
//! - **Preempt**: starting an invocation cancels and drops the previous one.
//!   Nothing the previous invocation would still produce reaches the result,
//!   and work it had in flight is discarded with it.
//!
//! The output ends once the input has ended and the invocations that matter
//! have finished: all of them under accumulate, the current one under preempt.
//!
//! All invocations are polled inline from the output stream's `poll_next`.
//! Nothing is spawned, so the combinator runs on any executor.
//!
//! [`Effect`] is the same combinator for input streams that cannot fail.

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{FusedStream, SelectAll, Stream, StreamExt};
use pin_project_lite::pin_project;
use tokio_util::sync::CancellationToken;

use super::config::{ConcurrencyPolicy, EffectConfig, ErrorSink};
use super::invocation::{Invocation, InvocationEvent, InvocationId};
use super::outcome::IntoOutcome;

/// The only invocation alive under preempt.
struct Current<O, E> {
    id: InvocationId,
    token: CancellationToken,
    invocation: Invocation<O, E>,
}

// =============================================================================
// TryEffect
// =============================================================================

pin_project! {
    /// Stream returned by [`EffectExt::try_effect`](super::EffectExt::try_effect).
    ///
    /// Yields `Ok(output)` for every output event and, if the input stream
    /// fails, a single terminal `Err(upstream)`.
    #[must_use = "streams do nothing unless polled"]
    pub struct TryEffect<S, F, O, E> {
        #[pin]
        input: S,
        input_done: bool,
        handler: F,
        policy: ConcurrencyPolicy,
        sink: ErrorSink<E>,
        invocations: SelectAll<Invocation<O, E>>,
        active: usize,
        current: Option<Current<O, E>>,
        next_id: InvocationId,
        root: CancellationToken,
        terminated: bool,
    }
}

impl<S, F, O, E> TryEffect<S, F, O, E> {
    pub(crate) fn new(input: S, handler: F, config: EffectConfig<E>) -> Self {
        let (policy, sink) = config.into_parts();
        Self {
            input,
            input_done: false,
            handler,
            policy,
            sink,
            invocations: SelectAll::new(),
            active: 0,
            current: None,
            next_id: 0,
            root: CancellationToken::new(),
            terminated: false,
        }
    }

    /// Returns the concurrency policy this stream was configured with.
    pub const fn policy(&self) -> ConcurrencyPolicy {
        self.policy
    }

    /// Returns the number of invocations started so far.
    pub const fn started_invocations(&self) -> u64 {
        self.next_id
    }

    /// Returns the number of invocations that have not finished yet.
    ///
    /// Under preempt this is at most one: a preempted invocation is dropped
    /// as soon as its successor starts.
    pub const fn active_invocations(&self) -> usize {
        self.active
    }
}

impl<S, T, U, F, R, O, E> Stream for TryEffect<S, F, O, E>
where
    S: Stream<Item = Result<T, U>>,
    F: FnMut(T) -> R,
    R: IntoOutcome<O, E>,
{
    type Item = Result<O, U>;

    fn poll_next(self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        if *this.terminated {
            return Poll::Ready(None);
        }

        // 1. Start an invocation for every input event that is ready.
        while !*this.input_done {
            match this.input.as_mut().poll_next(context) {
                Poll::Ready(Some(Ok(event))) => {
                    let id = *this.next_id;
                    *this.next_id += 1;

                    if let Some(previous) = this.current.take() {
                        tracing::debug!(
                            target: "effect_stream",
                            preempted = previous.id,
                            by = id,
                            "invocation preempted"
                        );
                        previous.token.cancel();
                        previous.invocation.abandon();
                        *this.active = this.active.saturating_sub(1);
                    }

                    let token = this.root.child_token();
                    let handler = &mut *this.handler;
                    let invocation =
                        Invocation::start(id, token.clone(), this.sink.clone(), || handler(event));
                    *this.active += 1;

                    match this.policy {
                        ConcurrencyPolicy::Accumulate => this.invocations.push(invocation),
                        ConcurrencyPolicy::Preempt => {
                            *this.current = Some(Current {
                                id,
                                token,
                                invocation,
                            });
                        }
                    }
                }
                Poll::Ready(Some(Err(error))) => {
                    // A broken source is the one failure that is not isolated.
                    tracing::debug!(
                        target: "effect_stream",
                        abandoned = *this.active,
                        "input stream failed"
                    );
                    this.root.cancel();
                    *this.invocations = SelectAll::new();
                    *this.current = None;
                    *this.active = 0;
                    *this.input_done = true;
                    *this.terminated = true;
                    return Poll::Ready(Some(Err(error)));
                }
                Poll::Ready(None) => {
                    tracing::trace!(target: "effect_stream", "input stream completed");
                    *this.input_done = true;
                }
                Poll::Pending => break,
            }
        }

        // 2. Forward output of the running invocations.
        match this.policy {
            ConcurrencyPolicy::Accumulate => loop {
                match this.invocations.poll_next_unpin(context) {
                    Poll::Ready(Some((_, InvocationEvent::Output(value)))) => {
                        return Poll::Ready(Some(Ok(value)));
                    }
                    Poll::Ready(Some((_, InvocationEvent::Finished))) => {
                        *this.active = this.active.saturating_sub(1);
                    }
                    Poll::Ready(None) | Poll::Pending => break,
                }
            },
            ConcurrencyPolicy::Preempt => {
                let polled = match this.current.as_mut() {
                    Some(current) => current.invocation.poll_next_unpin(context),
                    None => Poll::Pending,
                };
                match polled {
                    Poll::Ready(Some((_, InvocationEvent::Output(value)))) => {
                        return Poll::Ready(Some(Ok(value)));
                    }
                    Poll::Ready(Some((_, InvocationEvent::Finished)) | None) => {
                        *this.current = None;
                        *this.active = this.active.saturating_sub(1);
                    }
                    Poll::Pending => {}
                }
            }
        }

        // 3. End once the input is done and nothing is running.
        if *this.input_done && *this.active == 0 {
            tracing::trace!(
                target: "effect_stream",
                invocations = *this.next_id,
                "effect stream completed"
            );
            this.root.cancel();
            *this.invocations = SelectAll::new();
            *this.terminated = true;
            return Poll::Ready(None);
        }

        Poll::Pending
    }
}

impl<S, T, U, F, R, O, E> FusedStream for TryEffect<S, F, O, E>
where
    S: Stream<Item = Result<T, U>>,
    F: FnMut(T) -> R,
    R: IntoOutcome<O, E>,
{
    fn is_terminated(&self) -> bool {
        self.terminated
    }
}

// =============================================================================
// Effect
// =============================================================================

pin_project! {
    /// Lifts every item of an infallible stream into `Ok`.
    #[must_use = "streams do nothing unless polled"]
    pub struct NeverFails<S> {
        #[pin]
        inner: S,
    }
}

impl<S: Stream> Stream for NeverFails<S> {
    type Item = Result<S::Item, Infallible>;

    fn poll_next(self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().inner.poll_next(context).map(|item| item.map(Ok))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

pin_project! {
    /// Stream returned by [`EffectExt::effect`](super::EffectExt::effect).
    ///
    /// Yields every output event of every invocation; it never fails.
    #[must_use = "streams do nothing unless polled"]
    pub struct Effect<S, F, O, E> {
        #[pin]
        inner: TryEffect<NeverFails<S>, F, O, E>,
    }
}

impl<S, F, O, E> Effect<S, F, O, E> {
    pub(crate) fn new(input: S, handler: F, config: EffectConfig<E>) -> Self {
        Self {
            inner: TryEffect::new(NeverFails { inner: input }, handler, config),
        }
    }

    /// Returns the concurrency policy this stream was configured with.
    pub const fn policy(&self) -> ConcurrencyPolicy {
        self.inner.policy()
    }

    /// Returns the number of invocations started so far.
    pub const fn started_invocations(&self) -> u64 {
        self.inner.started_invocations()
    }

    /// Returns the number of invocations that have not finished yet.
    pub const fn active_invocations(&self) -> usize {
        self.inner.active_invocations()
    }
}

impl<S, F, R, O, E> Stream for Effect<S, F, O, E>
where
    S: Stream,
    F: FnMut(S::Item) -> R,
    R: IntoOutcome<O, E>,
{
    type Item = O;

    fn poll_next(self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Option<O>> {
        self.project().inner.poll_next(context).map(|item| {
            item.map(|result| match result {
                Ok(value) => value,
                Err(never) => match never {},
            })
        })
    }
}

impl<S, F, R, O, E> FusedStream for Effect<S, F, O, E>
where
    S: Stream,
    F: FnMut(S::Item) -> R,
    R: IntoOutcome<O, E>,
{
    fn is_terminated(&self) -> bool {
        self.inner.is_terminated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{EffectExt, Emit, Outcome};
    use futures::stream;
    use rstest::rstest;
    use std::time::Duration;

    #[rstest]
    #[tokio::test]
    async fn test_each_event_starts_one_invocation() {
        let config: EffectConfig<()> = EffectConfig::new();
        let mut effect = stream::iter(vec![1, 2, 3]).effect(|value: i32| Some(value * 10), config);

        let mut outputs = Vec::new();
        while let Some(value) = effect.next().await {
            outputs.push(value);
        }

        outputs.sort_unstable();
        assert_eq!(outputs, vec![10, 20, 30]);
        assert_eq!(effect.started_invocations(), 3);
        assert_eq!(effect.active_invocations(), 0);
        assert!(effect.is_terminated());
    }

    #[rstest]
    #[tokio::test]
    async fn test_empty_input_completes_immediately() {
        let config: EffectConfig<()> = EffectConfig::new();
        let outputs: Vec<i32> = stream::iter(Vec::<i32>::new())
            .effect(|value| Some(value), config)
            .collect()
            .await;
        assert!(outputs.is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn test_upstream_failure_is_terminal() {
        let config: EffectConfig<()> = EffectConfig::new();
        let input = stream::iter(vec![Ok(1), Err("source broke"), Ok(3)]);
        let outputs: Vec<Result<i32, &str>> = input
            .try_effect(|value: i32| Some(value), config)
            .collect()
            .await;

        assert_eq!(outputs.last(), Some(&Err("source broke")));
        assert!(!outputs.contains(&Ok(3)));
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn test_accumulate_waits_for_slow_invocations() {
        let config: EffectConfig<()> = EffectConfig::new();
        let outputs: Vec<u64> = stream::iter(vec![30_u64, 10])
            .effect(
                |delay| {
                    Outcome::deferred(async move {
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        Ok(Emit::One(delay))
                    })
                },
                config,
            )
            .collect()
            .await;

        assert_eq!(outputs, vec![10, 30]);
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn test_preempt_keeps_only_latest_invocation() {
        let config: EffectConfig<()> = EffectConfig::new().preempt();
        let outputs: Vec<u64> = stream::iter(vec![30_u64, 10])
            .effect(
                |delay| {
                    Outcome::deferred(async move {
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        Ok(Emit::One(delay))
                    })
                },
                config,
            )
            .collect()
            .await;

        assert_eq!(outputs, vec![10]);
    }

    #[rstest]
    fn test_policy_accessor() {
        let config: EffectConfig<()> = EffectConfig::new().preempt();
        let effect = stream::iter(vec![1]).effect(|value: i32| Some(value), config);
        assert_eq!(effect.policy(), ConcurrencyPolicy::Preempt);
    }
}
