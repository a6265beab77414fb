//! One run of a handler.
//!
//! An [`Invocation`] calls the handler, classifies its result, and drives the
//! normalized, isolated output. When the output is exhausted it yields a
//! final [`InvocationEvent::Finished`] so the scheduler can account for it.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use futures::stream::Stream;
use pin_project_lite::pin_project;
use tokio_util::sync::CancellationToken;

use super::config::ErrorSink;
use super::error::EffectFailure;
use super::isolate::Isolated;
use super::normalize::Normalized;
use super::outcome::IntoOutcome;

/// Identifier of an invocation, unique within one effect stream.
pub(crate) type InvocationId = u64;

/// What an invocation reports to the scheduler.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum InvocationEvent<O> {
    /// One output event.
    Output(O),
    /// The invocation's output is exhausted, failed, or was abandoned.
    Finished,
}

pin_project! {
    #[must_use = "streams do nothing unless polled"]
    pub(crate) struct Invocation<O, E> {
        id: InvocationId,
        started_at: Instant,
        #[pin]
        output: Isolated<Normalized<O, E>, E>,
        finished: bool,
    }
}

impl<O, E> Invocation<O, E> {
    /// Calls `call` and wraps whatever it returns.
    ///
    /// A panic inside `call` is isolated like any other failure.
    pub(crate) fn start<C, R>(
        id: InvocationId,
        token: CancellationToken,
        sink: ErrorSink<E>,
        call: C,
    ) -> Self
    where
        C: FnOnce() -> R,
        R: IntoOutcome<O, E>,
    {
        let normalized = match catch_unwind(AssertUnwindSafe(|| call().into_outcome())) {
            Ok(outcome) => {
                tracing::trace!(
                    target: "effect_stream",
                    invocation = id,
                    kind = %outcome.kind(),
                    "invocation started"
                );
                Normalized::new(outcome, token)
            }
            Err(payload) => {
                tracing::trace!(target: "effect_stream", invocation = id, "handler panicked");
                Normalized::failed(EffectFailure::from_panic(payload.as_ref()), token)
            }
        };

        Self {
            id,
            started_at: Instant::now(),
            output: Isolated::new(normalized, sink),
            finished: false,
        }
    }

    /// Drops an invocation that has been preempted.
    ///
    /// Work in flight is discarded; a synchronous failure is still reported.
    pub(crate) fn abandon(self) {
        if self.finished {
            return;
        }
        tracing::trace!(
            target: "effect_stream",
            invocation = self.id,
            elapsed = ?self.started_at.elapsed(),
            "invocation abandoned"
        );
        self.output.abandon();
    }
}

impl<O, E> Stream for Invocation<O, E> {
    type Item = (InvocationId, InvocationEvent<O>);

    fn poll_next(self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if *this.finished {
            return Poll::Ready(None);
        }

        match this.output.poll_next(context) {
            Poll::Ready(Some(value)) => Poll::Ready(Some((*this.id, InvocationEvent::Output(value)))),
            Poll::Ready(None) => {
                *this.finished = true;
                tracing::trace!(
                    target: "effect_stream",
                    invocation = *this.id,
                    elapsed = ?this.started_at.elapsed(),
                    "invocation finished"
                );
                Poll::Ready(Some((*this.id, InvocationEvent::Finished)))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
