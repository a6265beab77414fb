//! Raw mode: one invocation for the whole input stream.
//!
//! [`RawEffect`] calls its handler exactly once, on the first poll, and
//! hands it a [`RawInput`] through which the handler pulls input events at its
//! own pace. Events that arrive before the handler asks for them are buffered
//! in arrival order. Once the input stream has ended the buffered backlog is
//! still served, after which [`RawInput`] reports the end of input.
//!
//! The handler's result goes through the same normalization and isolation as
//! any other invocation. The output stream ends when that invocation ends.
//!
//! The input stream is dropped as soon as it is no longer read: when it ends,
//! when the handler drops its [`RawInput`], or, for
//! [`try_raw_effect`](super::EffectExt::try_raw_effect), after the first `Err`
//! has been delivered.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{FusedStream, Stream, StreamExt};
use pin_project_lite::pin_project;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio_util::sync::CancellationToken;

use super::config::{EffectConfig, ErrorSink};
use super::invocation::{Invocation, InvocationEvent};
use super::outcome::IntoOutcome;

// =============================================================================
// RawInput
// =============================================================================

/// The input stream of a raw-mode effect, as seen by its handler.
///
/// `RawInput` is itself a [`Stream`]; [`RawInput::next_event`] is a shorthand
/// for handlers written as `async` blocks.
#[derive(Debug)]
pub struct RawInput<I> {
    receiver: UnboundedReceiver<I>,
}

impl<I> RawInput<I> {
    const fn new(receiver: UnboundedReceiver<I>) -> Self {
        Self { receiver }
    }

    /// Waits for the next input event.
    ///
    /// Returns `None` once the input stream has ended and every buffered
    /// event has been taken.
    pub async fn next_event(&mut self) -> Option<I> {
        self.receiver.recv().await
    }

    /// Returns the number of events received but not yet taken.
    pub fn backlog(&self) -> usize {
        self.receiver.len()
    }

    /// Returns `true` once the input stream has ended and the backlog is empty.
    pub fn is_exhausted(&self) -> bool {
        self.receiver.is_closed() && self.receiver.is_empty()
    }
}

impl<I> Stream for RawInput<I> {
    type Item = I;

    fn poll_next(mut self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Option<I>> {
        self.receiver.poll_recv(context)
    }
}

// =============================================================================
// RawEffect
// =============================================================================

pin_project! {
    /// Stream returned by [`EffectExt::raw_effect`](super::EffectExt::raw_effect)
    /// and [`EffectExt::try_raw_effect`](super::EffectExt::try_raw_effect).
    #[must_use = "streams do nothing unless polled"]
    pub struct RawEffect<S, I, F, O, E> {
        // `None` once the input has ended, failed, or is no longer wanted.
        #[pin]
        input: Option<S>,
        ends_input: fn(&I) -> bool,
        handler: Option<F>,
        receiver: Option<UnboundedReceiver<I>>,
        sender: Option<UnboundedSender<I>>,
        output: Option<Invocation<O, E>>,
        sink: ErrorSink<E>,
        token: CancellationToken,
        terminated: bool,
    }
}

impl<S, I, F, O, E> RawEffect<S, I, F, O, E> {
    /// `ends_input` marks the event after which the input is no longer read.
    pub(crate) fn new(
        input: S,
        handler: F,
        config: EffectConfig<E>,
        ends_input: fn(&I) -> bool,
    ) -> Self {
        let (_, sink) = config.into_parts();
        let (sender, receiver) = unbounded_channel();
        Self {
            input: Some(input),
            ends_input,
            handler: Some(handler),
            receiver: Some(receiver),
            sender: Some(sender),
            output: None,
            sink,
            token: CancellationToken::new(),
            terminated: false,
        }
    }

    /// Returns `true` once the handler has been called.
    pub const fn is_started(&self) -> bool {
        self.handler.is_none()
    }

    /// Returns `true` while the input stream is still being read.
    pub const fn is_reading_input(&self) -> bool {
        self.input.is_some()
    }
}

impl<S, I, F, R, O, E> Stream for RawEffect<S, I, F, O, E>
where
    S: Stream<Item = I>,
    F: FnOnce(RawInput<I>) -> R,
    R: IntoOutcome<O, E>,
{
    type Item = O;

    fn poll_next(self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Option<O>> {
        let mut this = self.project();
        if *this.terminated {
            return Poll::Ready(None);
        }

        if let (Some(handler), Some(receiver)) = (this.handler.take(), this.receiver.take()) {
            let input = RawInput::new(receiver);
            *this.output = Some(Invocation::start(
                0,
                this.token.clone(),
                this.sink.clone(),
                move || handler(input),
            ));
        }

        if this.sender.as_ref().is_some_and(UnboundedSender::is_closed) {
            tracing::trace!(target: "effect_stream", "raw input dropped by handler");
            *this.sender = None;
            this.input.set(None);
        }

        // Buffer everything the input has ready, whether or not it is wanted yet.
        while let Some(input) = this.input.as_mut().as_pin_mut() {
            match input.poll_next(context) {
                Poll::Ready(Some(event)) => {
                    let last = (*this.ends_input)(&event);
                    let delivered = this
                        .sender
                        .as_ref()
                        .is_some_and(|sender| sender.send(event).is_ok());
                    if !delivered {
                        tracing::trace!(target: "effect_stream", "raw input dropped by handler");
                        *this.sender = None;
                        this.input.set(None);
                    } else if last {
                        tracing::debug!(target: "effect_stream", "raw input failed");
                        *this.sender = None;
                        this.input.set(None);
                    }
                }
                Poll::Ready(None) => {
                    tracing::trace!(target: "effect_stream", "raw input completed");
                    *this.sender = None;
                    this.input.set(None);
                }
                Poll::Pending => break,
            }
        }

        let polled = match this.output.as_mut() {
            Some(output) => output.poll_next_unpin(context),
            None => Poll::Ready(None),
        };

        match polled {
            Poll::Ready(Some((_, InvocationEvent::Output(value)))) => Poll::Ready(Some(value)),
            Poll::Ready(Some((_, InvocationEvent::Finished)) | None) => {
                this.token.cancel();
                *this.output = None;
                *this.sender = None;
                this.input.set(None);
                *this.terminated = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<S, I, F, R, O, E> FusedStream for RawEffect<S, I, F, O, E>
where
    S: Stream<Item = I>,
    F: FnOnce(RawInput<I>) -> R,
    R: IntoOutcome<O, E>,
{
    fn is_terminated(&self) -> bool {
        self.terminated
    }
}
