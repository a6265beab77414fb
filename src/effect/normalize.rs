//! Normalization of classified outcomes into lazy output sequences.
//!
//! [`Normalized`] turns any [`Outcome`] into a `Stream` of output events:
//!
//! - `Ready`: the items of its [`Emit`](super::Emit), in order.
//! - `Deferred`: awaited once, then treated as `Ready`.
//! - `Producer`: pulled step by step, every step expanded like `Ready`.
//! - `Failed`: a single `Err`.
//!
//! Failures surface as `Err` items. [`Isolated`](super::Isolated) is what
//! turns them into reports; `Normalized` alone never swallows anything.
//!
//! # Cancellation
//!
//! Every `Normalized` holds a [`CancellationToken`]. Once the token is
//! cancelled:
//!
//! - no further items are yielded,
//! - no new step is pulled from a producer,
//! - a step or resolution that was already in flight is still driven to
//!   completion, and its value is discarded.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{FusedStream, Stream};
use pin_project_lite::pin_project;
use tokio_util::sync::CancellationToken;

use super::error::EffectFailure;
use super::outcome::{Deferred, EmitIter, Outcome, Producer};

pin_project! {
    /// The output sequence of one classified outcome.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use effect_stream::effect::{Normalized, Outcome};
    /// use futures::StreamExt;
    ///
    /// # futures::executor::block_on(async {
    /// let outcome: Outcome<i32, String> = Outcome::many(vec![1, 2]);
    /// let items: Vec<_> = Normalized::from_outcome(outcome).collect().await;
    /// assert_eq!(items, vec![Ok(1), Ok(2)]);
    /// # });
    /// ```
    #[must_use = "streams do nothing unless polled"]
    pub struct Normalized<O, E> {
        #[pin]
        state: NormalizeState<O, E>,
        token: CancellationToken,
    }
}

pin_project! {
    /// State machine behind `Normalized`.
    ///
    /// - `Emitting` -> `Done` (items exhausted)
    /// - `Resolving` -> `Emitting` (resolved) or `Done` (rejected, cancelled)
    /// - `Pulling` -> `Pulling` (next step) or `Done` (finished, failed, cancelled)
    /// - `Failed` -> `Done`
    #[project = NormalizeStateProj]
    enum NormalizeState<O, E> {
        Emitting {
            items: EmitIter<O>,
        },
        Resolving {
            #[pin]
            future: Deferred<O, E>,
            started: bool,
        },
        Pulling {
            #[pin]
            producer: Producer<O, E>,
            items: EmitIter<O>,
            in_flight: bool,
        },
        Failed {
            failure: Option<EffectFailure<E>>,
        },
        Done,
    }
}

impl<O, E> Normalized<O, E> {
    /// Normalizes `outcome`, stopping early once `token` is cancelled.
    pub fn new(outcome: Outcome<O, E>, token: CancellationToken) -> Self {
        let state = match outcome {
            Outcome::Ready(emit) => NormalizeState::Emitting {
                items: emit.into_iter(),
            },
            Outcome::Deferred(future) => NormalizeState::Resolving {
                future,
                started: false,
            },
            Outcome::Producer(producer) => NormalizeState::Pulling {
                producer,
                items: EmitIter::Done,
                in_flight: false,
            },
            Outcome::Failed(error) => NormalizeState::Failed {
                failure: Some(EffectFailure::Error(error)),
            },
        };
        Self { state, token }
    }

    /// Normalizes `outcome` with a token nobody else holds.
    pub fn from_outcome(outcome: Outcome<O, E>) -> Self {
        Self::new(outcome, CancellationToken::new())
    }

    /// A sequence that yields `failure` and ends.
    pub(crate) const fn failed(failure: EffectFailure<E>, token: CancellationToken) -> Self {
        Self {
            state: NormalizeState::Failed {
                failure: Some(failure),
            },
            token,
        }
    }

    /// Returns the token this sequence observes.
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Takes a synchronous failure that has not been yielded yet.
    pub(crate) fn take_failure(&mut self) -> Option<EffectFailure<E>> {
        match &mut self.state {
            NormalizeState::Failed { failure } => failure.take(),
            _ => None,
        }
    }
}

impl<O, E> Stream for Normalized<O, E> {
    type Item = Result<O, EffectFailure<E>>;

    fn poll_next(self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            let cancelled = this.token.is_cancelled();

            match this.state.as_mut().project() {
                // A synchronous failure already happened; it is reported even if
                // the invocation has been abandoned since.
                NormalizeStateProj::Failed { failure } => {
                    let failure = failure.take();
                    this.state.set(NormalizeState::Done);
                    return Poll::Ready(failure.map(Err));
                }
                NormalizeStateProj::Done => return Poll::Ready(None),
                NormalizeStateProj::Emitting { items } => {
                    let next = if cancelled { None } else { items.next() };
                    if next.is_none() {
                        this.state.set(NormalizeState::Done);
                    }
                    return Poll::Ready(next.map(Ok));
                }
                NormalizeStateProj::Resolving { future, started } => {
                    if cancelled && !*started {
                        this.state.set(NormalizeState::Done);
                        return Poll::Ready(None);
                    }
                    *started = true;

                    let Poll::Ready(resolved) = future.poll(context) else {
                        return Poll::Pending;
                    };
                    if this.token.is_cancelled() {
                        this.state.set(NormalizeState::Done);
                        return Poll::Ready(None);
                    }
                    match resolved {
                        Ok(emit) => this.state.set(NormalizeState::Emitting {
                            items: emit.into_iter(),
                        }),
                        Err(error) => {
                            this.state.set(NormalizeState::Done);
                            return Poll::Ready(Some(Err(EffectFailure::Error(error))));
                        }
                    }
                }
                NormalizeStateProj::Pulling {
                    producer,
                    items,
                    in_flight,
                } => {
                    if !*in_flight {
                        if cancelled {
                            this.state.set(NormalizeState::Done);
                            return Poll::Ready(None);
                        }
                        if let Some(item) = items.next() {
                            return Poll::Ready(Some(Ok(item)));
                        }
                    }

                    let Poll::Ready(step) = producer.poll_next(context) else {
                        *in_flight = true;
                        return Poll::Pending;
                    };
                    *in_flight = false;
                    if this.token.is_cancelled() {
                        this.state.set(NormalizeState::Done);
                        return Poll::Ready(None);
                    }
                    match step {
                        Some(Ok(emit)) => *items = emit.into_iter(),
                        Some(Err(error)) => {
                            this.state.set(NormalizeState::Done);
                            return Poll::Ready(Some(Err(EffectFailure::Error(error))));
                        }
                        None => {
                            this.state.set(NormalizeState::Done);
                            return Poll::Ready(None);
                        }
                    }
                }
            }
        }
    }
}

impl<O, E> FusedStream for Normalized<O, E> {
    fn is_terminated(&self) -> bool {
        matches!(self.state, NormalizeState::Done)
    }
}
