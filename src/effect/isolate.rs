//! Failure isolation at the invocation boundary.
//!
//! [`Isolated`] wraps the output sequence of one invocation. The first failure
//! it sees, whether an `Err` item or a panic while polling, is handed to the
//! [`ErrorSink`] and the sequence then ends as if it had been exhausted. The
//! failure never reaches the merged output stream.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{FusedStream, Stream};
use pin_project_lite::pin_project;

use super::config::ErrorSink;
use super::error::EffectFailure;
use super::normalize::Normalized;

pin_project! {
    /// A sequence that reports its first failure and then ends successfully.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use effect_stream::effect::{ErrorSink, Isolated, Normalized, Outcome};
    /// use futures::StreamExt;
    /// use std::sync::{Arc, Mutex};
    ///
    /// # futures::executor::block_on(async {
    /// let reported = Arc::new(Mutex::new(Vec::new()));
    /// let sink = {
    ///     let reported = Arc::clone(&reported);
    ///     ErrorSink::new(move |failure| reported.lock().unwrap().push(failure))
    /// };
    ///
    /// let outcome: Outcome<i32, &str> = Outcome::fail("bad input");
    /// let items: Vec<i32> = Isolated::new(Normalized::from_outcome(outcome), sink)
    ///     .collect()
    ///     .await;
    ///
    /// assert!(items.is_empty());
    /// assert_eq!(reported.lock().unwrap().len(), 1);
    /// # });
    /// ```
    #[must_use = "streams do nothing unless polled"]
    pub struct Isolated<S, E> {
        #[pin]
        inner: S,
        sink: ErrorSink<E>,
        terminated: bool,
    }
}

impl<S, E> Isolated<S, E> {
    /// Isolates the failures of `inner`, reporting them to `sink`.
    pub const fn new(inner: S, sink: ErrorSink<E>) -> Self {
        Self {
            inner,
            sink,
            terminated: false,
        }
    }
}

impl<O, E> Isolated<Normalized<O, E>, E> {
    /// Drops the sequence without polling it again.
    ///
    /// A synchronous failure that was never yielded is still reported.
    pub(crate) fn abandon(mut self) {
        if self.terminated {
            return;
        }
        if let Some(failure) = self.inner.take_failure() {
            self.sink.report(failure);
        }
    }
}

impl<S, O, E> Stream for Isolated<S, E>
where
    S: Stream<Item = Result<O, EffectFailure<E>>>,
{
    type Item = O;

    fn poll_next(self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Option<O>> {
        let this = self.project();
        if *this.terminated {
            return Poll::Ready(None);
        }

        let mut inner = this.inner;
        let polled = catch_unwind(AssertUnwindSafe(|| inner.as_mut().poll_next(context)));

        let failure = match polled {
            Ok(Poll::Ready(Some(Ok(item)))) => return Poll::Ready(Some(item)),
            Ok(Poll::Ready(Some(Err(failure)))) => failure,
            Ok(Poll::Ready(None)) => {
                *this.terminated = true;
                return Poll::Ready(None);
            }
            Ok(Poll::Pending) => return Poll::Pending,
            Err(payload) => EffectFailure::from_panic(payload.as_ref()),
        };

        // The inner sequence is never polled again after a failure.
        *this.terminated = true;
        this.sink.report(failure);
        Poll::Ready(None)
    }
}

impl<S, O, E> FusedStream for Isolated<S, E>
where
    S: Stream<Item = Result<O, EffectFailure<E>>>,
{
    fn is_terminated(&self) -> bool {
        self.terminated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{Emit, Outcome};
    use futures::StreamExt;
    use rstest::rstest;
    use std::sync::{Arc, Mutex};

    fn recording_sink<E: Send + 'static>() -> (ErrorSink<E>, Arc<Mutex<Vec<EffectFailure<E>>>>) {
        let reported = Arc::new(Mutex::new(Vec::new()));
        let reported_clone = Arc::clone(&reported);
        let sink = ErrorSink::new(move |failure| reported_clone.lock().unwrap().push(failure));
        (sink, reported)
    }

    #[rstest]
    #[tokio::test]
    async fn test_successful_items_pass_through() {
        let (sink, reported) = recording_sink::<&str>();
        let outcome: Outcome<i32, &str> = Outcome::many(vec![1, 2, 3]);

        let items: Vec<_> = Isolated::new(Normalized::from_outcome(outcome), sink)
            .collect()
            .await;

        assert_eq!(items, vec![1, 2, 3]);
        assert!(reported.lock().unwrap().is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn test_failure_is_reported_once_and_ends_sequence() {
        let (sink, reported) = recording_sink::<&str>();
        let outcome: Outcome<i32, &str> = Outcome::producer(futures::stream::iter(vec![
            Ok(Emit::One(1)),
            Err("second step"),
            Ok(Emit::One(3)),
        ]));

        let mut isolated = Isolated::new(Normalized::from_outcome(outcome), sink);
        assert_eq!(isolated.next().await, Some(1));
        assert_eq!(isolated.next().await, None);
        assert!(isolated.is_terminated());
        assert_eq!(isolated.next().await, None);

        assert_eq!(
            *reported.lock().unwrap(),
            vec![EffectFailure::Error("second step")]
        );
    }

    #[rstest]
    #[tokio::test]
    async fn test_deferred_rejection_is_isolated() {
        let (sink, reported) = recording_sink::<String>();
        let outcome: Outcome<i32, String> =
            Outcome::deferred(async { Err("unavailable".to_string()) });

        let items: Vec<_> = Isolated::new(Normalized::from_outcome(outcome), sink)
            .collect()
            .await;

        assert!(items.is_empty());
        assert_eq!(
            *reported.lock().unwrap(),
            vec![EffectFailure::Error("unavailable".to_string())]
        );
    }

    #[rstest]
    #[tokio::test]
    async fn test_panicking_producer_is_isolated() {
        let (sink, reported) = recording_sink::<&str>();
        let outcome: Outcome<i32, &str> = Outcome::producer(
            futures::stream::iter(vec![1, 2]).map(|value| {
                assert!(value < 2, "producer gave up at {value}");
                Ok(Emit::One(value))
            }),
        );

        let items: Vec<_> = Isolated::new(Normalized::from_outcome(outcome), sink)
            .collect()
            .await;

        assert_eq!(items, vec![1]);
        assert_eq!(
            *reported.lock().unwrap(),
            vec![EffectFailure::Panic("producer gave up at 2".to_string())]
        );
    }
}
