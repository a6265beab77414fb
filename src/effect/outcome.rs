//! Handler results and their classification.
//!
//! A handler may answer an input event in four ways:
//!
//! | Shape | Variant | Normalized as |
//! |-------|---------|---------------|
//! | immediate value or absence | [`Outcome::Ready`] | the items of the [`Emit`] |
//! | deferred single value | [`Outcome::Deferred`] | the items of the resolved [`Emit`] |
//! | incremental producer | [`Outcome::Producer`] | the items of every pulled [`Emit`], in pull order |
//! | synchronous failure | [`Outcome::Failed`] | one reported failure, no items |
//!
//! Handlers do not need to build an `Outcome` by hand. Anything implementing
//! [`IntoOutcome`] is accepted: `Option<O>`, `Vec<O>`, `()`, [`Emit<O>`], and
//! `Result`s of those.
//!
//! # Examples
//!
//! ```rust
//! use effect_stream::effect::{Emit, IntoOutcome, Outcome, OutcomeKind};
//!
//! let outcome: Outcome<i32, String> = vec![1, 2, 3].into_outcome();
//! assert_eq!(outcome.kind(), OutcomeKind::Immediate);
//!
//! let outcome: Outcome<i32, String> = Outcome::deferred(async { Ok(Emit::One(1)) });
//! assert_eq!(outcome.kind(), OutcomeKind::Deferred);
//!
//! let outcome: Outcome<i32, String> = Err::<Option<i32>, _>("nope".to_string()).into_outcome();
//! assert_eq!(outcome.kind(), OutcomeKind::Failed);
//! ```

use std::fmt;
use std::future::Future;

use futures::future::BoxFuture;
use futures::stream::{BoxStream, Stream};

// =============================================================================
// Emit
// =============================================================================

/// An immediate handler result: nothing, one output event, or an ordered
/// collection of output events.
///
/// `Emit` is the unit every outcome shape is eventually reduced to. Iterating
/// it applies the expansion rule: `Nothing` yields no items, `One` yields its
/// value, and `Many` yields each element in order. An empty `Many` yields no
/// items at all.
///
/// # Examples
///
/// ```rust
/// use effect_stream::effect::Emit;
///
/// assert_eq!(Emit::<i32>::Nothing.into_iter().count(), 0);
/// assert_eq!(Emit::One(7).into_iter().collect::<Vec<_>>(), vec![7]);
/// assert_eq!(Emit::Many(vec![1, 2]).into_iter().collect::<Vec<_>>(), vec![1, 2]);
/// assert_eq!(Emit::<i32>::Many(vec![]).into_iter().count(), 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Emit<O> {
    /// No output.
    #[default]
    Nothing,
    /// Exactly one output event.
    One(O),
    /// An ordered collection of output events.
    Many(Vec<O>),
}

impl<O> Emit<O> {
    /// Returns the number of output events this value expands to.
    pub fn len(&self) -> usize {
        match self {
            Self::Nothing => 0,
            Self::One(_) => 1,
            Self::Many(values) => values.len(),
        }
    }

    /// Returns `true` if this value expands to no output events.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<O> From<Option<O>> for Emit<O> {
    fn from(value: Option<O>) -> Self {
        value.map_or(Self::Nothing, Self::One)
    }
}

impl<O> From<Vec<O>> for Emit<O> {
    fn from(values: Vec<O>) -> Self {
        Self::Many(values)
    }
}

impl<O> IntoIterator for Emit<O> {
    type Item = O;
    type IntoIter = EmitIter<O>;

    fn into_iter(self) -> Self::IntoIter {
        match self {
            Self::Nothing => EmitIter::Done,
            Self::One(value) => EmitIter::One(Some(value)),
            Self::Many(values) => EmitIter::Many(values.into_iter()),
        }
    }
}

/// Iterator over the output events of an [`Emit`].
#[derive(Debug)]
pub enum EmitIter<O> {
    /// Exhausted, or created from `Emit::Nothing`.
    Done,
    /// A single pending value.
    One(Option<O>),
    /// The remaining elements of an ordered collection.
    Many(std::vec::IntoIter<O>),
}

impl<O> Default for EmitIter<O> {
    fn default() -> Self {
        Self::Done
    }
}

impl<O> Iterator for EmitIter<O> {
    type Item = O;

    fn next(&mut self) -> Option<O> {
        match self {
            Self::Done => None,
            Self::One(value) => value.take(),
            Self::Many(values) => values.next(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Self::Done => (0, Some(0)),
            Self::One(value) => {
                let remaining = usize::from(value.is_some());
                (remaining, Some(remaining))
            }
            Self::Many(values) => values.size_hint(),
        }
    }
}

// =============================================================================
// Outcome
// =============================================================================

/// Boxed deferred single value.
pub type Deferred<O, E> = BoxFuture<'static, Result<Emit<O>, E>>;

/// Boxed incremental producer. Every pulled step is itself an [`Emit`].
pub type Producer<O, E> = BoxStream<'static, Result<Emit<O>, E>>;

/// The classified result of one handler invocation.
///
/// The variants are a closed set, so internal logic dispatches on the tag
/// rather than probing the value at runtime.
pub enum Outcome<O, E> {
    /// An immediate value or absence.
    Ready(Emit<O>),
    /// A deferred single value; once resolved it is treated as `Ready`.
    Deferred(Deferred<O, E>),
    /// An incremental producer pulled one step at a time.
    Producer(Producer<O, E>),
    /// The handler failed before producing anything.
    Failed(E),
}

/// The shape of an [`Outcome`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    /// An immediate value or absence.
    Immediate,
    /// A deferred single value.
    Deferred,
    /// An incremental producer.
    Incremental,
    /// A synchronous handler failure.
    Failed,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Immediate => "immediate",
            Self::Deferred => "deferred",
            Self::Incremental => "incremental",
            Self::Failed => "failed",
        };
        formatter.write_str(name)
    }
}

impl<O, E> Outcome<O, E> {
    /// An outcome with no output events.
    pub const fn empty() -> Self {
        Self::Ready(Emit::Nothing)
    }

    /// An outcome with exactly one output event.
    pub const fn one(value: O) -> Self {
        Self::Ready(Emit::One(value))
    }

    /// An outcome with an ordered collection of output events.
    pub const fn many(values: Vec<O>) -> Self {
        Self::Ready(Emit::Many(values))
    }

    /// An outcome that failed synchronously.
    pub const fn fail(error: E) -> Self {
        Self::Failed(error)
    }

    /// A deferred single value.
    ///
    /// The future is not polled until the outcome is normalized. A rejection
    /// is reported as a failure; it is not re-classified.
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = Result<Emit<O>, E>> + Send + 'static,
    {
        Self::Deferred(Box::pin(future))
    }

    /// An incremental producer.
    ///
    /// Each item of the stream is one step. A step may carry nothing, one
    /// value, or an ordered collection; an `Err` step ends the invocation.
    pub fn producer<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Emit<O>, E>> + Send + 'static,
    {
        Self::Producer(Box::pin(stream))
    }

    /// Returns the shape of this outcome without consuming it.
    pub const fn kind(&self) -> OutcomeKind {
        match self {
            Self::Ready(_) => OutcomeKind::Immediate,
            Self::Deferred(_) => OutcomeKind::Deferred,
            Self::Producer(_) => OutcomeKind::Incremental,
            Self::Failed(_) => OutcomeKind::Failed,
        }
    }
}

impl<O: fmt::Debug, E: fmt::Debug> fmt::Debug for Outcome<O, E> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(emit) => formatter.debug_tuple("Ready").field(emit).finish(),
            Self::Deferred(_) => formatter.write_str("Deferred(..)"),
            Self::Producer(_) => formatter.write_str("Producer(..)"),
            Self::Failed(error) => formatter.debug_tuple("Failed").field(error).finish(),
        }
    }
}

impl<O, E> From<Emit<O>> for Outcome<O, E> {
    fn from(emit: Emit<O>) -> Self {
        Self::Ready(emit)
    }
}

// =============================================================================
// IntoOutcome
// =============================================================================

/// Conversion from a handler's return value into a classified [`Outcome`].
///
/// This is the classification boundary: the accepted shapes are exactly the
/// implementors of this trait, so there is no runtime fallback for an
/// unrecognized result.
pub trait IntoOutcome<O, E> {
    /// Classifies `self`.
    fn into_outcome(self) -> Outcome<O, E>;
}

impl<O, E> IntoOutcome<O, E> for Outcome<O, E> {
    fn into_outcome(self) -> Outcome<O, E> {
        self
    }
}

impl<O, E> IntoOutcome<O, E> for Emit<O> {
    fn into_outcome(self) -> Outcome<O, E> {
        Outcome::Ready(self)
    }
}

impl<O, E> IntoOutcome<O, E> for Option<O> {
    fn into_outcome(self) -> Outcome<O, E> {
        Outcome::Ready(self.into())
    }
}

impl<O, E> IntoOutcome<O, E> for Vec<O> {
    fn into_outcome(self) -> Outcome<O, E> {
        Outcome::Ready(Emit::Many(self))
    }
}

impl<O, E> IntoOutcome<O, E> for () {
    fn into_outcome(self) -> Outcome<O, E> {
        Outcome::empty()
    }
}

macro_rules! impl_into_outcome_for_result {
    ($($ok:ty),* $(,)?) => {
        $(
            impl<O, E> IntoOutcome<O, E> for Result<$ok, E> {
                fn into_outcome(self) -> Outcome<O, E> {
                    match self {
                        Ok(value) => value.into_outcome(),
                        Err(error) => Outcome::Failed(error),
                    }
                }
            }
        )*
    };
}

impl_into_outcome_for_result!(Outcome<O, E>, Emit<O>, Option<O>, Vec<O>, ());

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Emit::Nothing, vec![])]
    #[case(Emit::One(1), vec![1])]
    #[case(Emit::Many(vec![]), vec![])]
    #[case(Emit::Many(vec![1, 2, 3]), vec![1, 2, 3])]
    fn test_emit_expansion(#[case] emit: Emit<i32>, #[case] expected: Vec<i32>) {
        assert_eq!(emit.len(), expected.len());
        assert_eq!(emit.into_iter().collect::<Vec<_>>(), expected);
    }

    #[rstest]
    fn test_emit_iter_size_hint() {
        let mut iter = Emit::One(1).into_iter();
        assert_eq!(iter.size_hint(), (1, Some(1)));
        iter.next();
        assert_eq!(iter.size_hint(), (0, Some(0)));
    }

    #[rstest]
    fn test_emit_from_option() {
        assert_eq!(Emit::from(Some(1)), Emit::One(1));
        assert_eq!(Emit::<i32>::from(None), Emit::Nothing);
    }

    #[rstest]
    fn test_classification_of_immediate_shapes() {
        let outcomes: Vec<Outcome<i32, ()>> = vec![
            Some(1).into_outcome(),
            None::<i32>.into_outcome(),
            vec![1, 2].into_outcome(),
            ().into_outcome(),
            Emit::One(1).into_outcome(),
        ];
        for outcome in outcomes {
            assert_eq!(outcome.kind(), OutcomeKind::Immediate);
        }
    }

    #[rstest]
    fn test_classification_of_async_shapes() {
        let deferred: Outcome<i32, ()> = Outcome::deferred(async { Ok(Emit::One(1)) });
        assert_eq!(deferred.kind(), OutcomeKind::Deferred);

        let producer: Outcome<i32, ()> =
            Outcome::producer(futures::stream::iter(vec![Ok(Emit::One(1))]));
        assert_eq!(producer.kind(), OutcomeKind::Incremental);
    }

    #[rstest]
    fn test_classification_of_results() {
        let ok: Outcome<i32, &str> = Ok::<_, &str>(vec![1]).into_outcome();
        assert!(matches!(ok, Outcome::Ready(Emit::Many(ref values)) if values == &[1]));

        let failed: Outcome<i32, &str> = Err::<Vec<i32>, _>("bad").into_outcome();
        assert!(matches!(failed, Outcome::Failed("bad")));

        let nested: Outcome<i32, &str> = Ok::<_, &str>(Outcome::one(5)).into_outcome();
        assert!(matches!(nested, Outcome::Ready(Emit::One(5))));

        let unit: Outcome<i32, &str> = Ok::<(), &str>(()).into_outcome();
        assert!(matches!(unit, Outcome::Ready(Emit::Nothing)));
    }

    #[rstest]
    #[case(OutcomeKind::Immediate, "immediate")]
    #[case(OutcomeKind::Deferred, "deferred")]
    #[case(OutcomeKind::Incremental, "incremental")]
    #[case(OutcomeKind::Failed, "failed")]
    fn test_outcome_kind_display(#[case] kind: OutcomeKind, #[case] expected: &str) {
        assert_eq!(kind.to_string(), expected);
    }

    #[rstest]
    fn test_outcome_debug_hides_async_payloads() {
        let deferred: Outcome<i32, ()> = Outcome::deferred(async { Ok(Emit::Nothing) });
        assert_eq!(format!("{deferred:?}"), "Deferred(..)");
        assert_eq!(format!("{:?}", Outcome::<i32, ()>::one(3)), "Ready(One(3))");
    }
}
