//! Property-based tests for the effect combinator.
//!
//! - Output count and order for collections of any size
//! - Failure reporting count
//! - Normalization of identical outcomes
//! - Accumulate never loses output, preempt never emits stale output

use effect_stream::effect::{EffectConfig, EffectExt, EffectFailure, Emit, Normalized, Outcome};
use futures::{StreamExt, stream};
use proptest::prelude::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    /// A handler returning K values for one event yields exactly those K
    /// values, in order.
    #[test]
    fn prop_collection_is_emitted_in_order(values in prop::collection::vec(any::<i32>(), 0..32)) {
        let expected = values.clone();
        let config: EffectConfig<String> = EffectConfig::new();

        let outputs: Vec<i32> = block_on(
            stream::iter(vec![()])
                .effect(move |()| values.clone(), config)
                .collect(),
        );

        prop_assert_eq!(outputs, expected);
    }

    /// A producer yields the concatenation of its steps, in order.
    #[test]
    fn prop_producer_steps_are_concatenated(
        steps in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..4), 0..8)
    ) {
        let expected: Vec<u8> = steps.iter().flatten().copied().collect();
        let config: EffectConfig<String> = EffectConfig::new();

        let outputs: Vec<u8> = block_on(
            stream::iter(vec![()])
                .effect(
                    move |()| {
                        let steps = steps.clone();
                        Outcome::producer(stream::iter(
                            steps.into_iter().map(|step| Ok(Emit::Many(step))),
                        ))
                    },
                    config,
                )
                .collect(),
        );

        prop_assert_eq!(outputs, expected);
    }

    /// Every failing invocation is reported exactly once and the others
    /// still produce output.
    #[test]
    fn prop_failures_are_reported_once_each(fails in prop::collection::vec(any::<bool>(), 0..16)) {
        let reported = Arc::new(Mutex::new(Vec::new()));
        let reported_clone = Arc::clone(&reported);
        let config: EffectConfig<usize> = EffectConfig::new()
            .error_sink(move |failure| reported_clone.lock().unwrap().push(failure));
        let events: Vec<(usize, bool)> = fails.iter().copied().enumerate().collect();

        let outputs: Vec<usize> = block_on(
            stream::iter(events)
                .effect(
                    |(index, fail)| if fail { Err(index) } else { Ok(Some(index)) },
                    config,
                )
                .collect(),
        );

        let expected_failures: Vec<EffectFailure<usize>> = fails
            .iter()
            .enumerate()
            .filter(|(_, fail)| **fail)
            .map(|(index, _)| EffectFailure::Error(index))
            .collect();
        let mut reported = reported.lock().unwrap().clone();
        reported.sort_by_key(|failure| failure.as_error().copied());

        prop_assert_eq!(outputs.len(), fails.len() - expected_failures.len());
        prop_assert_eq!(reported, expected_failures);
    }

    /// Normalizing two structurally identical outcomes gives equal output.
    #[test]
    fn prop_identical_outcomes_normalize_identically(values in prop::collection::vec(any::<i16>(), 0..16)) {
        let first: Outcome<i16, String> = Outcome::many(values.clone());
        let second: Outcome<i16, String> = Outcome::many(values);

        let (left, right): (Vec<_>, Vec<_>) = block_on(async {
            (
                Normalized::from_outcome(first).collect().await,
                Normalized::from_outcome(second).collect().await,
            )
        });

        prop_assert_eq!(left, right);
    }

    /// Under accumulate every invocation's output arrives, whatever the timing.
    #[test]
    fn prop_accumulate_keeps_every_output(delays in prop::collection::vec(0_u64..50, 1..8)) {
        let config: EffectConfig<String> = EffectConfig::new().accumulate();
        let count = delays.len();

        let mut outputs: Vec<usize> = block_on(
            stream::iter(delays.into_iter().enumerate())
                .effect(
                    |(index, delay)| {
                        Outcome::deferred(async move {
                            tokio::time::sleep(Duration::from_millis(delay)).await;
                            Ok(Emit::Many(vec![index, index]))
                        })
                    },
                    config,
                )
                .collect(),
        );

        outputs.sort_unstable();
        let expected: Vec<usize> = (0..count).flat_map(|index| [index, index]).collect();
        prop_assert_eq!(outputs, expected);
    }

    /// Under preempt only the last of a burst of events produces output.
    #[test]
    fn prop_preempt_emits_only_latest(delays in prop::collection::vec(1_u64..50, 1..8)) {
        let config: EffectConfig<String> = EffectConfig::new().preempt();
        let last = delays.len() - 1;

        let outputs: Vec<usize> = block_on(
            stream::iter(delays.into_iter().enumerate())
                .effect(
                    |(index, delay)| {
                        Outcome::deferred(async move {
                            tokio::time::sleep(Duration::from_millis(delay)).await;
                            Ok(Emit::One(index))
                        })
                    },
                    config,
                )
                .collect(),
        );

        prop_assert_eq!(outputs, vec![last]);
    }
}
