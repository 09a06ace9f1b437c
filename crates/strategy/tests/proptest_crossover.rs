use proptest::prelude::*;
use rust_decimal::Decimal;

use strategy::{CrossoverTracker, Signal};

fn decimal() -> impl Strategy<Value = Decimal> {
    (1i64..2_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

proptest! {
    /// While the sign of short - long holds, nothing is emitted.
    #[test]
    fn constant_sign_never_signals(
        long in decimal(),
        gaps in prop::collection::vec(1i64..100_000, 1..50),
        above in any::<bool>(),
    ) {
        let mut tracker = CrossoverTracker::new();
        for gap in gaps {
            let gap = Decimal::new(gap, 2);
            let short = if above { long + gap } else { long - gap };
            prop_assert_eq!(tracker.observe(short, long), None);
        }
    }

    /// A flip between consecutive non-zero readings emits exactly one signal
    /// in the direction of the new sign.
    #[test]
    fn sign_flip_signals_once(
        long in decimal(),
        before in prop::collection::vec(1i64..100_000, 1..20),
        after in prop::collection::vec(1i64..100_000, 1..20),
        upward in any::<bool>(),
    ) {
        let mut tracker = CrossoverTracker::new();
        let (first, second) = if upward { (-1, 1) } else { (1, -1) };
        let mut signals = Vec::new();
        for gap in before {
            signals.push(tracker.observe(long + Decimal::new(gap * first, 2), long));
        }
        prop_assert!(signals.iter().all(Option::is_none));

        let flip = tracker.observe(long + Decimal::new(after[0] * second, 2), long);
        let expected = if upward { Signal::Buy } else { Signal::Sell };
        prop_assert_eq!(flip, Some(expected));

        for gap in &after[1..] {
            prop_assert_eq!(tracker.observe(long + Decimal::new(gap * second, 2), long), None);
        }
    }

    /// Equal averages neither signal nor overwrite the stored sign, wherever
    /// they appear in the sequence.
    #[test]
    fn zero_difference_is_inert(
        long in decimal(),
        readings in prop::collection::vec(-3i64..=3, 1..60),
    ) {
        let mut tracker = CrossoverTracker::new();
        let mut previous: Option<i8> = None;
        for r in readings {
            let short = long + Decimal::from(r);
            let signal = tracker.observe(short, long);
            if r == 0 {
                prop_assert_eq!(signal, None);
                prop_assert_eq!(tracker.previous_sign(), previous);
            } else {
                let sign = if r > 0 { 1 } else { -1 };
                let flipped = previous.map_or(false, |p| p != sign);
                prop_assert_eq!(signal.is_some(), flipped);
                previous = Some(sign);
            }
        }
    }
}
