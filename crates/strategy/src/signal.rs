use std::cmp::Ordering;

use rust_decimal::Decimal;

use common::OrderDirection;

/// A buy/sell recommendation derived from crossing moving averages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Buy,
    Sell,
}

impl Signal {
    pub fn direction(self) -> OrderDirection {
        match self {
            Signal::Buy => OrderDirection::Buy,
            Signal::Sell => OrderDirection::Sell,
        }
    }
}

/// Sign of `short - long`: -1, 0 or +1.
pub fn crossover_sign(short_average: Decimal, long_average: Decimal) -> i8 {
    match short_average.cmp(&long_average) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

/// Remembers the last non-zero sign and reports a signal when it flips.
///
/// Equal averages are ambiguous: they produce nothing and leave the stored
/// sign alone, so `+1, 0, -1` still counts as one crossing.
#[derive(Debug, Clone, Default)]
pub struct CrossoverTracker {
    previous_sign: Option<i8>,
}

impl CrossoverTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous_sign(&self) -> Option<i8> {
        self.previous_sign
    }

    pub fn observe(&mut self, short_average: Decimal, long_average: Decimal) -> Option<Signal> {
        let sign = crossover_sign(short_average, long_average);
        if sign == 0 {
            return None;
        }

        let signal = match self.previous_sign {
            Some(previous) if previous != sign => Some(if sign > 0 { Signal::Buy } else { Signal::Sell }),
            _ => None,
        };
        self.previous_sign = Some(sign);
        signal
    }
}
