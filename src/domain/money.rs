//! Decimal quantization for money and exchange rates.
//!
//! Money is quantized to 2 fractional digits, exchange rates to 6, both using
//! banker's rounding (round-half-to-even) by default. Neither function touches
//! any ambient/thread-local decimal context: scale and rounding strategy are
//! explicit arguments on every call.

use rust_decimal::{Decimal, RoundingStrategy};

/// Default fractional digits for money amounts.
pub const DEFAULT_MONEY_SCALE: u32 = 2;

/// Default fractional digits for exchange rates.
pub const DEFAULT_RATE_SCALE: u32 = 6;

/// Rounding mode applied by [`quantize`]. Mirrors the subset of
/// `rust_decimal::RoundingStrategy` that the spec's `ROUNDING` setting exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Round half to even (banker's rounding). The default.
    HalfEven,
    /// Round half away from zero.
    HalfUp,
    /// Always round toward zero (truncate).
    Truncate,
}

impl Rounding {
    fn strategy(self) -> RoundingStrategy {
        match self {
            Rounding::HalfEven => RoundingStrategy::MidpointNearestEven,
            Rounding::HalfUp => RoundingStrategy::MidpointAwayFromZero,
            Rounding::Truncate => RoundingStrategy::ToZero,
        }
    }
}

impl Default for Rounding {
    fn default() -> Self {
        Rounding::HalfEven
    }
}

/// Quantize `x` to `scale` fractional digits using `rounding`. Pure function;
/// does not mutate any ambient decimal context.
pub fn quantize(x: Decimal, scale: u32, rounding: Rounding) -> Decimal {
    x.round_dp_with_strategy(scale, rounding.strategy())
}

/// Quantize a money amount to [`DEFAULT_MONEY_SCALE`] with banker's rounding.
pub fn money_quantize(x: Decimal) -> Decimal {
    quantize(x, DEFAULT_MONEY_SCALE, Rounding::HalfEven)
}

/// Quantize an exchange rate to [`DEFAULT_RATE_SCALE`] with banker's rounding.
pub fn rate_quantize(x: Decimal) -> Decimal {
    quantize(x, DEFAULT_RATE_SCALE, Rounding::HalfEven)
}

/// Quantize a money amount with an explicit scale/rounding pair, for callers
/// wired to the `MONEY_SCALE`/`ROUNDING` settings instead of the defaults.
pub fn money_quantize_with(x: Decimal, scale: u32, rounding: Rounding) -> Decimal {
    quantize(x, scale, rounding)
}

/// Quantize a rate with an explicit scale/rounding pair, for callers wired to
/// the `RATE_SCALE`/`ROUNDING` settings instead of the defaults.
pub fn rate_quantize_with(x: Decimal, scale: u32, rounding: Rounding) -> Decimal {
    quantize(x, scale, rounding)
}

/// The `MONEY_SCALE`/`RATE_SCALE`/`ROUNDING` settings bundled together, so
/// services that quantize take one value instead of three. Built from
/// [`crate::config::Settings`] at startup; defaults match the crate's
/// hardcoded scales for callers (mostly tests) that don't load config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoneyScale {
    pub money_scale: u32,
    pub rate_scale: u32,
    pub rounding: Rounding,
}

impl Default for MoneyScale {
    fn default() -> Self {
        Self {
            money_scale: DEFAULT_MONEY_SCALE,
            rate_scale: DEFAULT_RATE_SCALE,
            rounding: Rounding::HalfEven,
        }
    }
}

impl MoneyScale {
    pub fn money(&self, x: Decimal) -> Decimal {
        money_quantize_with(x, self.money_scale, self.rounding)
    }

    pub fn rate(&self, x: Decimal) -> Decimal {
        rate_quantize_with(x, self.rate_scale, self.rounding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn money_quantize_rounds_half_to_even() {
        assert_eq!(money_quantize(dec!(1.005)), dec!(1.00));
        assert_eq!(money_quantize(dec!(1.015)), dec!(1.02));
        assert_eq!(money_quantize(dec!(2.675)), dec!(2.68));
    }

    #[test]
    fn rate_quantize_keeps_six_digits() {
        assert_eq!(rate_quantize(dec!(1.2500001)), dec!(1.250000));
        assert_eq!(rate_quantize(dec!(1.25)), dec!(1.250000));
    }

    #[test]
    fn quantize_is_idempotent() {
        let once = money_quantize(dec!(10.126));
        let twice = money_quantize(once);
        assert_eq!(once, twice);

        let once = rate_quantize(dec!(1.23456789));
        let twice = rate_quantize(once);
        assert_eq!(once, twice);
    }

    #[test]
    fn truncate_strategy_drops_fraction() {
        assert_eq!(quantize(dec!(1.999), 2, Rounding::Truncate), dec!(1.99));
    }

    #[test]
    fn money_scale_applies_configured_scale_and_rounding() {
        let scale = MoneyScale {
            money_scale: 4,
            rate_scale: 3,
            rounding: Rounding::Truncate,
        };
        assert_eq!(scale.money(dec!(1.99999)), dec!(1.9999));
        assert_eq!(scale.rate(dec!(1.2349)), dec!(1.234));
    }
}
