use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places kept for every monetary amount.
pub const MONEY_SCALE: u32 = 2;

/// Rounds `amount` to [`MONEY_SCALE`] places, half away from zero, which is
/// what a `NUMERIC(_, 2)` column does on write.
pub fn round_money(amount: Decimal) -> Decimal {
    let mut rounded =
        amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MONEY_SCALE);
    rounded
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round_money(dec("19.999")).to_string(), "20.00");
        assert_eq!(round_money(dec("0.125")).to_string(), "0.13");
        assert_eq!(round_money(dec("-0.125")).to_string(), "-0.13");
        assert_eq!(round_money(dec("0.124")).to_string(), "0.12");
    }

    #[test]
    fn pads_to_two_places() {
        assert_eq!(round_money(dec("10")).to_string(), "10.00");
        assert_eq!(round_money(dec("4.5")).to_string(), "4.50");
        assert_eq!(round_money(dec("19.99")).to_string(), "19.99");
    }
}
