use serde::Serialize;

/// How a booking amount is divided between platform and owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaymentSplit {
    /// Amount charged to the traveler, in cents
    pub amount_cents: i64,
    /// Platform fee, in cents
    pub platform_fee_cents: i64,
    /// Amount transferred to the owner, in cents
    pub owner_amount_cents: i64,
}

/// Splits `amount_cents` keeping `fee_percent` for the platform, rounded to
/// the nearest cent. The two shares always add up to the amount.
pub fn split_amount(amount_cents: i64, fee_percent: f64) -> PaymentSplit {
    let fee = (amount_cents as f64 * fee_percent / 100.0).round() as i64;
    let platform_fee_cents = fee.clamp(0, amount_cents.max(0));

    PaymentSplit {
        amount_cents,
        platform_fee_cents,
        owner_amount_cents: amount_cents - platform_fee_cents,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_fee_split() {
        let split = split_amount(10_000, 3.0);
        assert_eq!(split.platform_fee_cents, 300);
        assert_eq!(split.owner_amount_cents, 9_700);
    }

    #[test]
    fn test_fee_rounds_to_nearest_cent() {
        // 3% of $45.50 is 136.5 cents
        let split = split_amount(4_550, 3.0);
        assert_eq!(split.platform_fee_cents, 137);
        assert_eq!(split.owner_amount_cents, 4_413);

        let split = split_amount(4_549, 3.0);
        assert_eq!(split.platform_fee_cents, 136);
    }

    #[test]
    fn test_shares_add_up() {
        for amount in [1, 99, 1_234, 87_654] {
            let split = split_amount(amount, 2.9);
            assert_eq!(split.platform_fee_cents + split.owner_amount_cents, amount);
        }
    }

    #[test]
    fn test_zero_fee() {
        let split = split_amount(5_000, 0.0);
        assert_eq!(split.platform_fee_cents, 0);
        assert_eq!(split.owner_amount_cents, 5_000);
    }
}
