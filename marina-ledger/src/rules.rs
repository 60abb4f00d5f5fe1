use marina_shared::Cents;

use crate::models::SplitRule;

/// Round `gross * pct%` half-up to a whole cent.
fn share(gross: Cents, pct: i32) -> Cents {
    (gross * pct as i64 + 50) / 100
}

/// Compute the three-way split for a gross amount under a rule.
///
/// The platform and merchant shares round half-up from their percentages;
/// the crew share absorbs the remainder so the three always sum exactly to
/// the gross. When no crew participates (product orders, or a booking with
/// no assigned crew), the crew share folds into the merchant share and the
/// merchant absorbs the remainder instead.
pub fn split_amounts(gross: Cents, rule: &SplitRule, has_crew: bool) -> (Cents, Cents, Cents) {
    let platform = share(gross, rule.platform_pct);
    if has_crew && rule.crew_pct > 0 {
        let merchant = share(gross, rule.merchant_pct);
        (platform, merchant, gross - platform - merchant)
    } else {
        (platform, gross - platform, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SplitKind;

    #[test]
    fn booking_split_five_thirtyfive_sixty() {
        let rule = SplitRule::booking_default();
        let (platform, merchant, crew) = split_amounts(20000, &rule, true);
        assert_eq!(platform, 1000);
        assert_eq!(merchant, 7000);
        assert_eq!(crew, 12000);
    }

    #[test]
    fn order_split_ten_ninety() {
        let rule = SplitRule::order_default();
        let (platform, merchant, crew) = split_amounts(15000, &rule, false);
        assert_eq!(platform, 1500);
        assert_eq!(merchant, 13500);
        assert_eq!(crew, 0);
    }

    #[test]
    fn crewless_booking_folds_crew_share_into_merchant() {
        let rule = SplitRule::booking_default();
        let (platform, merchant, crew) = split_amounts(20000, &rule, false);
        assert_eq!(platform, 1000);
        assert_eq!(merchant, 19000);
        assert_eq!(crew, 0);
    }

    #[test]
    fn shares_always_reconcile_exactly() {
        let booking = SplitRule::booking_default();
        let order = SplitRule::order_default();
        for gross in [0, 1, 3, 7, 99, 101, 12345, 99999, 1_000_001] {
            for (rule, has_crew) in [(&booking, true), (&booking, false), (&order, false)] {
                let (platform, merchant, crew) = split_amounts(gross, rule, has_crew);
                assert_eq!(platform + merchant + crew, gross, "gross={gross}");
                assert!(platform >= 0 && merchant >= 0 && crew >= 0, "gross={gross}");
            }
        }
    }

    #[test]
    fn remainder_lands_on_crew_share() {
        // 101 * 5% = 5.05 -> 5; 101 * 35% = 35.35 -> 35; crew takes 61.
        let rule = SplitRule::booking_default();
        let (platform, merchant, crew) = split_amounts(101, &rule, true);
        assert_eq!((platform, merchant, crew), (5, 35, 61));
    }

    #[test]
    fn awkward_percentages_still_reconcile() {
        let rule = SplitRule::new(SplitKind::BookingService, 33, 33, 34);
        for gross in [100, 101, 102, 103] {
            let (platform, merchant, crew) = split_amounts(gross, &rule, true);
            assert_eq!(platform + merchant + crew, gross);
        }
    }
}
