use marina_core::{Actor, CrewProfile, MerchantProfile};

use crate::models::Booking;

/// Capability checks evaluated before every guarded transition. Explicit
/// functions, one per operation, rather than role dispatch.
pub fn can_confirm(merchant: Option<&MerchantProfile>, booking: &Booking) -> bool {
    merchant.map_or(false, |m| m.id == booking.merchant_id)
}

/// Requester and the boat's merchant may cancel; admins may always.
pub fn can_cancel(actor: &Actor, merchant: Option<&MerchantProfile>, booking: &Booking) -> bool {
    actor.is_admin() || booking.user_id == actor.user_id || merchant.map_or(false, |m| m.id == booking.merchant_id)
}

/// Only the assigned crew member may mark the charter complete.
pub fn can_complete(crew: Option<&CrewProfile>, booking: &Booking) -> bool {
    match (crew, booking.assigned_crew_id) {
        (Some(crew), Some(assigned)) => crew.id == assigned,
        _ => false,
    }
}

/// Only the requester of the booking may rate its crew.
pub fn can_rate(actor: &Actor, booking: &Booking) -> bool {
    booking.user_id == actor.user_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use marina_core::{CrewStatus, MerchantStatus, Role};
    use uuid::Uuid;

    use crate::models::TimeWindow;

    fn booking_fixture(user_id: Uuid, merchant_id: Uuid) -> Booking {
        let start = Utc::now() + Duration::hours(3);
        let window = TimeWindow::new(start, start + Duration::hours(2)).unwrap();
        Booking::new(
            user_id,
            Uuid::new_v4(),
            merchant_id,
            window,
            4,
            10000,
            20000,
            "Ada".into(),
            "555-0100".into(),
            None,
        )
    }

    fn merchant_fixture(merchant_id: Uuid, user_id: Uuid) -> MerchantProfile {
        MerchantProfile {
            id: merchant_id,
            user_id,
            display_name: "Blue Bay".into(),
            status: MerchantStatus::Active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn only_owning_merchant_confirms() {
        let merchant_id = Uuid::new_v4();
        let booking = booking_fixture(Uuid::new_v4(), merchant_id);

        let owner = merchant_fixture(merchant_id, Uuid::new_v4());
        let other = merchant_fixture(Uuid::new_v4(), Uuid::new_v4());

        assert!(can_confirm(Some(&owner), &booking));
        assert!(!can_confirm(Some(&other), &booking));
        assert!(!can_confirm(None, &booking));
    }

    #[test]
    fn requester_merchant_and_admin_can_cancel() {
        let user_id = Uuid::new_v4();
        let merchant_id = Uuid::new_v4();
        let booking = booking_fixture(user_id, merchant_id);
        let merchant = merchant_fixture(merchant_id, Uuid::new_v4());

        let requester = Actor::new(user_id, Role::User);
        let stranger = Actor::new(Uuid::new_v4(), Role::User);
        let admin = Actor::new(Uuid::new_v4(), Role::Admin);

        assert!(can_cancel(&requester, None, &booking));
        assert!(can_cancel(&stranger, Some(&merchant), &booking));
        assert!(!can_cancel(&stranger, None, &booking));
        assert!(can_cancel(&admin, None, &booking));
    }

    #[test]
    fn only_assigned_crew_completes() {
        let mut booking = booking_fixture(Uuid::new_v4(), Uuid::new_v4());
        let crew = CrewProfile {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            merchant_id: booking.merchant_id,
            display_name: "Skipper".into(),
            status: CrewStatus::Active,
            rating: 0.0,
            created_at: Utc::now(),
        };

        assert!(!can_complete(Some(&crew), &booking));
        booking.assigned_crew_id = Some(crew.id);
        assert!(can_complete(Some(&crew), &booking));
        booking.assigned_crew_id = Some(Uuid::new_v4());
        assert!(!can_complete(Some(&crew), &booking));
    }
}
