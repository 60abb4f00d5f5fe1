use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marina_booking::{Booking, BookingRepository, BookingStatus, CrewRating, TimeWindow};
use marina_core::CoreError;
use sqlx::PgPool;
use std::str::FromStr;
use uuid::Uuid;

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const BOOKING_COLUMNS: &str = "id, booking_number, user_id, boat_id, merchant_id, assigned_crew_id, \
     start_time, end_time, passenger_count, hourly_rate_cents, total_cents, status, \
     contact_name, contact_phone, user_notes, merchant_notes, cancel_reason, \
     created_at, updated_at, confirmed_at, completed_at, cancelled_at";

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    booking_number: String,
    user_id: Uuid,
    boat_id: Uuid,
    merchant_id: Uuid,
    assigned_crew_id: Option<Uuid>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    passenger_count: i32,
    hourly_rate_cents: i64,
    total_cents: i64,
    status: String,
    contact_name: String,
    contact_phone: String,
    user_notes: Option<String>,
    merchant_notes: Option<String>,
    cancel_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    confirmed_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl BookingRow {
    fn into_booking(self) -> Result<Booking, CoreError> {
        Ok(Booking {
            id: self.id,
            booking_number: self.booking_number,
            user_id: self.user_id,
            boat_id: self.boat_id,
            merchant_id: self.merchant_id,
            assigned_crew_id: self.assigned_crew_id,
            start_time: self.start_time,
            end_time: self.end_time,
            passenger_count: self.passenger_count,
            hourly_rate_cents: self.hourly_rate_cents,
            total_cents: self.total_cents,
            status: BookingStatus::from_str(&self.status)?,
            contact_name: self.contact_name,
            contact_phone: self.contact_phone,
            user_notes: self.user_notes,
            merchant_notes: self.merchant_notes,
            cancel_reason: self.cancel_reason,
            created_at: self.created_at,
            updated_at: self.updated_at,
            confirmed_at: self.confirmed_at,
            completed_at: self.completed_at,
            cancelled_at: self.cancelled_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RatingRow {
    id: Uuid,
    booking_id: Uuid,
    user_id: Uuid,
    crew_id: Uuid,
    rating: i32,
    comment: Option<String>,
    created_at: DateTime<Utc>,
}

impl RatingRow {
    fn into_rating(self) -> CrewRating {
        CrewRating {
            id: self.id,
            booking_id: self.booking_id,
            user_id: self.user_id,
            crew_id: self.crew_id,
            rating: self.rating,
            comment: self.comment,
            created_at: self.created_at,
        }
    }
}

impl PgBookingRepository {
    /// Fetch the current status for a precise stale-state error; a
    /// missing row maps to NotFound.
    async fn stale_or_missing(&self, id: Uuid, event: &'static str) -> CoreError {
        let current: Result<Option<(String,)>, sqlx::Error> =
            sqlx::query_as("SELECT status FROM bookings WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await;
        match current {
            Ok(Some((status,))) => CoreError::stale("booking", event, status),
            Ok(None) => CoreError::not_found("booking"),
            Err(err) => CoreError::storage(err),
        }
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn create(&self, booking: Booking) -> Result<Booking, CoreError> {
        let mut tx = self.pool.begin().await.map_err(CoreError::storage)?;

        // Serialize concurrent creates for this boat so the overlap check
        // and the insert act as one atomic unit.
        let locked: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM boats WHERE id = $1 FOR UPDATE")
            .bind(booking.boat_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(CoreError::storage)?;
        if locked.is_none() {
            return Err(CoreError::not_found("boat"));
        }

        let (conflict,): (bool,) = sqlx::query_as(
            "SELECT EXISTS( \
                 SELECT 1 FROM bookings \
                 WHERE boat_id = $1 \
                   AND status IN ('pending', 'confirmed') \
                   AND start_time < $3 AND end_time > $2)",
        )
        .bind(booking.boat_id)
        .bind(booking.start_time)
        .bind(booking.end_time)
        .fetch_one(&mut *tx)
        .await
        .map_err(CoreError::storage)?;
        if conflict {
            return Err(CoreError::OverlapConflict);
        }

        sqlx::query(
            "INSERT INTO bookings ( \
                 id, booking_number, user_id, boat_id, merchant_id, assigned_crew_id, \
                 start_time, end_time, passenger_count, hourly_rate_cents, total_cents, status, \
                 contact_name, contact_phone, user_notes, merchant_notes, cancel_reason, \
                 created_at, updated_at, confirmed_at, completed_at, cancelled_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)",
        )
        .bind(booking.id)
        .bind(&booking.booking_number)
        .bind(booking.user_id)
        .bind(booking.boat_id)
        .bind(booking.merchant_id)
        .bind(booking.assigned_crew_id)
        .bind(booking.start_time)
        .bind(booking.end_time)
        .bind(booking.passenger_count)
        .bind(booking.hourly_rate_cents)
        .bind(booking.total_cents)
        .bind(booking.status.as_str())
        .bind(&booking.contact_name)
        .bind(&booking.contact_phone)
        .bind(&booking.user_notes)
        .bind(&booking.merchant_notes)
        .bind(&booking.cancel_reason)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .bind(booking.confirmed_at)
        .bind(booking.completed_at)
        .bind(booking.cancelled_at)
        .execute(&mut *tx)
        .await
        .map_err(CoreError::storage)?;

        tx.commit().await.map_err(CoreError::storage)?;
        Ok(booking)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Booking>, CoreError> {
        let row: Option<BookingRow> =
            sqlx::query_as(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(CoreError::storage)?;
        row.map(BookingRow::into_booking).transpose()
    }

    async fn confirm(
        &self,
        id: Uuid,
        crew_id: Uuid,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Booking, CoreError> {
        let row: Option<BookingRow> = sqlx::query_as(&format!(
            "UPDATE bookings \
             SET status = 'confirmed', assigned_crew_id = $2, \
                 merchant_notes = COALESCE($3, merchant_notes), \
                 confirmed_at = $4, updated_at = $4 \
             WHERE id = $1 AND status = 'pending' \
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(id)
        .bind(crew_id)
        .bind(notes)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::storage)?;

        match row {
            Some(row) => row.into_booking(),
            None => Err(self.stale_or_missing(id, "confirm").await),
        }
    }

    async fn cancel(
        &self,
        id: Uuid,
        expected: &[BookingStatus],
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(Booking, BookingStatus), CoreError> {
        let expected_strings: Vec<String> = expected.iter().map(|s| s.as_str().to_string()).collect();
        let row: Option<BookingRow> = sqlx::query_as(&format!(
            "UPDATE bookings \
             SET status = 'cancelled', cancel_reason = $3, cancelled_at = $4, updated_at = $4 \
             WHERE id = $1 AND status = ANY($2) \
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(id)
        .bind(&expected_strings)
        .bind(reason)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::storage)?;

        match row {
            Some(row) => {
                // RETURNING sees the post-update row; reconstruct the
                // previous status from the expected set when unambiguous,
                // otherwise from the stamped confirmation time.
                let previous = if expected.len() == 1 {
                    expected[0]
                } else if row.confirmed_at.is_some() {
                    BookingStatus::Confirmed
                } else {
                    BookingStatus::Pending
                };
                Ok((row.into_booking()?, previous))
            }
            None => Err(self.stale_or_missing(id, "cancel").await),
        }
    }

    async fn complete(&self, id: Uuid, now: DateTime<Utc>) -> Result<Booking, CoreError> {
        let row: Option<BookingRow> = sqlx::query_as(&format!(
            "UPDATE bookings \
             SET status = 'completed', completed_at = $2, updated_at = $2 \
             WHERE id = $1 AND status = 'confirmed' \
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::storage)?;

        match row {
            Some(row) => row.into_booking(),
            None => Err(self.stale_or_missing(id, "complete").await),
        }
    }

    async fn expired_pending(&self, cutoff: DateTime<Utc>) -> Result<Vec<Uuid>, CoreError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM bookings \
             WHERE status = 'pending' AND created_at <= $1 \
             ORDER BY created_at",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn boat_has_conflict(
        &self,
        boat_id: Uuid,
        window: TimeWindow,
        exclude: Option<Uuid>,
    ) -> Result<bool, CoreError> {
        let (conflict,): (bool,) = sqlx::query_as(
            "SELECT EXISTS( \
                 SELECT 1 FROM bookings \
                 WHERE boat_id = $1 \
                   AND ($4::uuid IS NULL OR id <> $4) \
                   AND status IN ('pending', 'confirmed') \
                   AND start_time < $3 AND end_time > $2)",
        )
        .bind(boat_id)
        .bind(window.start)
        .bind(window.end)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        Ok(conflict)
    }

    async fn crew_has_conflict(
        &self,
        crew_id: Uuid,
        window: TimeWindow,
        exclude: Option<Uuid>,
    ) -> Result<bool, CoreError> {
        let (conflict,): (bool,) = sqlx::query_as(
            "SELECT EXISTS( \
                 SELECT 1 FROM bookings \
                 WHERE assigned_crew_id = $1 \
                   AND ($4::uuid IS NULL OR id <> $4) \
                   AND status = 'confirmed' \
                   AND start_time < $3 AND end_time > $2)",
        )
        .bind(crew_id)
        .bind(window.start)
        .bind(window.end)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        Ok(conflict)
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        status: Option<BookingStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Booking>, CoreError> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE user_id = $1 AND ($2::text IS NULL OR status = $2) \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4"
        ))
        .bind(user_id)
        .bind(status.map(|s| s.as_str().to_string()))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        rows.into_iter().map(BookingRow::into_booking).collect()
    }

    async fn list_for_merchant(
        &self,
        merchant_id: Uuid,
        status: Option<BookingStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Booking>, CoreError> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE merchant_id = $1 AND ($2::text IS NULL OR status = $2) \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4"
        ))
        .bind(merchant_id)
        .bind(status.map(|s| s.as_str().to_string()))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        rows.into_iter().map(BookingRow::into_booking).collect()
    }

    async fn insert_rating(&self, rating: CrewRating) -> Result<CrewRating, CoreError> {
        let row: Option<RatingRow> = sqlx::query_as(
            "INSERT INTO crew_ratings (id, booking_id, user_id, crew_id, rating, comment, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (booking_id) DO NOTHING \
             RETURNING id, booking_id, user_id, crew_id, rating, comment, created_at",
        )
        .bind(rating.id)
        .bind(rating.booking_id)
        .bind(rating.user_id)
        .bind(rating.crew_id)
        .bind(rating.rating)
        .bind(&rating.comment)
        .bind(rating.created_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::storage)?;

        match row {
            Some(row) => Ok(row.into_rating()),
            None => Err(CoreError::Validation("booking has already been rated".into())),
        }
    }

    async fn rating_for_booking(&self, booking_id: Uuid) -> Result<Option<CrewRating>, CoreError> {
        let row: Option<RatingRow> = sqlx::query_as(
            "SELECT id, booking_id, user_id, crew_id, rating, comment, created_at \
             FROM crew_ratings WHERE booking_id = $1",
        )
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        Ok(row.map(RatingRow::into_rating))
    }

    async fn ratings_for_crew(&self, crew_id: Uuid) -> Result<Vec<CrewRating>, CoreError> {
        let rows: Vec<RatingRow> = sqlx::query_as(
            "SELECT id, booking_id, user_id, crew_id, rating, comment, created_at \
             FROM crew_ratings WHERE crew_id = $1 ORDER BY created_at",
        )
        .bind(crew_id)
        .fetch_all(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        Ok(rows.into_iter().map(RatingRow::into_rating).collect())
    }
}
