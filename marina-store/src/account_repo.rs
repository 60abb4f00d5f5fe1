use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marina_core::{AccountDirectory, CoreError, CrewProfile, CrewStatus, MerchantProfile, MerchantStatus, Role};
use sqlx::PgPool;
use std::str::FromStr;
use uuid::Uuid;

pub struct PgAccountDirectory {
    pool: PgPool,
}

impl PgAccountDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const MERCHANT_COLUMNS: &str = "id, user_id, display_name, status, created_at";
const CREW_COLUMNS: &str = "id, user_id, merchant_id, display_name, status, rating, created_at";

#[derive(sqlx::FromRow)]
struct MerchantRow {
    id: Uuid,
    user_id: Uuid,
    display_name: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl MerchantRow {
    fn into_profile(self) -> Result<MerchantProfile, CoreError> {
        Ok(MerchantProfile {
            id: self.id,
            user_id: self.user_id,
            display_name: self.display_name,
            status: MerchantStatus::from_str(&self.status)?,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CrewRow {
    id: Uuid,
    user_id: Uuid,
    merchant_id: Uuid,
    display_name: String,
    status: String,
    rating: f64,
    created_at: DateTime<Utc>,
}

impl CrewRow {
    fn into_profile(self) -> Result<CrewProfile, CoreError> {
        Ok(CrewProfile {
            id: self.id,
            user_id: self.user_id,
            merchant_id: self.merchant_id,
            display_name: self.display_name,
            status: CrewStatus::from_str(&self.status)?,
            rating: self.rating,
            created_at: self.created_at,
        })
    }
}

#[async_trait]
impl AccountDirectory for PgAccountDirectory {
    async fn role_of(&self, user_id: Uuid) -> Result<Role, CoreError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT role FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(CoreError::storage)?;
        match row {
            Some((role,)) => Role::from_str(&role),
            None => Ok(Role::User),
        }
    }

    async fn merchant(&self, merchant_id: Uuid) -> Result<Option<MerchantProfile>, CoreError> {
        let row: Option<MerchantRow> =
            sqlx::query_as(&format!("SELECT {MERCHANT_COLUMNS} FROM merchants WHERE id = $1"))
                .bind(merchant_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(CoreError::storage)?;
        row.map(MerchantRow::into_profile).transpose()
    }

    async fn merchant_of_user(&self, user_id: Uuid) -> Result<Option<MerchantProfile>, CoreError> {
        let row: Option<MerchantRow> =
            sqlx::query_as(&format!("SELECT {MERCHANT_COLUMNS} FROM merchants WHERE user_id = $1"))
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(CoreError::storage)?;
        row.map(MerchantRow::into_profile).transpose()
    }

    async fn crew(&self, crew_id: Uuid) -> Result<Option<CrewProfile>, CoreError> {
        let row: Option<CrewRow> = sqlx::query_as(&format!("SELECT {CREW_COLUMNS} FROM crews WHERE id = $1"))
            .bind(crew_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(CoreError::storage)?;
        row.map(CrewRow::into_profile).transpose()
    }

    async fn crew_of_user(&self, user_id: Uuid) -> Result<Option<CrewProfile>, CoreError> {
        let row: Option<CrewRow> = sqlx::query_as(&format!("SELECT {CREW_COLUMNS} FROM crews WHERE user_id = $1"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(CoreError::storage)?;
        row.map(CrewRow::into_profile).transpose()
    }

    async fn crews_of_merchant(&self, merchant_id: Uuid) -> Result<Vec<CrewProfile>, CoreError> {
        let rows: Vec<CrewRow> = sqlx::query_as(&format!(
            "SELECT {CREW_COLUMNS} FROM crews WHERE merchant_id = $1 ORDER BY created_at"
        ))
        .bind(merchant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        rows.into_iter().map(CrewRow::into_profile).collect()
    }

    async fn apply_merchant(&self, user_id: Uuid, display_name: &str) -> Result<MerchantProfile, CoreError> {
        let row: Option<MerchantRow> = sqlx::query_as(&format!(
            "INSERT INTO merchants (id, user_id, display_name, status, created_at) \
             VALUES ($1, $2, $3, 'pending', $4) \
             ON CONFLICT (user_id) DO NOTHING \
             RETURNING {MERCHANT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(display_name)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::storage)?;

        match row {
            Some(row) => row.into_profile(),
            None => Err(CoreError::Validation("user already has a merchant profile".into())),
        }
    }

    async fn set_merchant_status(&self, merchant_id: Uuid, status: MerchantStatus) -> Result<MerchantProfile, CoreError> {
        let mut tx = self.pool.begin().await.map_err(CoreError::storage)?;

        let row: Option<MerchantRow> = sqlx::query_as(&format!(
            "UPDATE merchants SET status = $2 WHERE id = $1 RETURNING {MERCHANT_COLUMNS}"
        ))
        .bind(merchant_id)
        .bind(status.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(CoreError::storage)?;
        let profile = row.ok_or_else(|| CoreError::not_found("merchant"))?.into_profile()?;

        // Approval flips the owning account's role in the same
        // transaction.
        if status == MerchantStatus::Active {
            sqlx::query("UPDATE users SET role = 'merchant' WHERE id = $1")
                .bind(profile.user_id)
                .execute(&mut *tx)
                .await
                .map_err(CoreError::storage)?;
        }

        tx.commit().await.map_err(CoreError::storage)?;
        Ok(profile)
    }

    async fn add_crew(&self, merchant_id: Uuid, user_id: Uuid, display_name: &str) -> Result<CrewProfile, CoreError> {
        let row: CrewRow = sqlx::query_as(&format!(
            "INSERT INTO crews (id, user_id, merchant_id, display_name, status, rating, created_at) \
             VALUES ($1, $2, $3, $4, 'pending', 0, $5) \
             RETURNING {CREW_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(merchant_id)
        .bind(display_name)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        row.into_profile()
    }

    async fn set_crew_status(&self, crew_id: Uuid, status: CrewStatus) -> Result<CrewProfile, CoreError> {
        let mut tx = self.pool.begin().await.map_err(CoreError::storage)?;

        let row: Option<CrewRow> =
            sqlx::query_as(&format!("UPDATE crews SET status = $2 WHERE id = $1 RETURNING {CREW_COLUMNS}"))
                .bind(crew_id)
                .bind(status.as_str())
                .fetch_optional(&mut *tx)
                .await
                .map_err(CoreError::storage)?;
        let profile = row.ok_or_else(|| CoreError::not_found("crew"))?.into_profile()?;

        if status == CrewStatus::Active {
            sqlx::query("UPDATE users SET role = 'crew' WHERE id = $1")
                .bind(profile.user_id)
                .execute(&mut *tx)
                .await
                .map_err(CoreError::storage)?;
        }

        tx.commit().await.map_err(CoreError::storage)?;
        Ok(profile)
    }

    async fn update_crew_rating(&self, crew_id: Uuid, rating: f64) -> Result<(), CoreError> {
        sqlx::query("UPDATE crews SET rating = $2 WHERE id = $1")
            .bind(crew_id)
            .bind(rating)
            .execute(&self.pool)
            .await
            .map_err(CoreError::storage)?;
        Ok(())
    }
}
