use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Crew,
    Merchant,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Crew => "crew",
            Role::Merchant => "merchant",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "crew" => Ok(Role::Crew),
            "merchant" => Ok(Role::Merchant),
            "admin" => Ok(Role::Admin),
            other => Err(CoreError::Validation(format!("unknown role: {other}"))),
        }
    }
}

/// The authenticated principal behind a request, as resolved from its
/// token claims. Engines evaluate explicit capability checks against it
/// before every guarded transition.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MerchantStatus {
    Pending,
    Active,
    Suspended,
    Rejected,
}

impl MerchantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MerchantStatus::Pending => "pending",
            MerchantStatus::Active => "active",
            MerchantStatus::Suspended => "suspended",
            MerchantStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for MerchantStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MerchantStatus::Pending),
            "active" => Ok(MerchantStatus::Active),
            "suspended" => Ok(MerchantStatus::Suspended),
            "rejected" => Ok(MerchantStatus::Rejected),
            other => Err(CoreError::Validation(format!("unknown merchant status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub display_name: String,
    pub status: MerchantStatus,
    pub created_at: DateTime<Utc>,
}

impl MerchantProfile {
    pub fn is_active(&self) -> bool {
        self.status == MerchantStatus::Active
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CrewStatus {
    Pending,
    Active,
    Inactive,
}

impl CrewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrewStatus::Pending => "pending",
            CrewStatus::Active => "active",
            CrewStatus::Inactive => "inactive",
        }
    }
}

impl FromStr for CrewStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CrewStatus::Pending),
            "active" => Ok(CrewStatus::Active),
            "inactive" => Ok(CrewStatus::Inactive),
            other => Err(CoreError::Validation(format!("unknown crew status: {other}"))),
        }
    }
}

/// A crew member belongs to exactly one merchant. `rating` is the running
/// average of post-completion ratings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub merchant_id: Uuid,
    pub display_name: String,
    pub status: CrewStatus,
    pub rating: f64,
    pub created_at: DateTime<Utc>,
}

impl CrewProfile {
    pub fn is_active(&self) -> bool {
        self.status == CrewStatus::Active
    }
}

/// Account Directory: identity, role and onboarding state. Engines treat
/// this as an external collaborator with a narrow interface.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn role_of(&self, user_id: Uuid) -> Result<Role, CoreError>;

    async fn merchant(&self, merchant_id: Uuid) -> Result<Option<MerchantProfile>, CoreError>;
    async fn merchant_of_user(&self, user_id: Uuid) -> Result<Option<MerchantProfile>, CoreError>;
    async fn crew(&self, crew_id: Uuid) -> Result<Option<CrewProfile>, CoreError>;
    async fn crew_of_user(&self, user_id: Uuid) -> Result<Option<CrewProfile>, CoreError>;
    async fn crews_of_merchant(&self, merchant_id: Uuid) -> Result<Vec<CrewProfile>, CoreError>;

    /// Onboarding: a user applies for a merchant profile (Pending).
    async fn apply_merchant(&self, user_id: Uuid, display_name: &str) -> Result<MerchantProfile, CoreError>;
    /// Admin approval path. Approving flips the owning account's role.
    async fn set_merchant_status(&self, merchant_id: Uuid, status: MerchantStatus) -> Result<MerchantProfile, CoreError>;
    /// A merchant registers a crew member (Pending until activated).
    async fn add_crew(&self, merchant_id: Uuid, user_id: Uuid, display_name: &str) -> Result<CrewProfile, CoreError>;
    async fn set_crew_status(&self, crew_id: Uuid, status: CrewStatus) -> Result<CrewProfile, CoreError>;

    async fn update_crew_rating(&self, crew_id: Uuid, rating: f64) -> Result<(), CoreError>;
}

/// In-memory directory for tests and local development.
#[derive(Default)]
pub struct InMemoryAccountDirectory {
    roles: RwLock<HashMap<Uuid, Role>>,
    merchants: RwLock<HashMap<Uuid, MerchantProfile>>,
    crews: RwLock<HashMap<Uuid, CrewProfile>>,
}

impl InMemoryAccountDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_role(&self, user_id: Uuid, role: Role) {
        self.roles.write().await.insert(user_id, role);
    }
}

#[async_trait]
impl AccountDirectory for InMemoryAccountDirectory {
    async fn role_of(&self, user_id: Uuid) -> Result<Role, CoreError> {
        Ok(self.roles.read().await.get(&user_id).copied().unwrap_or(Role::User))
    }

    async fn merchant(&self, merchant_id: Uuid) -> Result<Option<MerchantProfile>, CoreError> {
        Ok(self.merchants.read().await.get(&merchant_id).cloned())
    }

    async fn merchant_of_user(&self, user_id: Uuid) -> Result<Option<MerchantProfile>, CoreError> {
        Ok(self
            .merchants
            .read()
            .await
            .values()
            .find(|m| m.user_id == user_id)
            .cloned())
    }

    async fn crew(&self, crew_id: Uuid) -> Result<Option<CrewProfile>, CoreError> {
        Ok(self.crews.read().await.get(&crew_id).cloned())
    }

    async fn crew_of_user(&self, user_id: Uuid) -> Result<Option<CrewProfile>, CoreError> {
        Ok(self
            .crews
            .read()
            .await
            .values()
            .find(|c| c.user_id == user_id)
            .cloned())
    }

    async fn crews_of_merchant(&self, merchant_id: Uuid) -> Result<Vec<CrewProfile>, CoreError> {
        Ok(self
            .crews
            .read()
            .await
            .values()
            .filter(|c| c.merchant_id == merchant_id)
            .cloned()
            .collect())
    }

    async fn apply_merchant(&self, user_id: Uuid, display_name: &str) -> Result<MerchantProfile, CoreError> {
        if self.merchant_of_user(user_id).await?.is_some() {
            return Err(CoreError::Validation("user already has a merchant profile".into()));
        }
        let profile = MerchantProfile {
            id: Uuid::new_v4(),
            user_id,
            display_name: display_name.to_string(),
            status: MerchantStatus::Pending,
            created_at: Utc::now(),
        };
        self.merchants.write().await.insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn set_merchant_status(&self, merchant_id: Uuid, status: MerchantStatus) -> Result<MerchantProfile, CoreError> {
        let mut merchants = self.merchants.write().await;
        let profile = merchants
            .get_mut(&merchant_id)
            .ok_or_else(|| CoreError::not_found("merchant"))?;
        profile.status = status;
        let profile = profile.clone();
        drop(merchants);
        if status == MerchantStatus::Active {
            self.roles.write().await.insert(profile.user_id, Role::Merchant);
        }
        Ok(profile)
    }

    async fn add_crew(&self, merchant_id: Uuid, user_id: Uuid, display_name: &str) -> Result<CrewProfile, CoreError> {
        let profile = CrewProfile {
            id: Uuid::new_v4(),
            user_id,
            merchant_id,
            display_name: display_name.to_string(),
            status: CrewStatus::Pending,
            rating: 0.0,
            created_at: Utc::now(),
        };
        self.crews.write().await.insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn set_crew_status(&self, crew_id: Uuid, status: CrewStatus) -> Result<CrewProfile, CoreError> {
        let mut crews = self.crews.write().await;
        let profile = crews.get_mut(&crew_id).ok_or_else(|| CoreError::not_found("crew"))?;
        profile.status = status;
        let profile = profile.clone();
        drop(crews);
        if status == CrewStatus::Active {
            self.roles.write().await.insert(profile.user_id, Role::Crew);
        }
        Ok(profile)
    }

    async fn update_crew_rating(&self, crew_id: Uuid, rating: f64) -> Result<(), CoreError> {
        let mut crews = self.crews.write().await;
        let profile = crews.get_mut(&crew_id).ok_or_else(|| CoreError::not_found("crew"))?;
        profile.rating = rating;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn merchant_approval_flips_role() {
        let directory = InMemoryAccountDirectory::new();
        let user_id = Uuid::new_v4();

        let profile = directory.apply_merchant(user_id, "Blue Bay Charters").await.unwrap();
        assert_eq!(profile.status, MerchantStatus::Pending);
        assert_eq!(directory.role_of(user_id).await.unwrap(), Role::User);

        directory
            .set_merchant_status(profile.id, MerchantStatus::Active)
            .await
            .unwrap();
        assert_eq!(directory.role_of(user_id).await.unwrap(), Role::Merchant);
    }

    #[tokio::test]
    async fn second_merchant_application_is_rejected() {
        let directory = InMemoryAccountDirectory::new();
        let user_id = Uuid::new_v4();
        directory.apply_merchant(user_id, "first").await.unwrap();
        assert!(directory.apply_merchant(user_id, "second").await.is_err());
    }

    #[tokio::test]
    async fn crew_lookup_by_user_and_merchant() {
        let directory = InMemoryAccountDirectory::new();
        let merchant_id = Uuid::new_v4();
        let crew_user = Uuid::new_v4();

        let crew = directory.add_crew(merchant_id, crew_user, "Skipper Lee").await.unwrap();
        directory.set_crew_status(crew.id, CrewStatus::Active).await.unwrap();

        let by_user = directory.crew_of_user(crew_user).await.unwrap().unwrap();
        assert_eq!(by_user.id, crew.id);
        assert_eq!(directory.crews_of_merchant(merchant_id).await.unwrap().len(), 1);
        assert_eq!(directory.role_of(crew_user).await.unwrap(), Role::Crew);
    }
}
