use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use marina_shared::events::NotificationEvent;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::CoreError;

/// A persisted inbox entry. Exactly one recipient per row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub related_id: Option<Uuid>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn from_event(event: &NotificationEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: event.user_id,
            kind: event.kind.as_str().to_string(),
            title: event.title.clone(),
            body: event.body.clone(),
            related_id: event.related_id,
            read: false,
            created_at: Utc.timestamp_opt(event.timestamp, 0).single().unwrap_or_else(Utc::now),
        }
    }
}

/// Fire-and-forget fan-out. Implementations persist the inbox row and push
/// to connected clients; any failure is logged and swallowed so the
/// triggering state transition never blocks on notification delivery.
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    async fn publish(&self, event: NotificationEvent);
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert(&self, notification: &Notification) -> Result<(), CoreError>;
    async fn list_for_user(
        &self,
        user_id: Uuid,
        only_unread: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, CoreError>;
    async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> Result<bool, CoreError>;
    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, CoreError>;
    async fn unread_count(&self, user_id: Uuid) -> Result<i64, CoreError>;
}

/// Publisher that drops everything; for wiring where fan-out is irrelevant.
pub struct NoopPublisher;

#[async_trait]
impl NotificationPublisher for NoopPublisher {
    async fn publish(&self, _event: NotificationEvent) {}
}

/// In-memory inbox for tests and local development.
#[derive(Default)]
pub struct InMemoryNotificationRepository {
    rows: tokio::sync::RwLock<Vec<Notification>>,
}

impl InMemoryNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn insert(&self, notification: &Notification) -> Result<(), CoreError> {
        self.rows.write().await.push(notification.clone());
        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        only_unread: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, CoreError> {
        let rows = self.rows.read().await;
        let mut matching: Vec<Notification> = rows
            .iter()
            .filter(|n| n.user_id == user_id)
            .filter(|n| !only_unread || !n.read)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> Result<bool, CoreError> {
        let mut rows = self.rows.write().await;
        match rows.iter_mut().find(|n| n.id == notification_id && n.user_id == user_id) {
            Some(row) => {
                row.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, CoreError> {
        let mut rows = self.rows.write().await;
        let mut updated = 0;
        for row in rows.iter_mut().filter(|n| n.user_id == user_id && !n.read) {
            row.read = true;
            updated += 1;
        }
        Ok(updated)
    }

    async fn unread_count(&self, user_id: Uuid) -> Result<i64, CoreError> {
        let rows = self.rows.read().await;
        Ok(rows.iter().filter(|n| n.user_id == user_id && !n.read).count() as i64)
    }
}

/// Publisher that records events in memory; engine tests assert on it.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<NotificationEvent>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl NotificationPublisher for RecordingPublisher {
    async fn publish(&self, event: NotificationEvent) {
        self.events.lock().await.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marina_shared::events::NotificationKind;

    fn event_for(user_id: Uuid) -> NotificationEvent {
        NotificationEvent::templated(user_id, NotificationKind::BookingConfirmed, None, Utc::now().timestamp())
    }

    #[tokio::test]
    async fn inbox_tracks_read_and_unread() {
        let repo = InMemoryNotificationRepository::new();
        let user = Uuid::new_v4();

        for _ in 0..3 {
            repo.insert(&Notification::from_event(&event_for(user))).await.unwrap();
        }
        repo.insert(&Notification::from_event(&event_for(Uuid::new_v4())))
            .await
            .unwrap();

        assert_eq!(repo.unread_count(user).await.unwrap(), 3);
        let inbox = repo.list_for_user(user, true, 50, 0).await.unwrap();
        assert_eq!(inbox.len(), 3);

        assert!(repo.mark_read(user, inbox[0].id).await.unwrap());
        assert_eq!(repo.unread_count(user).await.unwrap(), 2);
        assert_eq!(repo.list_for_user(user, true, 50, 0).await.unwrap().len(), 2);
        assert_eq!(repo.list_for_user(user, false, 50, 0).await.unwrap().len(), 3);

        assert_eq!(repo.mark_all_read(user).await.unwrap(), 2);
        assert_eq!(repo.unread_count(user).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn mark_read_is_scoped_to_the_recipient() {
        let repo = InMemoryNotificationRepository::new();
        let user = Uuid::new_v4();
        let notification = Notification::from_event(&event_for(user));
        repo.insert(&notification).await.unwrap();

        assert!(!repo.mark_read(Uuid::new_v4(), notification.id).await.unwrap());
        assert_eq!(repo.unread_count(user).await.unwrap(), 1);
    }
}
