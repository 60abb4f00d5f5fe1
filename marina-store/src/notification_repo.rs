use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marina_core::{CoreError, Notification, NotificationPublisher, NotificationRepository};
use marina_shared::events::NotificationEvent;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Live fan-out channel feeding connected clients. Lagging subscribers
/// drop events; the persisted inbox is the durable copy.
#[derive(Clone)]
pub struct NotificationHub {
    tx: broadcast::Sender<NotificationEvent>,
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.tx.subscribe()
    }

    pub fn send(&self, event: NotificationEvent) {
        // A send only fails when nobody is connected.
        let _ = self.tx.send(event);
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(256)
    }
}

/// The store-backed publisher: persists the inbox row, then pushes to the
/// hub. Both halves are fire-and-forget; a failure is logged and never
/// reaches the caller.
pub struct InboxPublisher {
    repo: Arc<dyn NotificationRepository>,
    hub: NotificationHub,
}

impl InboxPublisher {
    pub fn new(repo: Arc<dyn NotificationRepository>, hub: NotificationHub) -> Self {
        Self { repo, hub }
    }
}

#[async_trait]
impl NotificationPublisher for InboxPublisher {
    async fn publish(&self, event: NotificationEvent) {
        let notification = Notification::from_event(&event);
        if let Err(err) = self.repo.insert(&notification).await {
            tracing::warn!(user_id = %event.user_id, %err, "failed to persist notification");
        }
        self.hub.send(event);
    }
}

pub struct PgNotificationRepository {
    pool: PgPool,
}

impl PgNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    user_id: Uuid,
    kind: String,
    title: String,
    body: String,
    related_id: Option<Uuid>,
    read: bool,
    created_at: DateTime<Utc>,
}

impl NotificationRow {
    fn into_notification(self) -> Notification {
        Notification {
            id: self.id,
            user_id: self.user_id,
            kind: self.kind,
            title: self.title,
            body: self.body,
            related_id: self.related_id,
            read: self.read,
            created_at: self.created_at,
        }
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn insert(&self, notification: &Notification) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO notifications (id, user_id, kind, title, body, related_id, read, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(notification.id)
        .bind(notification.user_id)
        .bind(&notification.kind)
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(notification.related_id)
        .bind(notification.read)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        only_unread: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, CoreError> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            "SELECT id, user_id, kind, title, body, related_id, read, created_at \
             FROM notifications \
             WHERE user_id = $1 AND (NOT $2 OR NOT read) \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4",
        )
        .bind(user_id)
        .bind(only_unread)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        Ok(rows.into_iter().map(NotificationRow::into_notification).collect())
    }

    async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> Result<bool, CoreError> {
        let result = sqlx::query("UPDATE notifications SET read = TRUE WHERE id = $1 AND user_id = $2")
            .bind(notification_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(CoreError::storage)?;
        Ok(result.rows_affected() == 1)
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, CoreError> {
        let result = sqlx::query("UPDATE notifications SET read = TRUE WHERE user_id = $1 AND NOT read")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(CoreError::storage)?;
        Ok(result.rows_affected())
    }

    async fn unread_count(&self, user_id: Uuid) -> Result<i64, CoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT read")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(CoreError::storage)?;
        Ok(count)
    }
}
