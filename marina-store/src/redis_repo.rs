use redis::{AsyncCommands, RedisResult};

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// Fixed-window rate limiter: INCR + EXPIRE in one atomic pipeline,
    /// true while the caller is under the limit.
    pub async fn check_rate_limit(&self, key: &str, limit: i64, window_seconds: i64) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire(key, window_seconds)
            .query_async(&mut conn)
            .await?;

        Ok(count <= limit)
    }

    /// Cache a user's unread notification count; the inbox badge reads
    /// this before falling back to the database.
    pub async fn set_unread_count(&self, user_id: &str, count: i64) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("inbox:{}:unread", user_id);
        conn.set_ex(key, count, 300).await
    }

    pub async fn get_unread_count(&self, user_id: &str) -> RedisResult<Option<i64>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("inbox:{}:unread", user_id);
        conn.get(key).await
    }

    pub async fn clear_unread_count(&self, user_id: &str) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("inbox:{}:unread", user_id);
        conn.del(key).await
    }
}
