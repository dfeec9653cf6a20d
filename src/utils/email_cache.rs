use anyhow::Result;
use futures_util::TryStreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::time::Duration;

use crate::utils::email_filter::normalize;

/// Normalized email -> owning user id, for accounts known to exist.
/// A miss says nothing about availability; the database decides.
static EMAIL_OWNERS: Lazy<Cache<String, u64>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(100_000)
        .time_to_live(Duration::from_secs(24 * 60 * 60))
        .build()
});

pub async fn remember(email: &str, user_id: u64) {
    EMAIL_OWNERS.insert(normalize(email), user_id).await;
}

pub async fn owner_of(email: &str) -> Option<u64> {
    EMAIL_OWNERS.get(&normalize(email)).await
}

async fn remember_all(rows: Vec<(u64, String)>) {
    futures::future::join_all(rows.iter().map(|(id, email)| remember(email, *id))).await;
}

/// Preloads accounts created or active within the last `days` days, `chunk` rows at a time.
pub async fn warmup_email_cache(pool: &MySqlPool, days: u32, chunk: usize) -> Result<usize> {
    let mut chunks = sqlx::query_as::<_, (u64, String)>(
        r#"
        SELECT id, email
        FROM users
        WHERE created_at >= NOW() - INTERVAL ? DAY
           OR last_login_at >= NOW() - INTERVAL ? DAY
        "#,
    )
    .bind(days)
    .bind(days)
    .fetch(pool)
    .try_chunks(chunk.max(1));

    let mut loaded = 0usize;
    while let Some(rows) = chunks.try_next().await.map_err(|e| e.1)? {
        loaded += rows.len();
        remember_all(rows).await;
    }

    log::info!("Email cache warmed with {} accounts active in the last {} days", loaded, days);

    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn lookups_are_case_insensitive() {
        assert_eq!(owner_of("cache-unseen@company.com").await, None);
        remember("Cache-Seen@Company.com", 42).await;
        assert_eq!(owner_of("cache-seen@company.com").await, Some(42));
    }

    #[actix_web::test]
    async fn bulk_remember_keeps_each_owner() {
        remember_all(vec![(1, "cache-b1@company.com".into()), (2, "cache-b2@company.com".into())]).await;
        assert_eq!(owner_of("cache-b1@company.com").await, Some(1));
        assert_eq!(owner_of("cache-b2@company.com").await, Some(2));
    }
}
