use anyhow::Result;
use autoscale_cuckoo_filter::CuckooFilter;
use futures_util::TryStreamExt;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::sync::RwLock;

/// Sized for the expected head count; the filter grows past it if needed.
const EXPECTED_ACCOUNTS: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

/// Every normalized email with an account. Absence is definitive, presence is a hint.
static REGISTERED: Lazy<RwLock<CuckooFilter<String>>> =
    Lazy::new(|| RwLock::new(CuckooFilter::new(EXPECTED_ACCOUNTS, FALSE_POSITIVE_RATE)));

/// Canonical form used for storage, lookups and comparisons.
#[inline]
pub fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

/// `false` means the email is certainly unregistered.
/// A poisoned lock answers `true`, which sends the caller to the database.
pub fn might_exist(email: &str) -> bool {
    REGISTERED
        .read()
        .map(|filter| filter.contains(&normalize(email)))
        .unwrap_or(true)
}

pub fn insert(email: &str) {
    mark_registered([email]);
}

/// Adds emails under one write lock and returns how many were added.
fn mark_registered<'a>(emails: impl IntoIterator<Item = &'a str>) -> usize {
    let Ok(mut filter) = REGISTERED.write() else {
        log::warn!("Email filter lock poisoned; skipping update");
        return 0;
    };
    emails
        .into_iter()
        .map(|email| filter.add(&normalize(email)))
        .count()
}

/// Loads every account email, `chunk` rows per lock acquisition.
pub async fn warmup_email_filter(pool: &MySqlPool, chunk: usize) -> Result<usize> {
    let mut chunks = sqlx::query_scalar::<_, String>("SELECT email FROM users")
        .fetch(pool)
        .try_chunks(chunk.max(1));

    let mut added = 0usize;
    while let Some(emails) = chunks.try_next().await.map_err(|e| e.1)? {
        added += mark_registered(emails.iter().map(String::as_str));
    }

    log::info!("Email filter holds {} registered accounts", added);
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize("  Jane.Roe@Company.COM "), "jane.roe@company.com");
    }

    #[test]
    fn inserted_emails_are_found_case_insensitively() {
        insert("Filter.Test@Company.com");
        assert!(might_exist("filter.test@company.com"));
        assert!(might_exist("  FILTER.TEST@COMPANY.COM "));
    }

    #[test]
    fn bulk_marking_counts_and_finds_each_email() {
        let added = mark_registered(["bulk-a@company.com", "Bulk-B@company.com"]);
        assert_eq!(added, 2);
        assert!(might_exist("bulk-a@company.com"));
        assert!(might_exist("bulk-b@company.com"));
    }
}
