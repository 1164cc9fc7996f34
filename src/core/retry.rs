//! Bounded retry for record store writes.
//!
//! Only transient backend failures (lost or unavailable connections) are retried.
//! Validation and query errors are returned on the first attempt.

use crate::{config::settings::PersistenceSettings, errors::Result};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Delay before the attempt following `attempt`; saturates instead of overflowing.
fn retry_delay(policy: &PersistenceSettings, attempt: u32) -> Duration {
    Duration::from_millis(policy.retry_delay_ms.saturating_mul(u64::from(attempt)))
}

/// Runs `operation` until it succeeds, fails permanently, or the configured
/// number of attempts is used up. The delay grows linearly with each attempt.
pub async fn with_retry<T, F, Fut>(
    policy: &PersistenceSettings,
    label: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.retry_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < attempts => {
                let delay = retry_delay(policy, attempt);
                warn!(
                    "{} failed on attempt {}/{}: {}. Retrying in {:?}",
                    label, attempt, attempts, e, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use sea_orm::{DbErr, RuntimeErr};
    use std::cell::Cell;

    fn policy(retry_attempts: u32) -> PersistenceSettings {
        PersistenceSettings {
            retry_attempts,
            retry_delay_ms: 0,
            batch_size: 10,
        }
    }

    fn transient() -> Error {
        Error::Database(DbErr::Conn(RuntimeErr::Internal("reset".to_string())))
    }

    #[test]
    fn test_retry_delay_grows_linearly_and_saturates() {
        let mut settings = policy(3);
        settings.retry_delay_ms = 250;
        assert_eq!(retry_delay(&settings, 1), Duration::from_millis(250));
        assert_eq!(retry_delay(&settings, 2), Duration::from_millis(500));

        settings.retry_delay_ms = u64::MAX;
        assert_eq!(retry_delay(&settings, 2), Duration::from_millis(u64::MAX));
    }

    #[tokio::test]
    async fn test_retries_transient_errors() {
        let calls = Cell::new(0);
        let result = with_retry(&policy(3), "save", || {
            calls.set(calls.get() + 1);
            let outcome = if calls.get() < 3 { Err(transient()) } else { Ok(7) };
            async move { outcome }
        })
        .await;

        assert_eq!(result.ok(), Some(7));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_attempts() {
        let calls = Cell::new(0);
        let result: Result<()> = with_retry(&policy(2), "save", || {
            calls.set(calls.get() + 1);
            async { Err(transient()) }
        })
        .await;

        assert!(matches!(result, Err(Error::Database(DbErr::Conn(_)))));
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn test_permanent_errors_not_retried() {
        let calls = Cell::new(0);
        let result: Result<()> = with_retry(&policy(5), "save", || {
            calls.set(calls.get() + 1);
            async {
                Err(Error::InvalidProduct {
                    message: "bad".to_string(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(Error::InvalidProduct { .. })));
        assert_eq!(calls.get(), 1);
    }
}
