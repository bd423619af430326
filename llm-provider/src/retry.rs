use std::time::Duration;

use common::error::TransientKind;
use tokio_retry::{strategy::ExponentialBackoff, Action, RetryIf};
use tracing::warn;

use crate::error::ProviderError;

/// Shared retry policy for transient upstream failures:
/// exponential backoff, base 2s, capped at 10s, at most 3 attempts.
/// `RateLimited{retry_after}` overrides the computed delay when the provider
/// names an explicit wait.
const BASE_DELAY: Duration = Duration::from_secs(2);
const MAX_DELAY: Duration = Duration::from_secs(10);
const MAX_ATTEMPTS: usize = 3;

pub async fn with_retry<A>(mut action: A) -> Result<A::Item, ProviderError>
where
    A: Action<Error = ProviderError>,
{
    let strategy = ExponentialBackoff::from_millis(BASE_DELAY.as_millis() as u64)
        .max_delay(MAX_DELAY)
        .take(MAX_ATTEMPTS - 1);

    let mut attempt = 0usize;
    RetryIf::spawn(
        strategy,
        move || {
            attempt += 1;
            action.run()
        },
        |err: &ProviderError| {
            let retryable = matches!(err, ProviderError::Transient(_));
            if retryable {
                warn!(%err, "retrying transient provider error");
            }
            retryable
        },
    )
    .await
}

/// Computes the delay to honour before the next attempt, preferring an
/// explicit `retry_after` from the provider over the exponential schedule.
pub fn delay_for(kind: &TransientKind, attempt: usize) -> Duration {
    match kind {
        TransientKind::RateLimited { retry_after: Some(secs) } => Duration::from_secs(*secs),
        _ => {
            let exp = BASE_DELAY.saturating_mul(1 << attempt.min(4));
            exp.min(MAX_DELAY)
        }
    }
}
