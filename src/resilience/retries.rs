//! Retryability policy for upstream call failures.

use crate::upstream::caller::CallError;

/// Whether a failed attempt may be retried (subject to the endpoint's
/// retry count). Timeouts and connection failures are always retryable;
/// backend responses only when the backend itself looks at fault (5xx).
pub fn is_retryable(error: &CallError) -> bool {
    match error {
        CallError::Timeout | CallError::ConnectionFailed(_) => true,
        CallError::BackendError { status, .. } => *status >= 500,
    }
}
