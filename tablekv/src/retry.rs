use crate::error::Error;
use crate::warn;
use core::future::Future;

/// Re-runs `op` while it fails with a conflict, sleeping `delay` between attempts.
/// Any other error, or the last conflict, is returned as is.
pub async fn retry_on_conflict<F, Fut, T>(attempts: usize, delay: std::time::Duration, mut op: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    assert!(attempts >= 1);
    let mut left = attempts;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_conflict() && left > 1 => {
                left -= 1;
                warn!("Retrying after conflict, {} attempts left: {}", left, e);
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn conflict() -> Error {
        Error::Update { message: "stale".into(), conflict: true }
    }

    #[tokio::test]
    async fn retries_conflicts_until_success() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let out = retry_on_conflict(5, Duration::ZERO, || async {
            let n = CALLS.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 { Err(conflict()) } else { Ok(n) }
        })
        .await;
        assert_eq!(out.unwrap(), 3);
        assert_eq!(CALLS.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let out: Result<(), Error> = retry_on_conflict(5, Duration::ZERO, || async {
            CALLS.fetch_add(1, Ordering::SeqCst);
            Err(Error::CreateItem("duplicate".into()))
        })
        .await;
        assert!(matches!(out, Err(Error::CreateItem(_))));
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn last_conflict_bubbles_out() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let out: Result<(), Error> = retry_on_conflict(3, Duration::from_millis(1), || async {
            CALLS.fetch_add(1, Ordering::SeqCst);
            Err(conflict())
        })
        .await;
        assert!(out.unwrap_err().is_conflict());
        assert_eq!(CALLS.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    #[should_panic]
    async fn zero_attempts_panics() {
        let _ = retry_on_conflict::<_, _, ()>(0, Duration::ZERO, || async { Ok(()) }).await;
    }
}
