//! Error callback.
//!
//! A registered callback sees every error raised by a connection (including
//! failures to connect) right before the error is returned to the caller. It is
//! an observer: the `Err` is still returned.

use crate::error::ConnError;
use std::sync::Arc;

/// Shared error observer.
pub type ErrorCallback = Arc<dyn Fn(&ConnError) + Send + Sync>;

/// Wrap a closure as an [`ErrorCallback`].
///
/// ```ignore
/// let cb = pgconn::error_callback(|err| eprintln!("db error: {err}"));
/// pgconn::Registry::global().register_error_callback(cb);
/// ```
pub fn error_callback<F>(f: F) -> ErrorCallback
where
    F: Fn(&ConnError) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Log `result`'s error and hand it to `callback`, then pass the result through.
pub(crate) fn report<T>(
    callback: Option<&ErrorCallback>,
    result: Result<T, ConnError>,
) -> Result<T, ConnError> {
    if let Err(err) = &result {
        tracing::warn!(target: "pgconn", error = %err, "database operation failed");
        if let Some(cb) = callback {
            cb(err);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn report_invokes_callback_only_on_error() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let cb = error_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(report(Some(&cb), Ok::<_, ConnError>(1)).unwrap(), 1);
        assert_eq!(seen.load(Ordering::SeqCst), 0);

        let err = report::<()>(Some(&cb), Err(ConnError::validation("nope"))).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn report_without_callback_passes_error_through() {
        assert!(report::<()>(None, Err(ConnError::not_found("x"))).unwrap_err().is_not_found());
    }
}
