//! Sink lifetimes and their expiry watchers
//!
//! A registration is bounded by one of three lifetime kinds. Timer and
//! bound lifetimes get a watcher task that races expiry against
//! cancellation and posts a tokened [`Expiry`] back to the channel actor;
//! the actor matches tokens by identity and drops stale ones.

use super::error::{Result, RouterError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Durations must fit in an unsigned 32-bit millisecond count.
const MAX_LIFETIME_MS: u128 = u32::MAX as u128;

/// Bound on a sink registration.
#[derive(Debug, Clone, Default)]
pub enum Lifetime {
    /// Never expires; cancellation is a no-op.
    #[default]
    Infinity,
    /// Expires after the given duration.
    Duration(Duration),
    /// Tied to an external task: expires when the task trips this token
    /// on termination.
    Bound(CancellationToken),
}

impl Lifetime {
    pub(crate) fn validate(&self) -> Result<()> {
        if let Lifetime::Duration(d) = self {
            if d.as_millis() > MAX_LIFETIME_MS {
                return Err(RouterError::invalid(
                    "lifetime",
                    format!("duration {:?} exceeds the 32-bit millisecond range", d),
                ));
            }
        }
        Ok(())
    }
}

/// Expiry event delivered to the channel actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Expiry {
    pub sink_id: String,
    pub token: u64,
}

/// Cancellable handle to a lifetime watcher.
#[derive(Debug)]
pub(crate) struct LifetimeHandle {
    cancel: Option<CancellationToken>,
}

impl LifetimeHandle {
    pub fn cancel(&self) {
        if let Some(token) = &self.cancel {
            token.cancel();
        }
    }
}

/// Spawn the watcher for a registration.
///
/// The returned handle must be cancelled on uninstall, supersede, or
/// channel teardown; a cancelled watcher exits without posting.
pub(crate) fn watch(
    lifetime: &Lifetime,
    sink_id: &str,
    token: u64,
    expiries: mpsc::Sender<Expiry>,
) -> LifetimeHandle {
    let cancel = match lifetime {
        Lifetime::Infinity => return LifetimeHandle { cancel: None },
        Lifetime::Duration(d) => {
            let cancel = CancellationToken::new();
            let watcher = cancel.clone();
            let expiry = Expiry {
                sink_id: sink_id.to_string(),
                token,
            };
            let delay = *d;
            tokio::spawn(async move {
                tokio::select! {
                    _ = watcher.cancelled() => {}
                    _ = tokio::time::sleep(delay) => {
                        let _ = expiries.send(expiry).await;
                    }
                }
            });
            cancel
        }
        Lifetime::Bound(external) => {
            let cancel = CancellationToken::new();
            let watcher = cancel.clone();
            let monitored = external.clone();
            let expiry = Expiry {
                sink_id: sink_id.to_string(),
                token,
            };
            tokio::spawn(async move {
                tokio::select! {
                    _ = watcher.cancelled() => {}
                    _ = monitored.cancelled() => {
                        let _ = expiries.send(expiry).await;
                    }
                }
            });
            cancel
        }
    };

    LifetimeHandle {
        cancel: Some(cancel),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[test]
    fn test_duration_validation() {
        assert!(Lifetime::Duration(Duration::from_millis(50))
            .validate()
            .is_ok());
        assert!(Lifetime::Duration(Duration::from_secs(u64::MAX / 1000))
            .validate()
            .is_err());
        assert!(Lifetime::Infinity.validate().is_ok());
    }

    #[tokio::test]
    async fn test_duration_lifetime_fires() {
        let (tx, mut rx) = mpsc::channel(4);
        let _handle = watch(
            &Lifetime::Duration(Duration::from_millis(10)),
            "s1",
            7,
            tx,
        );

        let expiry = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("expiry should arrive")
            .expect("channel open");
        assert_eq!(
            expiry,
            Expiry {
                sink_id: "s1".into(),
                token: 7
            }
        );
    }

    #[tokio::test]
    async fn test_cancelled_watcher_stays_silent() {
        let (tx, mut rx) = mpsc::channel(4);
        let handle = watch(
            &Lifetime::Duration(Duration::from_millis(10)),
            "s1",
            1,
            tx,
        );
        handle.cancel();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_bound_lifetime_follows_external_task() {
        let external = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(4);
        let _handle = watch(&Lifetime::Bound(external.clone()), "s1", 3, tx);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());

        external.cancel();
        let expiry = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("expiry should arrive")
            .expect("channel open");
        assert_eq!(expiry.token, 3);
    }

    #[test]
    fn test_infinity_cancel_is_noop() {
        let handle = LifetimeHandle { cancel: None };
        handle.cancel();
    }
}
