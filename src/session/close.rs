//! Graceful close: wait for the command in flight before closing the link.

use crate::constants::DEFAULT_CLOSE_POLL_INTERVAL;
use crate::driver::{LinkDriver, LinkState};
use crate::error::MBusError;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How a single close request treats a busy link.
#[derive(Debug, Clone)]
pub struct PendingClose {
    wait: bool,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl PendingClose {
    /// Fail with `CloseWhileBusy` if a command is in flight.
    pub fn fail_fast() -> Self {
        PendingClose {
            wait: false,
            poll_interval: DEFAULT_CLOSE_POLL_INTERVAL,
            cancel: CancellationToken::new(),
        }
    }

    /// Re-check every poll interval until the link is idle, without deadline.
    pub fn wait() -> Self {
        PendingClose {
            wait: true,
            ..Self::fail_fast()
        }
    }

    /// Request on behalf of a caller that may or may not await the outcome.
    ///
    /// Without an explicit choice the close waits exactly when someone is
    /// notified. Nobody to notify means nobody to wait for.
    pub fn for_caller(notify: bool, wait: Option<bool>) -> Self {
        if wait.unwrap_or(notify) && notify {
            Self::wait()
        } else {
            Self::fail_fast()
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Abort the waiting loop once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn is_waiting(&self) -> bool {
        self.wait
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Token that cancels this request
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Closes the link once no command is in flight.
pub struct GracefulCloser<D: LinkDriver + ?Sized> {
    driver: Arc<D>,
}

impl<D: LinkDriver + ?Sized> GracefulCloser<D> {
    pub fn new(driver: Arc<D>) -> Self {
        GracefulCloser { driver }
    }

    /// Close the link according to `request`.
    ///
    /// A closed link succeeds at once. A busy link either fails or is re-checked
    /// every poll interval until it becomes idle or the request is cancelled.
    pub async fn close(&self, request: &PendingClose) -> Result<(), MBusError> {
        let mut checks: u64 = 0;
        loop {
            match LinkState::observe(&*self.driver) {
                LinkState::Disconnected => return Ok(()),
                LinkState::Busy if !request.wait => {
                    debug!("Close rejected, communication still in progress");
                    return Err(MBusError::CloseWhileBusy);
                }
                LinkState::Busy => {
                    checks += 1;
                    debug!(
                        "Close deferred by {:?}, communication in progress (check {checks})",
                        request.poll_interval
                    );
                    tokio::select! {
                        _ = request.cancel.cancelled() => {
                            warn!("Close cancelled after {checks} busy checks");
                            return Err(MBusError::CloseCancelled);
                        }
                        _ = tokio::time::sleep(request.poll_interval) => {}
                    }
                }
                LinkState::Connected => {
                    return if self.driver.close().await {
                        info!("Link closed");
                        Ok(())
                    } else {
                        warn!("Close unsuccessful");
                        Err(MBusError::CloseUnsuccessful)
                    };
                }
            }
        }
    }
}
