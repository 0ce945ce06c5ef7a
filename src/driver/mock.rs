//! Mock link driver implementation for testing
//!
//! This module provides an in-memory link driver that can be used to exercise
//! the M-Bus master without a gateway or serial adapter. It follows the flag
//! discipline of the real driver: opening fails on an open link, closing fails
//! while a command is in flight, and every command marks the link busy until it
//! completes.

use super::LinkDriver;
use crate::address::MBusAddress;
use crate::error::DriverError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A call received by the mock driver
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    OpenTcp {
        host: String,
        port: u16,
        timeout_secs: f64,
    },
    OpenSerial {
        port: String,
        baud_rate: u32,
    },
    Close,
    Get {
        address: MBusAddress,
        max_frames: u32,
    },
    Scan,
    SetPrimaryId {
        old_address: MBusAddress,
        new_address: u8,
    },
}

/// Mock link driver with scripted responses
#[derive(Clone)]
pub struct MockLinkDriver {
    connected: Arc<AtomicBool>,
    in_progress: Arc<AtomicBool>,
    open_succeeds: Arc<AtomicBool>,
    close_succeeds: Arc<AtomicBool>,
    /// Every call in arrival order
    pub calls: Arc<Mutex<Vec<DriverCall>>>,
    /// Responses handed out by `get`, oldest first
    pub get_responses: Arc<Mutex<VecDeque<Result<String, DriverError>>>>,
    /// Responses handed out by `scan`, oldest first
    pub scan_responses: Arc<Mutex<VecDeque<Result<String, DriverError>>>>,
    /// Responses handed out by `set_primary_id`, oldest first
    pub set_primary_responses: Arc<Mutex<VecDeque<Result<(), DriverError>>>>,
    /// Time each command keeps the link busy
    pub latency: Arc<Mutex<Duration>>,
}

impl Default for MockLinkDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the busy flag when a command finishes or its future is dropped.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl MockLinkDriver {
    /// A closed link whose transports open and close successfully.
    pub fn new() -> Self {
        MockLinkDriver {
            connected: Arc::new(AtomicBool::new(false)),
            in_progress: Arc::new(AtomicBool::new(false)),
            open_succeeds: Arc::new(AtomicBool::new(true)),
            close_succeeds: Arc::new(AtomicBool::new(true)),
            calls: Arc::new(Mutex::new(Vec::new())),
            get_responses: Arc::new(Mutex::new(VecDeque::new())),
            scan_responses: Arc::new(Mutex::new(VecDeque::new())),
            set_primary_responses: Arc::new(Mutex::new(VecDeque::new())),
            latency: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// A link that is already open and idle.
    pub fn connected() -> Self {
        let driver = Self::new();
        driver.set_connected(true);
        driver
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn set_busy(&self, busy: bool) {
        self.in_progress.store(busy, Ordering::SeqCst);
    }

    pub fn set_open_succeeds(&self, succeeds: bool) {
        self.open_succeeds.store(succeeds, Ordering::SeqCst);
    }

    pub fn set_close_succeeds(&self, succeeds: bool) {
        self.close_succeeds.store(succeeds, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        *lock(&self.latency) = latency;
    }

    /// Queue the result of the next `get`
    pub fn queue_get_response(&self, response: Result<String, DriverError>) {
        lock(&self.get_responses).push_back(response);
    }

    /// Queue the result of the next `scan`
    pub fn queue_scan_response(&self, response: Result<String, DriverError>) {
        lock(&self.scan_responses).push_back(response);
    }

    /// Queue the result of the next `set_primary_id`
    pub fn queue_set_primary_response(&self, response: Result<(), DriverError>) {
        lock(&self.set_primary_responses).push_back(response);
    }

    /// Snapshot of all calls received so far
    pub fn recorded_calls(&self) -> Vec<DriverCall> {
        lock(&self.calls).clone()
    }

    pub fn open_calls(&self) -> usize {
        self.count(|call| matches!(call, DriverCall::OpenTcp { .. } | DriverCall::OpenSerial { .. }))
    }

    pub fn close_calls(&self) -> usize {
        self.count(|call| matches!(call, DriverCall::Close))
    }

    pub fn get_calls(&self) -> usize {
        self.count(|call| matches!(call, DriverCall::Get { .. }))
    }

    pub fn scan_calls(&self) -> usize {
        self.count(|call| matches!(call, DriverCall::Scan))
    }

    pub fn set_primary_calls(&self) -> usize {
        self.count(|call| matches!(call, DriverCall::SetPrimaryId { .. }))
    }

    fn count(&self, predicate: impl Fn(&DriverCall) -> bool) -> usize {
        lock(&self.calls).iter().filter(|call| predicate(call)).count()
    }

    fn record(&self, call: DriverCall) {
        lock(&self.calls).push(call);
    }

    fn open(&self) -> bool {
        if self.connected.load(Ordering::SeqCst) || !self.open_succeeds.load(Ordering::SeqCst) {
            return false;
        }
        self.connected.store(true, Ordering::SeqCst);
        self.in_progress.store(false, Ordering::SeqCst);
        true
    }

    /// Runs one command: busy for `latency`, then the next scripted response.
    async fn command<T>(
        &self,
        responses: &Mutex<VecDeque<Result<T, DriverError>>>,
        unscripted: &str,
    ) -> Result<T, DriverError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(DriverError::new("Not connected to port"));
        }

        self.in_progress.store(true, Ordering::SeqCst);
        let _busy = BusyGuard(&self.in_progress);

        let latency = *lock(&self.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let next = lock(responses).pop_front();
        next.unwrap_or_else(|| Err(DriverError::new(unscripted)))
    }
}

#[async_trait]
impl LinkDriver for MockLinkDriver {
    async fn open_tcp(&self, host: &str, port: u16, timeout_secs: f64) -> bool {
        self.record(DriverCall::OpenTcp {
            host: host.to_string(),
            port,
            timeout_secs,
        });
        self.open()
    }

    async fn open_serial(&self, port: &str, baud_rate: u32) -> bool {
        self.record(DriverCall::OpenSerial {
            port: port.to_string(),
            baud_rate,
        });
        self.open()
    }

    async fn close(&self) -> bool {
        self.record(DriverCall::Close);
        if self.in_progress.load(Ordering::SeqCst)
            || !self.connected.load(Ordering::SeqCst)
            || !self.close_succeeds.load(Ordering::SeqCst)
        {
            return false;
        }
        self.connected.store(false, Ordering::SeqCst);
        true
    }

    async fn get(&self, address: &MBusAddress, max_frames: u32) -> Result<String, DriverError> {
        self.record(DriverCall::Get {
            address: address.clone(),
            max_frames,
        });
        self.command(&self.get_responses, "No reply from device").await
    }

    async fn scan(&self) -> Result<String, DriverError> {
        self.record(DriverCall::Scan);
        self.command(&self.scan_responses, "Failed to probe secondary address FFFFFFFFFFFFFFFF")
            .await
    }

    async fn set_primary_id(&self, old_address: &MBusAddress, new_address: u8) -> Result<(), DriverError> {
        self.record(DriverCall::SetPrimaryId {
            old_address: old_address.clone(),
            new_address,
        });
        self.command(&self.set_primary_responses, "No reply from device").await
    }

    fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn communication_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }
}
