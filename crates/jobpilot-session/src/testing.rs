//! Scripted [`DeliveryApi`] double for the loop tests

use async_trait::async_trait;
use jobpilot_api::{DeliveryApi, DeliveryStatus, LoginStart};
use jobpilot_core::{LoginStatus, QuotaInfo, Result};
use std::collections::VecDeque;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::sync::Mutex;
use std::time::Duration;

/// Scripted fake of the delivery service.
///
/// Each endpoint pops the next scripted result and falls back to a benign
/// default once the script runs dry. Call counters let tests pin down
/// exactly how many requests a loop issued.
#[derive(Default)]
pub(crate) struct MockApi {
    login_starts: Mutex<VecDeque<Result<LoginStart>>>,
    qrcodes: Mutex<VecDeque<Result<Option<String>>>>,
    login_statuses: Mutex<VecDeque<Result<LoginStatus>>>,
    delivery_starts: Mutex<VecDeque<Result<()>>>,
    delivery_stops: Mutex<VecDeque<Result<()>>>,
    delivery_statuses: Mutex<VecDeque<Result<DeliveryStatus>>>,
    quotas: Mutex<VecDeque<Result<QuotaInfo>>>,
    stop_delay: Mutex<Option<Duration>>,

    pub login_start_calls: AtomicU32,
    pub qrcode_calls: AtomicU32,
    pub login_status_calls: AtomicU32,
    pub delivery_start_calls: AtomicU32,
    pub delivery_stop_calls: AtomicU32,
    pub delivery_status_calls: AtomicU32,
    pub quota_calls: AtomicU32,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_login_start(&self, result: Result<LoginStart>) {
        self.login_starts.lock().unwrap().push_back(result);
    }

    pub fn script_qrcode(&self, result: Result<Option<String>>) {
        self.qrcodes.lock().unwrap().push_back(result);
    }

    pub fn script_login_status(&self, result: Result<LoginStatus>) {
        self.login_statuses.lock().unwrap().push_back(result);
    }

    pub fn script_delivery_start(&self, result: Result<()>) {
        self.delivery_starts.lock().unwrap().push_back(result);
    }

    pub fn script_delivery_stop(&self, result: Result<()>) {
        self.delivery_stops.lock().unwrap().push_back(result);
    }

    pub fn script_delivery_status(&self, result: Result<DeliveryStatus>) {
        self.delivery_statuses.lock().unwrap().push_back(result);
    }

    pub fn script_quota(&self, result: Result<QuotaInfo>) {
        self.quotas.lock().unwrap().push_back(result);
    }

    /// Make every stop request hang for `delay` before answering.
    pub fn set_stop_delay(&self, delay: Duration) {
        *self.stop_delay.lock().unwrap() = Some(delay);
    }

    fn pop<T>(queue: &Mutex<VecDeque<Result<T>>>, default: T) -> Result<T> {
        queue.lock().unwrap().pop_front().unwrap_or(Ok(default))
    }
}

#[async_trait]
impl DeliveryApi for MockApi {
    async fn start_login(&self) -> Result<LoginStart> {
        self.login_start_calls.fetch_add(1, Ordering::SeqCst);
        Self::pop(&self.login_starts, LoginStart::Started)
    }

    async fn fetch_qrcode(&self) -> Result<Option<String>> {
        self.qrcode_calls.fetch_add(1, Ordering::SeqCst);
        Self::pop(&self.qrcodes, None)
    }

    async fn login_status(&self) -> Result<LoginStatus> {
        self.login_status_calls.fetch_add(1, Ordering::SeqCst);
        Self::pop(&self.login_statuses, LoginStatus::Waiting)
    }

    async fn start_delivery(&self) -> Result<()> {
        self.delivery_start_calls.fetch_add(1, Ordering::SeqCst);
        Self::pop(&self.delivery_starts, ())
    }

    async fn stop_delivery(&self) -> Result<()> {
        self.delivery_stop_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.stop_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Self::pop(&self.delivery_stops, ())
    }

    async fn delivery_status(&self) -> Result<DeliveryStatus> {
        self.delivery_status_calls.fetch_add(1, Ordering::SeqCst);
        Self::pop(&self.delivery_statuses, DeliveryStatus::default())
    }

    async fn quota(&self) -> Result<QuotaInfo> {
        self.quota_calls.fetch_add(1, Ordering::SeqCst);
        Self::pop(&self.quotas, QuotaInfo::unlimited())
    }
}
