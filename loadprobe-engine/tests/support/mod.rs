#![allow(dead_code)]

use async_trait::async_trait;
use loadprobe_client::{HttpRequest, HttpResponse, HttpTransport};
use loadprobe_common::{LoadProbeError, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// In-process transport: answers every request with a fixed status after a fixed delay,
/// or with a transport error when `error` is set.
pub struct FakeTransport {
    pub status: u16,
    pub delay: Duration,
    pub error: Option<LoadProbeError>,
    pub calls: AtomicU64,
    pub seen: Mutex<Vec<HttpRequest>>,
}

impl FakeTransport {
    pub fn new(status: u16, delay: Duration) -> Self {
        Self { status, delay, error: None, calls: AtomicU64::new(0), seen: Mutex::new(Vec::new()) }
    }

    pub fn failing(error: LoadProbeError) -> Self {
        Self { error: Some(error), ..Self::new(0, Duration::ZERO) }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn paths(&self) -> Vec<String> {
        self.seen.lock().unwrap().iter().map(|r| r.url.clone()).collect()
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.error {
            Some(e) => Err(e.clone()),
            None => Ok(HttpResponse { status: self.status, body: Vec::new(), elapsed: self.delay }),
        }
    }
}
