//! Remote fetcher for the weekly SOMA summary.
//!
//! One request per as-of date, with a one-day window (startDt = endDt).
//! Every failure is retried with exponential backoff; after the last
//! attempt the error goes back to the caller, which decides whether to
//! skip the week.
//!
//! RULE: only `HttpTransport` touches the network. Tests swap in their
//! own `Transport` and `Sleeper`.

use crate::{
    config::SomaConfig,
    error::{FetchError, FetchResult, SomaError, SomaResult},
    frame::Frame,
    types::{format_date, AsOfDate},
};
use reqwest::blocking::Client;
use std::time::Duration;

pub const PRODUCT_CODE: &str = "30";
pub const QUERY: &str = "summary";
pub const FORMAT: &str = "csv";

/// Longest wait between two attempts, however large `backoff^n` grows.
pub const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Status and body of one HTTP exchange.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body:   Vec<u8>,
}

/// The outbound GET, behind a seam.
pub trait Transport {
    fn get(&self, url: &str) -> FetchResult<HttpResponse>;
}

/// Blocking wait between attempts, behind a seam.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

// ── HTTP transport ─────────────────────────────────────────────────

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &SomaConfig) -> SomaResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| SomaError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> FetchResult<HttpResponse> {
        let transport_err = |e: reqwest::Error| FetchError::Transport {
            url:    url.to_string(),
            reason: e.to_string(),
        };
        let response = self.client.get(url).send().map_err(transport_err)?;
        let status = response.status().as_u16();
        let body = response.bytes().map_err(transport_err)?.to_vec();
        Ok(HttpResponse { status, body })
    }
}

// ── Fetcher ────────────────────────────────────────────────────────

pub struct RemoteFetcher {
    endpoint_base: String,
    retries:       u32,
    backoff:       f64,
    transport:     Box<dyn Transport>,
    sleeper:       Box<dyn Sleeper>,
}

impl RemoteFetcher {
    pub fn new(config: &SomaConfig, transport: Box<dyn Transport>, sleeper: Box<dyn Sleeper>) -> Self {
        Self {
            endpoint_base: config.endpoint_base.clone(),
            retries:       config.retries.max(1),
            backoff:       config.backoff,
            transport,
            sleeper,
        }
    }

    /// Fetcher wired to the real network and real sleeps.
    pub fn http(config: &SomaConfig) -> SomaResult<Self> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::new(config, Box::new(transport), Box::new(ThreadSleeper)))
    }

    /// Request URL for one as-of date.
    pub fn request_url(&self, as_of_date: AsOfDate) -> String {
        let day = format_date(as_of_date);
        format!(
            "{}?productCode={PRODUCT_CODE}&query={QUERY}&startDt={day}&endDt={day}&format={FORMAT}",
            self.endpoint_base
        )
    }

    /// Wait after failed attempt `attempt` (1-based): `backoff^attempt`
    /// seconds, capped at `MAX_BACKOFF`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        Duration::try_from_secs_f64(self.backoff.powi(exponent))
            .map(|d| d.min(MAX_BACKOFF))
            .unwrap_or(MAX_BACKOFF)
    }

    /// Fetch the summary table for `as_of_date`, retrying on any failure.
    pub fn fetch(&self, as_of_date: AsOfDate) -> FetchResult<Frame> {
        let url = self.request_url(as_of_date);
        let mut attempt = 1;
        loop {
            log::debug!("fetch attempt {attempt}/{} for {url}", self.retries);
            match self.attempt(&url) {
                Ok(frame) => return Ok(frame),
                Err(e) if attempt < self.retries => {
                    let delay = self.backoff_delay(attempt);
                    log::debug!("attempt {attempt} failed ({e}); retrying in {:.2}s", delay.as_secs_f64());
                    self.sleeper.sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn attempt(&self, url: &str) -> FetchResult<Frame> {
        let response = self.transport.get(url)?;
        if response.status >= 400 {
            return Err(FetchError::Status { url: url.to_string(), status: response.status });
        }
        if response.body.iter().all(u8::is_ascii_whitespace) {
            return Err(FetchError::EmptyBody { url: url.to_string() });
        }
        let frame = Frame::from_csv_bytes(&response.body).map_err(|e| FetchError::Parse {
            url:    url.to_string(),
            reason: e.to_string(),
        })?;
        if frame.is_empty() {
            return Err(FetchError::EmptyTable { url: url.to_string() });
        }
        Ok(frame)
    }
}
