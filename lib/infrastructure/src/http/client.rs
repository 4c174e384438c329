use std::time::Duration;

use reqwest_middleware::ClientWithMiddleware;
use reqwest_tracing::TracingMiddleware;

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    verify_tls: bool,
    timeout: Duration,
}

impl HttpClientConfig {
    pub fn new(verify_tls: bool) -> Self {
        Self {
            verify_tls,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn new_tracing_client(&self) -> anyhow::Result<ClientWithMiddleware> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent("dawarich-bridge");

        if !self.verify_tls {
            tracing::warn!("TLS certificate verification is disabled for outgoing HTTP requests");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build()?;

        Ok(reqwest_middleware::ClientBuilder::new(client)
            .with(TracingMiddleware::default())
            .build())
    }
}
