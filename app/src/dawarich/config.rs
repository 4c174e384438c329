use anyhow::{Context, bail};
use reqwest::Url;
use serde::Deserialize;

/// Connection and identity settings of one Dawarich instance. Immutable after setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DawarichConfig {
    pub host: String,
    pub port: Option<u16>,
    pub api_key: String,
    pub use_tls: bool,
    pub verify_tls: bool,
    pub display_name: String,
    pub tracked_device_id: Option<String>,
}

impl DawarichConfig {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(if self.use_tls { 443 } else { 80 })
    }

    pub fn base_url(&self) -> String {
        let scheme = if self.use_tls { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port())
    }
}

/// Raw `[dawarich]` section as found in the configuration file. Accepts both the structured
/// fields and the legacy single-URL layout.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DawarichSettings {
    host: Option<String>,
    port: Option<u16>,
    api_key: Option<String>,
    use_tls: Option<bool>,
    verify_tls: Option<bool>,
    display_name: Option<String>,
    tracked_device_id: Option<String>,

    //legacy layout
    url: Option<String>,
    friendly_name: Option<String>,
    mobile_app: Option<String>,
}

impl DawarichSettings {
    pub fn into_config(self) -> anyhow::Result<DawarichConfig> {
        let config = if self.host.is_some() {
            self.into_structured()?
        } else if let Some(url) = self.url.clone() {
            let config = self.migrate_legacy()?;
            tracing::info!(
                "Migrated legacy Dawarich url {} to host={} port={} use_tls={}",
                url,
                config.host,
                config.port(),
                config.use_tls
            );
            config
        } else {
            bail!("Dawarich host is not configured");
        };

        if config.host.trim().is_empty() {
            bail!("Dawarich host must not be empty");
        }
        if config.api_key.trim().is_empty() {
            bail!("Dawarich api_key must not be empty");
        }

        Ok(config)
    }

    fn into_structured(self) -> anyhow::Result<DawarichConfig> {
        Ok(DawarichConfig {
            host: self.host.context("Dawarich host is not configured")?,
            port: self.port,
            api_key: self.api_key.context("Dawarich api_key is not configured")?,
            use_tls: self.use_tls.unwrap_or(true),
            verify_tls: self.verify_tls.unwrap_or(true),
            display_name: self.display_name.unwrap_or_else(default_display_name),
            tracked_device_id: self.tracked_device_id.filter(|id| !id.is_empty()),
        })
    }

    fn migrate_legacy(self) -> anyhow::Result<DawarichConfig> {
        let raw_url = self.url.context("Legacy Dawarich url is not configured")?;
        let (host, port, use_tls) = parse_legacy_url(&raw_url)?;

        Ok(DawarichConfig {
            host,
            port: Some(port),
            api_key: self.api_key.context("Dawarich api_key is not configured")?,
            use_tls,
            verify_tls: false,
            display_name: self.friendly_name.unwrap_or_else(default_display_name),
            tracked_device_id: self.mobile_app.filter(|id| !id.is_empty()),
        })
    }
}

fn default_display_name() -> String {
    "Dawarich".to_owned()
}

//scheme://host[:port] -> (host, port, use_tls). A missing port is inferred from the scheme.
fn parse_legacy_url(raw_url: &str) -> anyhow::Result<(String, u16, bool)> {
    let with_scheme = if raw_url.contains("://") {
        raw_url.to_owned()
    } else {
        format!("http://{raw_url}")
    };

    let url = Url::parse(&with_scheme).with_context(|| format!("Invalid legacy Dawarich url {raw_url}"))?;

    let use_tls = match url.scheme() {
        "https" => true,
        "http" => false,
        other => bail!("Unsupported scheme {} in legacy Dawarich url {}", other, raw_url),
    };

    let host = url
        .host_str()
        .with_context(|| format!("Legacy Dawarich url {raw_url} has no host"))?
        .to_owned();

    if url.path() != "/" {
        tracing::warn!("Ignoring path {} of legacy Dawarich url {}", url.path(), raw_url);
    }

    let port = url.port().unwrap_or(if use_tls { 443 } else { 80 });

    Ok((host, port, use_tls))
}
