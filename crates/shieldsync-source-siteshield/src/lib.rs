// # SiteShield Map Source
//
// This crate implements the upstream side of the synchronizer against the
// Akamai SiteShield v1 API:
//
// - List maps: GET `/siteshield/v1/maps`
// - Get one map: GET `/siteshield/v1/maps/{id}`
// - Acknowledge: POST `/siteshield/v1/maps/{id}/acknowledge`
//
// All requests are authenticated with EdgeGrid signatures (see
// `edgegrid.rs`). The client is stateless and single-shot: no retry, no
// backoff, no caching. An unacknowledged map is re-proposed upstream,
// which is the system's retry path.
//
// ## Security
//
// EdgeGrid credentials never appear in logs or `Debug` output.

use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use shieldsync_core::cidr::CidrSet;
use shieldsync_core::config::SourceConfig;
use shieldsync_core::map::ProposedMap;
use shieldsync_core::registry::TargetRegistry;
use shieldsync_core::traits::{MapSource, MapSourceFactory};
use shieldsync_core::{Error, Result};

mod edgegrid;

pub use edgegrid::{EdgeGridCredentials, EdgeGridSigner};

/// Base path of the SiteShield v1 API
const MAPS_PATH: &str = "/siteshield/v1/maps";

/// HTTP timeout for API requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// SiteShield API client
///
/// Implements [`MapSource`] with one HTTP request per operation.
pub struct SiteShieldClient {
    base_url: Url,
    client: reqwest::Client,
    signer: EdgeGridSigner,
}

impl std::fmt::Debug for SiteShieldClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteShieldClient")
            .field("base_url", &self.base_url.as_str())
            .field("credentials", &"<REDACTED>")
            .finish()
    }
}

impl SiteShieldClient {
    /// Create a client for the given API host
    ///
    /// `host` is the account-specific EdgeGrid host, e.g.
    /// `https://akab-xxxx.luna.akamaiapis.net`.
    pub fn new(host: &str, credentials: EdgeGridCredentials) -> Result<Self> {
        let base_url = Url::parse(host)
            .map_err(|e| Error::config(format!("invalid SiteShield host '{host}': {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            client,
            signer: EdgeGridSigner::new(credentials),
        })
    }

    /// Fetch a single map
    ///
    /// The map object is the response root (not nested under a key, the API
    /// documentation notwithstanding).
    pub async fn get_map(&self, map_id: u64) -> Result<ProposedMap> {
        let path = format!("{MAPS_PATH}/{map_id}");
        let dto: MapDto = self.request("GET", &path).await.map_err(Error::source)?;
        dto.into_map()
    }

    /// Issue one signed request and parse the JSON response
    ///
    /// Errors are rendered to strings here; callers wrap them into the
    /// error kind appropriate for the operation (`Source` for reads,
    /// `Acknowledge` for the acknowledge call).
    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        path: &str,
    ) -> std::result::Result<T, String> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| format!("invalid endpoint {path}: {e}"))?;

        let authorization = self.signer.authorization(method, &url, b"");

        let builder = match method {
            "POST" => self.client.post(url),
            _ => self.client.get(url),
        };

        let response = builder
            .header(AUTHORIZATION, authorization)
            .send()
            .await
            .map_err(|e| format!("{method} {path}: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error response".to_string());
            return Err(describe_status(method, path, status, &body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| format!("{method} {path}: invalid response body: {e}"))
    }
}

fn describe_status(method: &str, path: &str, status: StatusCode, body: &str) -> String {
    let detail = match status.as_u16() {
        401 | 403 => "authentication failed: check EdgeGrid credentials and API client access",
        404 => "not found",
        429 => "rate limited",
        500..=599 => "upstream server error (transient)",
        _ => "unexpected status",
    };
    format!("{method} {path}: {detail}: HTTP {status}: {body}")
}

#[async_trait]
impl MapSource for SiteShieldClient {
    async fn list_maps(&self) -> Result<Vec<ProposedMap>> {
        let list: MapListDto = self
            .request("GET", MAPS_PATH)
            .await
            .map_err(Error::source)?;

        tracing::debug!(maps = list.site_shield_maps.len(), "listed SiteShield maps");

        list.site_shield_maps
            .into_iter()
            .map(MapDto::into_map)
            .collect()
    }

    async fn acknowledge(&self, map_id: u64) -> Result<ProposedMap> {
        let path = format!("{MAPS_PATH}/{map_id}/acknowledge");
        let dto: MapDto = self
            .request("POST", &path)
            .await
            .map_err(Error::acknowledge)?;

        tracing::info!(map_id, "acknowledged SiteShield map");
        dto.into_map()
    }

    fn source_name(&self) -> &'static str {
        "site_shield"
    }
}

/// Wire shape of the map listing
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MapListDto {
    #[serde(default)]
    site_shield_maps: Vec<MapDto>,
}

/// Wire shape of one SiteShield map
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MapDto {
    id: u64,
    #[serde(default)]
    acknowledged: bool,
    #[serde(default)]
    map_alias: String,
    #[serde(default)]
    current_cidrs: Vec<String>,
    #[serde(default)]
    proposed_cidrs: Vec<String>,
    #[serde(default)]
    rule_name: Option<String>,
    #[serde(default)]
    service: Option<String>,
    // Timestamps arrive as epoch milliseconds
    #[serde(default)]
    acknowledge_required_by: Option<i64>,
    #[serde(default)]
    acknowledged_on: Option<i64>,
    #[serde(default)]
    acknowledged_by: Option<String>,
}

impl MapDto {
    fn into_map(self) -> Result<ProposedMap> {
        let current_cidrs = CidrSet::parse(&self.current_cidrs)
            .map_err(|e| Error::source(format!("map {}: currentCidrs: {e}", self.id)))?;
        let proposed_cidrs = CidrSet::parse(&self.proposed_cidrs)
            .map_err(|e| Error::source(format!("map {}: proposedCidrs: {e}", self.id)))?;

        Ok(ProposedMap {
            id: self.id,
            alias: self.map_alias,
            acknowledged: self.acknowledged,
            current_cidrs,
            proposed_cidrs,
            rule_name: self.rule_name,
            service: self.service,
            acknowledge_required_by: self
                .acknowledge_required_by
                .and_then(DateTime::from_timestamp_millis),
            acknowledged_on: self.acknowledged_on.and_then(DateTime::from_timestamp_millis),
            acknowledged_by: self.acknowledged_by,
        })
    }
}

/// Factory for creating SiteShield clients from configuration
pub struct SiteShieldFactory;

impl MapSourceFactory for SiteShieldFactory {
    fn create(&self, config: &SourceConfig) -> Result<Box<dyn MapSource>> {
        match config {
            SourceConfig::SiteShield {
                host,
                client_token,
                client_secret,
                access_token,
            } => {
                config.validate()?;
                let client = SiteShieldClient::new(
                    host,
                    EdgeGridCredentials {
                        client_token: client_token.clone(),
                        client_secret: client_secret.clone(),
                        access_token: access_token.clone(),
                    },
                )?;
                Ok(Box::new(client))
            }
            _ => Err(Error::config("invalid config for SiteShield source")),
        }
    }
}

/// Register the SiteShield source with a registry
pub fn register(registry: &TargetRegistry) {
    registry.register_source("site_shield", std::sync::Arc::new(SiteShieldFactory));
}
