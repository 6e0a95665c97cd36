//! Operator configuration from AWS Secrets Manager
//!
//! The whole synchronizer configuration (upstream credentials plus the
//! map-to-targets wiring) lives in one secret as a JSON document. It is
//! fetched with the default credential chain, parsed, and validated before
//! anything else runs; every malformed entry fails here, not mid-pass.

use aws_config::{BehaviorVersion, Region};

use shieldsync_core::config::SyncConfig;
use shieldsync_core::{Error, Result};

/// Fetch and validate the synchronizer configuration from a secret
pub async fn fetch_sync_config(secret_name: &str, region: &str) -> Result<SyncConfig> {
    let shared = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .load()
        .await;
    let client = aws_sdk_secretsmanager::Client::new(&shared);

    let value = client
        .get_secret_value()
        .secret_id(secret_name)
        .send()
        .await
        .map_err(|e| {
            Error::config(format!("failed to retrieve secret '{secret_name}': {e}"))
        })?;

    let Some(raw) = value.secret_string() else {
        return Err(Error::config(format!(
            "secret '{secret_name}' has no string payload"
        )));
    };

    parse_sync_config(raw)
}

/// Parse and validate a configuration document
pub(crate) fn parse_sync_config(raw: &str) -> Result<SyncConfig> {
    let config: SyncConfig = serde_json::from_str(raw)
        .map_err(|e| Error::config(format!("secret payload is not valid configuration: {e}")))?;
    config.validate()?;
    Ok(config)
}
