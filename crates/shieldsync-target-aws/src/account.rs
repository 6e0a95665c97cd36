//! AWS session construction
//!
//! Targets either live in the caller's own account (default credential
//! chain) or in another account reached by assuming a role there. Sessions
//! are short-lived; one reconciliation pass finishes well inside the
//! 15-minute window.

use std::time::Duration;

use aws_config::sts::AssumeRoleProvider;
use aws_config::{BehaviorVersion, Region, SdkConfig};

use shieldsync_core::config::AccountConfig;

/// Session name visible in CloudTrail for assumed-role calls
const SESSION_NAME: &str = "shieldsync";

/// Assumed-role session duration
const SESSION_DURATION: Duration = Duration::from_secs(900);

/// ARN of the role to assume in the owning account
pub(crate) fn role_arn(account: &AccountConfig) -> String {
    format!("arn:aws:iam::{}:role/{}", account.id, account.role_name)
}

/// Build an SDK configuration for the given region, assuming a role when
/// the target lives in another account
pub(crate) async fn sdk_config(region: &str, account: Option<&AccountConfig>) -> SdkConfig {
    let region = Region::new(region.to_string());

    match account {
        Some(account) => {
            let provider = AssumeRoleProvider::builder(role_arn(account))
                .region(region.clone())
                .session_name(SESSION_NAME)
                .session_length(SESSION_DURATION)
                .build()
                .await;

            aws_config::defaults(BehaviorVersion::latest())
                .credentials_provider(provider)
                .region(region)
                .load()
                .await
        }
        None => {
            aws_config::defaults(BehaviorVersion::latest())
                .region(region)
                .load()
                .await
        }
    }
}
