//! Session bootstrap: the ambient SDK configuration plus the optional initial role.

use crate::app::config::ScanConfig;
use crate::app::credentials::{session_name, RoleAssumer, ScanCredentials};
use crate::app::error::ScanError;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_types::region::Region;
use aws_types::SdkConfig;

/// Session identity used when no target account was given
const MANAGEMENT_SESSION: &str = "management";

/// Region, SDK configuration and initial credentials in effect for a run
#[derive(Debug, Clone)]
pub struct EffectiveSession {
    pub region: String,
    pub sdk_config: SdkConfig,
    /// Set when a role ARN was configured and assumed at startup
    pub initial_credentials: Option<ScanCredentials>,
}

impl EffectiveSession {
    /// Configuration for management calls (regions, organizations, CloudTrail)
    pub fn management_config(&self) -> SdkConfig {
        regional_config(
            &self.sdk_config,
            &self.region,
            self.initial_credentials.as_ref(),
        )
    }
}

/// Derive a configuration pinned to `region`, optionally overriding its credentials.
/// Without credentials the ambient provider of `base` is kept.
pub fn regional_config(
    base: &SdkConfig,
    region: &str,
    credentials: Option<&ScanCredentials>,
) -> SdkConfig {
    let mut builder = base.to_builder().region(Region::new(region.to_string()));
    if let Some(creds) = credentials {
        builder = builder.credentials_provider(SharedCredentialsProvider::new(
            creds.to_aws_credentials(),
        ));
    }
    builder.build()
}

#[async_trait]
pub trait SessionInitializer: Send + Sync {
    async fn initialize(&self, config: &ScanConfig) -> Result<EffectiveSession, ScanError>;
}

/// Loads the default credential chain and assumes the configured role ARN, if any
#[derive(Debug, Default)]
pub struct SdkSessionInitializer;

#[async_trait]
impl SessionInitializer for SdkSessionInitializer {
    async fn initialize(&self, config: &ScanConfig) -> Result<EffectiveSession, ScanError> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = config.region.as_deref().filter(|r| !r.is_empty()) {
            loader = loader.region(Region::new(region.to_string()));
        }
        let sdk_config = loader.load().await;

        let region = sdk_config
            .region()
            .map(|r| r.as_ref().to_string())
            .filter(|r| !r.is_empty())
            .ok_or(ScanError::EmptyRegion)?;

        let initial_credentials = match config.role_arn.as_deref().filter(|arn| !arn.is_empty()) {
            Some(arn) if !arn.starts_with("arn:") => {
                return Err(ScanError::SessionInit(format!("invalid role ARN {}", arn)));
            }
            Some(arn) => {
                let sts = aws_sdk_sts::Client::new(&sdk_config);
                Some(assume_initial_role(&sts, arn, config, &region).await?)
            }
            None => None,
        };

        trace_info!(
            "Session initialized in {} ({})",
            region,
            if initial_credentials.is_some() {
                "assumed role"
            } else {
                "ambient credentials"
            }
        );

        Ok(EffectiveSession {
            region,
            sdk_config,
            initial_credentials,
        })
    }
}

/// Assume the startup role. Failure is fatal for the run.
pub async fn assume_initial_role(
    assumer: &dyn RoleAssumer,
    role_arn: &str,
    config: &ScanConfig,
    region: &str,
) -> Result<ScanCredentials, ScanError> {
    let account = config
        .account_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .unwrap_or(MANAGEMENT_SESSION);

    assumer
        .assume(role_arn, &session_name(account, region))
        .await
        .map_err(|e| ScanError::InitialRole {
            role_arn: role_arn.to_string(),
            message: format!("{:#}", e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;

    struct SessionNameAssumer(Mutex<Vec<String>>);

    #[async_trait]
    impl RoleAssumer for SessionNameAssumer {
        async fn assume(&self, _role_arn: &str, session_name: &str) -> anyhow::Result<ScanCredentials> {
            self.0.lock().unwrap().push(session_name.to_string());
            Ok(ScanCredentials {
                access_key_id: "AKIA".into(),
                secret_access_key: "secret".into(),
                session_token: "token".into(),
                expiration: Utc::now(),
                can_expire: true,
            })
        }
    }

    #[tokio::test]
    async fn test_initial_role_session_name() {
        let assumer = SessionNameAssumer(Mutex::new(Vec::new()));
        let mut config = ScanConfig::default();

        assume_initial_role(&assumer, "arn:aws:iam::1:role/x", &config, "us-east-1")
            .await
            .unwrap();
        config.account_id = Some("111111111111".into());
        assume_initial_role(&assumer, "arn:aws:iam::1:role/x", &config, "us-east-1")
            .await
            .unwrap();

        assert_eq!(
            *assumer.0.lock().unwrap(),
            vec![
                "scan-management-us-east-1".to_string(),
                "scan-111111111111-us-east-1".to_string()
            ]
        );
    }

    struct RefusingAssumer;

    #[async_trait]
    impl RoleAssumer for RefusingAssumer {
        async fn assume(&self, _role_arn: &str, _session_name: &str) -> anyhow::Result<ScanCredentials> {
            anyhow::bail!("AccessDenied: not authorized to perform sts:AssumeRole")
        }
    }

    #[tokio::test]
    async fn test_initial_role_failure_is_initial_role_error() {
        let err = assume_initial_role(
            &RefusingAssumer,
            "arn:aws:iam::1:role/x",
            &ScanConfig::default(),
            "us-east-1",
        )
        .await
        .unwrap_err();

        match err {
            ScanError::InitialRole { role_arn, message } => {
                assert_eq!(role_arn, "arn:aws:iam::1:role/x");
                assert!(message.contains("AccessDenied"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_regional_config_overrides_region() {
        let base = SdkConfig::builder()
            .region(Region::new("us-east-1"))
            .behavior_version(BehaviorVersion::latest())
            .build();
        let derived = regional_config(&base, "eu-west-1", None);
        assert_eq!(derived.region().map(|r| r.as_ref()), Some("eu-west-1"));
        assert!(derived.credentials_provider().is_none());
    }
}
