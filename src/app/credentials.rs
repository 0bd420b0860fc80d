use crate::app::config::DEFAULT_ROLE_NAME;
use crate::app::error::ScanError;
use crate::app::sdk_errors::sdk_error;
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_credential_types::Credentials;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

/// Temporary credentials issued by STS for one account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: DateTime<Utc>,
    pub can_expire: bool,
}

impl ScanCredentials {
    /// Create AWS SDK Credentials from these credentials
    pub fn to_aws_credentials(&self) -> Credentials {
        let expiry = self.can_expire.then(|| SystemTime::from(self.expiration));
        Credentials::new(
            &self.access_key_id,
            &self.secret_access_key,
            Some(self.session_token.clone()),
            expiry,
            "awsscan",
        )
    }
}

/// `arn:aws:iam::<account>:role/<role>`
pub fn role_arn(account_id: &str, role_name: &str) -> String {
    format!("arn:aws:iam::{}:role/{}", account_id, role_name)
}

/// Deterministic STS session name for one scanned pair
pub fn session_name(account_id: &str, region: &str) -> String {
    format!("scan-{}-{}", account_id, region)
}

/// The STS AssumeRole call, behind a trait so resolution can run without AWS
#[async_trait]
pub trait RoleAssumer: Send + Sync {
    async fn assume(&self, role_arn: &str, session_name: &str) -> Result<ScanCredentials>;
}

#[async_trait]
impl RoleAssumer for aws_sdk_sts::Client {
    async fn assume(&self, role_arn: &str, session_name: &str) -> Result<ScanCredentials> {
        let response = self
            .assume_role()
            .role_arn(role_arn)
            .role_session_name(session_name)
            .send()
            .await
            .map_err(sdk_error)
            .with_context(|| format!("AssumeRole failed for {}", role_arn))?;

        let creds = response
            .credentials()
            .with_context(|| format!("AssumeRole for {} returned no credentials", role_arn))?;

        let expiration = creds.expiration();
        let expiration = DateTime::<Utc>::from_timestamp(expiration.secs(), expiration.subsec_nanos())
            .unwrap_or_else(Utc::now);

        Ok(ScanCredentials {
            access_key_id: creds.access_key_id().to_string(),
            secret_access_key: creds.secret_access_key().to_string(),
            session_token: creds.session_token().to_string(),
            expiration,
            can_expire: true,
        })
    }
}

/// Source of per-account credentials for the organization scanner
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn credentials_for(
        &self,
        account_id: &str,
        region: &str,
    ) -> std::result::Result<ScanCredentials, ScanError>;
}

/// Resolves delegated credentials by assuming the scan role in the target account
pub struct CredentialResolver {
    role_name: Option<String>,
    assumer: Arc<dyn RoleAssumer>,
}

impl CredentialResolver {
    pub fn new(role_name: Option<String>, assumer: Arc<dyn RoleAssumer>) -> Self {
        Self { role_name, assumer }
    }

    /// Role ARN used for `account_id`, falling back to the default role name
    pub fn role_arn_for(&self, account_id: &str) -> String {
        let role_name = self
            .role_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_ROLE_NAME);
        role_arn(account_id, role_name)
    }
}

#[async_trait]
impl CredentialSource for CredentialResolver {
    async fn credentials_for(
        &self,
        account_id: &str,
        region: &str,
    ) -> std::result::Result<ScanCredentials, ScanError> {
        let role_arn = self.role_arn_for(account_id);
        let session = session_name(account_id, region);
        debug!("Assuming {} as session {}", role_arn, session);

        self.assumer
            .assume(&role_arn, &session)
            .await
            .map_err(|e| ScanError::AssumeRole {
                role_arn,
                message: format!("{:#}", e),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingAssumer {
        calls: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl RoleAssumer for RecordingAssumer {
        async fn assume(&self, role_arn: &str, session_name: &str) -> Result<ScanCredentials> {
            self.calls
                .lock()
                .unwrap()
                .push((role_arn.to_string(), session_name.to_string()));
            if self.fail {
                anyhow::bail!("AccessDenied: not authorized to perform sts:AssumeRole");
            }
            Ok(ScanCredentials {
                access_key_id: "AKIA".into(),
                secret_access_key: "secret".into(),
                session_token: "token".into(),
                expiration: Utc::now() + chrono::Duration::hours(1),
                can_expire: true,
            })
        }
    }

    #[tokio::test]
    async fn test_default_role_name() {
        let assumer = Arc::new(RecordingAssumer::default());
        let resolver = CredentialResolver::new(None, assumer.clone());

        resolver
            .credentials_for("222222222222", "eu-west-1")
            .await
            .unwrap();

        let calls = assumer.calls.lock().unwrap();
        assert_eq!(
            calls[0],
            (
                "arn:aws:iam::222222222222:role/resource-discovery-role".to_string(),
                "scan-222222222222-eu-west-1".to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_configured_role_name() {
        let assumer = Arc::new(RecordingAssumer::default());
        let resolver = CredentialResolver::new(Some("auditor".into()), assumer);
        assert_eq!(
            resolver.role_arn_for("111111111111"),
            "arn:aws:iam::111111111111:role/auditor"
        );
    }

    #[tokio::test]
    async fn test_failure_maps_to_assume_role_error() {
        let assumer = Arc::new(RecordingAssumer {
            fail: true,
            ..Default::default()
        });
        let resolver = CredentialResolver::new(None, assumer);

        let err = resolver
            .credentials_for("222222222222", "eu-west-1")
            .await
            .unwrap_err();
        match err {
            ScanError::AssumeRole { role_arn, message } => {
                assert!(role_arn.ends_with(":role/resource-discovery-role"));
                assert!(message.contains("AccessDenied"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
