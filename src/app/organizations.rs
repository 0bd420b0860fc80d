//! Organization account discovery and the active-account filter.

use crate::app::audit_log::ScanLog;
use crate::app::pagination::{collect_pages, Page};
use crate::app::sdk_errors::categorize_error_string;
use async_trait::async_trait;
use aws_sdk_organizations::error::DisplayErrorContext;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

const LIST_ACCOUNTS_HINT: &str = "To scan an organization, the provided credentials must have the following permissions:\n  - organizations:ListAccounts\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountStatus {
    Active,
    Suspended,
    PendingClosure,
    /// Status not reported, e.g. for an account given on the command line
    Unknown,
    Other(String),
}

impl AccountStatus {
    pub fn from_api(status: &str) -> Self {
        match status {
            "ACTIVE" => AccountStatus::Active,
            "SUSPENDED" => AccountStatus::Suspended,
            "PENDING_CLOSURE" => AccountStatus::PendingClosure,
            other => AccountStatus::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub status: AccountStatus,
}

impl Account {
    /// Account known only by id
    pub fn from_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            email: None,
            status: AccountStatus::Unknown,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

#[derive(Debug, Clone, Error)]
pub enum OrgApiError {
    #[error("the account is not a member of an organization")]
    NotInOrganization,
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("{0}")]
    Other(String),
}

impl OrgApiError {
    /// Classify an error that carries no typed exception
    fn from_message(message: String) -> Self {
        if categorize_error_string(&message).is_permission_error() {
            OrgApiError::AccessDenied(message)
        } else {
            OrgApiError::Other(message)
        }
    }
}

#[async_trait]
pub trait OrganizationsApi: Send + Sync {
    async fn list_accounts_page(&self, next_token: Option<String>) -> Result<Page<Account>, OrgApiError>;
    async fn describe_account(&self, account_id: &str) -> Result<Account, OrgApiError>;
}

#[allow(deprecated)]
fn account_from_sdk(account: &aws_sdk_organizations::types::Account) -> Account {
    Account {
        id: account.id().unwrap_or_default().to_string(),
        name: account.name().map(String::from),
        email: account.email().map(String::from),
        status: account
            .status()
            .map(|s| AccountStatus::from_api(s.as_str()))
            .unwrap_or(AccountStatus::Unknown),
    }
}

#[async_trait]
impl OrganizationsApi for aws_sdk_organizations::Client {
    async fn list_accounts_page(&self, next_token: Option<String>) -> Result<Page<Account>, OrgApiError> {
        let response = self
            .list_accounts()
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(err) if err.is_aws_organizations_not_in_use_exception() => {
                    OrgApiError::NotInOrganization
                }
                Some(err) if err.is_access_denied_exception() => {
                    OrgApiError::AccessDenied(DisplayErrorContext(&e).to_string())
                }
                _ => OrgApiError::from_message(DisplayErrorContext(&e).to_string()),
            })?;

        Ok(Page::new(
            response.accounts().iter().map(account_from_sdk).collect(),
            response.next_token(),
        ))
    }

    async fn describe_account(&self, account_id: &str) -> Result<Account, OrgApiError> {
        let response = self
            .describe_account()
            .account_id(account_id)
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(err) if err.is_aws_organizations_not_in_use_exception() => {
                    OrgApiError::NotInOrganization
                }
                Some(err) if err.is_access_denied_exception() => {
                    OrgApiError::AccessDenied(DisplayErrorContext(&e).to_string())
                }
                _ => OrgApiError::from_message(DisplayErrorContext(&e).to_string()),
            })?;

        response
            .account()
            .map(account_from_sdk)
            .ok_or_else(|| OrgApiError::Other(format!("Account {} not found", account_id)))
    }
}

/// Lists every account of the caller's organization
pub struct AccountDiscoverer {
    api: Arc<dyn OrganizationsApi>,
    log: Arc<dyn ScanLog>,
}

impl AccountDiscoverer {
    pub fn new(api: Arc<dyn OrganizationsApi>, log: Arc<dyn ScanLog>) -> Self {
        Self { api, log }
    }

    /// All accounts of the organization, or an empty list when they cannot be listed.
    ///
    /// A caller outside any organization gets an empty list silently. Other failures are
    /// reported to the audit log together with the required permission and also produce an
    /// empty list.
    pub async fn list_accounts(&self) -> Vec<Account> {
        match collect_pages(|token| self.api.list_accounts_page(token)).await {
            Ok(accounts) => {
                info!("Discovered {} organization accounts", accounts.len());
                accounts
            }
            Err(OrgApiError::NotInOrganization) => {
                debug!("Caller is not a member of an organization");
                Vec::new()
            }
            Err(OrgApiError::AccessDenied(message)) => {
                warn!("ListAccounts denied: {}", message);
                self.suggest_permissions("Unable to list accounts in the organization.");
                Vec::new()
            }
            Err(OrgApiError::Other(message)) => {
                warn!("ListAccounts failed: {}", message);
                self.suggest_permissions(
                    "Unable to determine whether the given account belongs to an organization.",
                );
                Vec::new()
            }
        }
    }

    fn suggest_permissions(&self, message: &str) {
        let text = format!("{}\n{}", message, LIST_ACCOUNTS_HINT);
        if let Err(e) = self.log.log_message(&text) {
            warn!("Failed to write audit log message: {:#}", e);
        }
    }
}

/// Drops excluded and non-active accounts
pub struct AccountFilter {
    api: Arc<dyn OrganizationsApi>,
    log: Arc<dyn ScanLog>,
    exclude_accounts: Vec<String>,
}

impl AccountFilter {
    pub fn new(
        api: Arc<dyn OrganizationsApi>,
        log: Arc<dyn ScanLog>,
        exclude_accounts: Vec<String>,
    ) -> Self {
        Self {
            api,
            log,
            exclude_accounts,
        }
    }

    /// Accounts that are not excluded and currently ACTIVE, in input order.
    ///
    /// Each non-excluded account is described once; a describe failure counts as not active.
    pub async fn filter_active_accounts(&self, accounts: &[Account]) -> Vec<Account> {
        let mut active = Vec::new();

        for account in accounts {
            if self.is_excluded(&account.id) {
                self.note(&format!("Skipping excluded account: {}", account.id));
                continue;
            }

            if self.is_account_active(&account.id).await {
                active.push(account.clone());
            } else {
                self.note(&format!("Skipping suspended account: {}", account.id));
            }
        }

        active
    }

    fn is_excluded(&self, account_id: &str) -> bool {
        self.exclude_accounts.iter().any(|id| id == account_id)
    }

    async fn is_account_active(&self, account_id: &str) -> bool {
        match self.api.describe_account(account_id).await {
            Ok(account) => account.is_active(),
            Err(e) => {
                self.note(&format!("Failed to describe account {}: {}", account_id, e));
                false
            }
        }
    }

    fn note(&self, message: &str) {
        info!("{}", message);
        if let Err(e) = self.log.log_message(message) {
            warn!("Failed to write audit log message: {:#}", e);
        }
    }
}
