//! Entry point of a scan: session, regions and accounts, then the account/region loop.

use super::org_scanner::OrgScanner;
use super::resource_scanner::ResourceScanner;
use crate::app::audit_log::ScanLog;
use crate::app::config::{ScanConfig, ScanSettings};
use crate::app::counters::{CounterFactory, SdkCounterFactory};
use crate::app::credentials::{CredentialResolver, RoleAssumer};
use crate::app::error::ScanError;
use crate::app::organizations::{Account, AccountDiscoverer, AccountFilter, OrganizationsApi};
use crate::app::regions::{RegionLister, RegionResolver};
use crate::app::session::{EffectiveSession, SdkSessionInitializer, SessionInitializer};
use crate::app::totals::ScanSummary;
use std::sync::Arc;
use std::time::Duration;

/// Remote dependencies of one run
#[derive(Clone)]
pub struct ScanClients {
    pub regions: Arc<dyn RegionLister>,
    pub assumer: Arc<dyn RoleAssumer>,
    pub organizations: Arc<dyn OrganizationsApi>,
    pub counters: Arc<dyn CounterFactory>,
}

/// Builds the clients of a run once the session is known
pub trait ScanBackend: Send + Sync {
    fn connect(&self, session: &EffectiveSession) -> ScanClients;
}

/// SDK clients; management calls use the initial credentials when a role ARN was given
#[derive(Debug, Default)]
pub struct SdkBackend;

impl ScanBackend for SdkBackend {
    fn connect(&self, session: &EffectiveSession) -> ScanClients {
        let management = session.management_config();
        ScanClients {
            regions: Arc::new(aws_sdk_ec2::Client::new(&management)),
            assumer: Arc::new(aws_sdk_sts::Client::new(&management)),
            organizations: Arc::new(aws_sdk_organizations::Client::new(&management)),
            counters: Arc::new(SdkCounterFactory::new(session.sdk_config.clone())),
        }
    }
}

/// Outcome of a run
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub session: EffectiveSession,
    pub config: ScanConfig,
    pub accounts: Vec<Account>,
    pub regions: Vec<String>,
    pub summary: ScanSummary,
}

pub struct ScanService {
    session_init: Arc<dyn SessionInitializer>,
    backend: Arc<dyn ScanBackend>,
    log: Arc<dyn ScanLog>,
    counter_timeout: Duration,
    quiet: bool,
}

impl ScanService {
    pub fn new(
        session_init: Arc<dyn SessionInitializer>,
        backend: Arc<dyn ScanBackend>,
        log: Arc<dyn ScanLog>,
        counter_timeout: Duration,
    ) -> Self {
        Self {
            session_init,
            backend,
            log,
            counter_timeout,
            quiet: false,
        }
    }

    /// Service backed by the default credential chain and real SDK clients
    pub fn from_sdk(log: Arc<dyn ScanLog>, settings: &ScanSettings) -> Self {
        Self::new(
            Arc::new(SdkSessionInitializer),
            Arc::new(SdkBackend),
            log,
            settings.counter_timeout(),
        )
    }

    /// Suppress the progress line and the totals table on stdout
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    /// Single-account scan when the config names an account, organization scan otherwise
    pub async fn scan(&self, config: &ScanConfig) -> Result<ScanResult, ScanError> {
        if config.is_single_account() {
            self.scan_single_account(config).await
        } else {
            self.scan_organization(config).await
        }
    }

    /// Scan the configured account in every resolved region.
    ///
    /// The role is still assumed inside the target account for each region.
    pub async fn scan_single_account(&self, config: &ScanConfig) -> Result<ScanResult, ScanError> {
        let account_id = config
            .account_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or(ScanError::MissingAccountId)?;

        let (session, clients, regions) = self.prepare(config).await?;
        let accounts = vec![Account::from_id(account_id)];
        trace_info!(
            "Scanning account {} in {} regions",
            account_id,
            regions.len()
        );

        self.run(session, config, &clients, accounts, regions).await
    }

    /// Scan every active, non-excluded account of the caller's organization.
    ///
    /// Discovery failures are not fatal: they leave the account list empty and the run
    /// completes with zero totals.
    pub async fn scan_organization(&self, config: &ScanConfig) -> Result<ScanResult, ScanError> {
        let (session, clients, regions) = self.prepare(config).await?;

        let discovered = AccountDiscoverer::new(clients.organizations.clone(), self.log.clone())
            .list_accounts()
            .await;
        let accounts = AccountFilter::new(
            clients.organizations.clone(),
            self.log.clone(),
            config.exclude_accounts.clone(),
        )
        .filter_active_accounts(&discovered)
        .await;

        trace_info!(
            "Scanning {} of {} organization accounts in {} regions",
            accounts.len(),
            discovered.len(),
            regions.len()
        );

        self.run(session, config, &clients, accounts, regions).await
    }

    async fn prepare(
        &self,
        config: &ScanConfig,
    ) -> Result<(EffectiveSession, ScanClients, Vec<String>), ScanError> {
        let session = self.session_init.initialize(config).await?;
        let clients = self.backend.connect(&session);
        let regions = RegionResolver::new(clients.regions.clone())
            .get_regions(config.region.as_deref())
            .await?;
        Ok((session, clients, regions))
    }

    async fn run(
        &self,
        session: EffectiveSession,
        config: &ScanConfig,
        clients: &ScanClients,
        accounts: Vec<Account>,
        regions: Vec<String>,
    ) -> Result<ScanResult, ScanError> {
        let credentials = Arc::new(CredentialResolver::new(
            config.role_name.clone(),
            clients.assumer.clone(),
        ));
        let resource_scanner =
            ResourceScanner::new(clients.counters.clone(), self.log.clone(), self.counter_timeout);

        let mut scanner = OrgScanner::new(credentials, resource_scanner, self.log.clone());
        if self.quiet {
            scanner = scanner.quiet();
        }
        let summary = scanner.run(&accounts, &regions).await;

        Ok(ScanResult {
            session,
            config: config.clone(),
            accounts,
            regions,
            summary,
        })
    }
}
