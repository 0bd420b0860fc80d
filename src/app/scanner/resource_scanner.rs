//! Counting of one account/region pair.

use crate::app::audit_log::ScanLog;
use crate::app::counters::{CounterDescriptor, CounterFactory, CounterResult};
use crate::app::credentials::ScanCredentials;
use crate::app::totals::ResourceTotals;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

pub struct ResourceScanner {
    factory: Arc<dyn CounterFactory>,
    log: Arc<dyn ScanLog>,
    counter_timeout: Duration,
}

impl ResourceScanner {
    pub fn new(
        factory: Arc<dyn CounterFactory>,
        log: Arc<dyn ScanLog>,
        counter_timeout: Duration,
    ) -> Self {
        Self {
            factory,
            log,
            counter_timeout,
        }
    }

    /// Run every counter of `region` in parallel and return the count per resource type.
    ///
    /// Each counter runs as its own task bounded by the counter timeout; a counter that does not
    /// finish in time reports a zero count with a timeout error. Once all results are in, the
    /// shared totals are updated under the lock and one audit record is written per type.
    pub async fn scan_resources(
        &self,
        account_id: &str,
        region: &str,
        credentials: Option<&ScanCredentials>,
        totals: &Mutex<ResourceTotals>,
    ) -> BTreeMap<String, u64> {
        let counters = self.factory.counters_for(region, credentials);
        let expected = counters.len();
        let mut counts = BTreeMap::new();
        if expected == 0 {
            return counts;
        }

        scan_debug!(account_id, region, "Starting {} counters", expected);

        let descriptors: Vec<&'static CounterDescriptor> =
            counters.iter().map(|c| c.descriptor()).collect();
        let (tx, mut rx) = mpsc::channel::<CounterResult>(expected);
        for mut counter in counters {
            let tx = tx.clone();
            let timeout = self.counter_timeout;
            tokio::spawn(async move {
                let descriptor = counter.descriptor();
                let result = match tokio::time::timeout(timeout, counter.execute()).await {
                    Ok(()) => counter.result(),
                    Err(_) => CounterResult::timed_out(descriptor, timeout),
                };
                if tx.send(result).await.is_err() {
                    tracing::debug!("Result of {} dropped", descriptor.resource_type);
                }
            });
        }
        drop(tx);

        let mut results = Vec::with_capacity(expected);
        while results.len() < expected {
            match rx.recv().await {
                Some(result) => results.push(result),
                None => break,
            }
        }

        // A task that panicked never sent its result
        for descriptor in descriptors {
            if !results
                .iter()
                .any(|r| r.resource_type == descriptor.resource_type)
            {
                scan_error!(
                    account_id,
                    region,
                    "Counter for {} stopped without reporting",
                    descriptor.resource_type
                );
                results.push(CounterResult::failure(descriptor, "counter panicked"));
            }
        }

        {
            let mut totals = totals.lock().await;
            for result in &results {
                if !totals.record(&result.resource_type, result.count) {
                    scan_debug!(
                        account_id,
                        region,
                        "{} has no totals category",
                        result.resource_type
                    );
                }
            }
        }

        for result in results {
            if let Some(error) = &result.error {
                scan_warn!(
                    account_id,
                    region,
                    "Error counting {}: {}",
                    result.resource_type,
                    error
                );
                let message = format!(
                    "Error counting {} in account {} region {}: {}{}",
                    result.resource_type,
                    account_id,
                    region,
                    error,
                    result.permission_suggestion.as_deref().unwrap_or_default()
                );
                self.write(&[message]);
            }
            counts.insert(result.resource_type, result.count);
        }

        for (resource_type, count) in &counts {
            self.write(&[
                account_id.to_string(),
                region.to_string(),
                resource_type.clone(),
                count.to_string(),
            ]);
        }

        scan_info!(account_id, region, "Counted {} resource types", counts.len());
        counts
    }

    fn write(&self, record: &[String]) {
        if let Err(e) = self.log.log_record(record) {
            tracing::warn!("Failed to write audit log record: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::audit_log::MemoryScanLog;
    use crate::app::counters::{
        descriptors_for_region, CountSource, Counter, CounterDescriptor, ResourceCounter,
    };
    use crate::app::totals::ResourceCategory;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Counts from a fixed table; `None` hangs forever
    struct TableSource(HashMap<&'static str, Option<Result<u64, &'static str>>>);

    #[async_trait]
    impl CountSource for TableSource {
        async fn count(&self, descriptor: &CounterDescriptor) -> anyhow::Result<u64> {
            match self.0.get(descriptor.resource_type) {
                Some(Some(Ok(n))) => Ok(*n),
                Some(Some(Err(e))) => Err(anyhow::anyhow!("{}", e)),
                Some(None) => {
                    std::future::pending::<()>().await;
                    Ok(0)
                }
                None => Ok(0),
            }
        }
    }

    /// Panics for one resource type, counts 1 for the others
    struct PanickingSource(&'static str);

    #[async_trait]
    impl CountSource for PanickingSource {
        async fn count(&self, descriptor: &CounterDescriptor) -> anyhow::Result<u64> {
            if descriptor.resource_type == self.0 {
                panic!("describe call returned an unexpected shape");
            }
            Ok(1)
        }
    }

    struct TableFactory(Arc<dyn CountSource>);

    impl CounterFactory for TableFactory {
        fn counters_for(
            &self,
            region: &str,
            _credentials: Option<&ScanCredentials>,
        ) -> Vec<Box<dyn ResourceCounter>> {
            descriptors_for_region(region)
                .into_iter()
                .map(|d| Box::new(Counter::new(d, self.0.clone())) as Box<dyn ResourceCounter>)
                .collect()
        }
    }

    fn scanner(
        table: HashMap<&'static str, Option<Result<u64, &'static str>>>,
        log: Arc<MemoryScanLog>,
        timeout: Duration,
    ) -> ResourceScanner {
        ResourceScanner::new(
            Arc::new(TableFactory(Arc::new(TableSource(table)))),
            log,
            timeout,
        )
    }

    #[tokio::test]
    async fn test_records_every_type_and_updates_totals() {
        let log = Arc::new(MemoryScanLog::new());
        let scanner = scanner(
            HashMap::from([
                ("AWS::EC2::Instance", Some(Ok(3))),
                ("AWS::S3::Bucket", Some(Ok(2))),
            ]),
            log.clone(),
            Duration::from_secs(5),
        );
        let totals = Mutex::new(ResourceTotals::default());

        let counts = scanner
            .scan_resources("111111111111", "us-east-1", None, &totals)
            .await;

        assert_eq!(counts.len(), 11);
        assert_eq!(counts["AWS::EC2::Instance"], 3);
        assert_eq!(counts["AWS::S3::Bucket"], 2);

        let totals = totals.lock().await;
        assert_eq!(totals.get(ResourceCategory::VirtualMachines), 3);
        assert_eq!(totals.get(ResourceCategory::Buckets), 2);
        assert_eq!(totals.total(), 5);

        let records = log.records();
        assert_eq!(records.len(), 11);
        assert!(records.contains(&vec![
            "111111111111".to_string(),
            "us-east-1".to_string(),
            "AWS::EC2::Instance".to_string(),
            "3".to_string()
        ]));
        assert!(records.iter().any(|r| r[2] == "AWS::Lambda::Function" && r[3] == "0"));
    }

    #[tokio::test]
    async fn test_counter_error_is_isolated() {
        let log = Arc::new(MemoryScanLog::new());
        let scanner = scanner(
            HashMap::from([
                ("AWS::RDS::DBInstance", Some(Err("AccessDeniedException: no"))),
                ("AWS::Lambda::Function", Some(Ok(4))),
            ]),
            log.clone(),
            Duration::from_secs(5),
        );
        let totals = Mutex::new(ResourceTotals::default());

        let counts = scanner
            .scan_resources("222222222222", "eu-west-1", None, &totals)
            .await;

        assert_eq!(counts.len(), 9);
        assert_eq!(counts["AWS::RDS::DBInstance"], 0);
        assert_eq!(counts["AWS::Lambda::Function"], 4);

        let messages = log.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with(
            "Error counting AWS::RDS::DBInstance in account 222222222222 region eu-west-1"
        ));
        assert!(messages[0].contains("- rds:DescribeDBInstances"));
    }

    #[tokio::test]
    async fn test_hung_counter_times_out() {
        let log = Arc::new(MemoryScanLog::new());
        let scanner = scanner(
            HashMap::from([
                ("AWS::EKS::Cluster", None),
                ("AWS::EC2::Volume", Some(Ok(6))),
            ]),
            log.clone(),
            Duration::from_millis(50),
        );
        let totals = Mutex::new(ResourceTotals::default());

        let counts = scanner
            .scan_resources("333333333333", "eu-west-1", None, &totals)
            .await;

        assert_eq!(counts["AWS::EKS::Cluster"], 0);
        assert_eq!(counts["AWS::EC2::Volume"], 6);
        assert!(log
            .messages()
            .iter()
            .any(|m| m.contains("counter timed out after 50ms")));
        assert_eq!(totals.lock().await.get(ResourceCategory::NonOsDisks), 6);
    }

    #[tokio::test]
    async fn test_panicking_counter_still_gets_a_record() {
        let log = Arc::new(MemoryScanLog::new());
        let scanner = ResourceScanner::new(
            Arc::new(TableFactory(Arc::new(PanickingSource("AWS::ECS::Cluster")))),
            log.clone(),
            Duration::from_secs(5),
        );
        let totals = Mutex::new(ResourceTotals::default());

        let counts = scanner
            .scan_resources("444444444444", "eu-west-1", None, &totals)
            .await;

        assert_eq!(counts.len(), 9);
        assert_eq!(counts["AWS::ECS::Cluster"], 0);
        assert_eq!(counts["AWS::Lambda::Function"], 1);
        assert_eq!(log.records().len(), 9);
        assert!(log
            .records()
            .contains(&vec![
                "444444444444".to_string(),
                "eu-west-1".to_string(),
                "AWS::ECS::Cluster".to_string(),
                "0".to_string()
            ]));
        assert!(log.messages().iter().any(|m| m.starts_with(
            "Error counting AWS::ECS::Cluster in account 444444444444 region eu-west-1: counter panicked"
        )));
    }
}
