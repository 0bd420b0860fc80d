use super::{CountSource, CounterDescriptor};
use crate::app::pagination::{collect_pages, Page};
use crate::app::sdk_errors::sdk_error;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// DescribeServices accepts at most this many services per call
const DESCRIBE_SERVICES_BATCH: usize = 10;

/// A deployment of an ECS service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDeployment {
    pub task_definition: String,
    pub running_count: u64,
}

#[async_trait]
pub trait EcsApi: Send + Sync {
    async fn list_clusters(&self, next_token: Option<String>) -> Result<Page<String>>;
    async fn list_services(&self, cluster: &str, next_token: Option<String>) -> Result<Page<String>>;
    /// Deployments of every listed service
    async fn describe_services(&self, cluster: &str, services: &[String]) -> Result<Vec<ServiceDeployment>>;
    /// Number of container definitions in a task definition
    async fn container_count(&self, task_definition: &str) -> Result<u64>;
}

#[async_trait]
impl EcsApi for aws_sdk_ecs::Client {
    async fn list_clusters(&self, next_token: Option<String>) -> Result<Page<String>> {
        let response = self
            .list_clusters()
            .set_next_token(next_token)
            .send()
            .await
            .map_err(sdk_error)
            .context("failed to list ECS clusters")?;
        Ok(Page::new(response.cluster_arns().to_vec(), response.next_token()))
    }

    async fn list_services(&self, cluster: &str, next_token: Option<String>) -> Result<Page<String>> {
        let response = self
            .list_services()
            .cluster(cluster)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(sdk_error)
            .with_context(|| format!("failed to list services in cluster {}", cluster))?;
        Ok(Page::new(response.service_arns().to_vec(), response.next_token()))
    }

    async fn describe_services(&self, cluster: &str, services: &[String]) -> Result<Vec<ServiceDeployment>> {
        let response = self
            .describe_services()
            .cluster(cluster)
            .set_services(Some(services.to_vec()))
            .send()
            .await
            .map_err(sdk_error)
            .with_context(|| format!("failed to describe services in cluster {}", cluster))?;

        Ok(response
            .services()
            .iter()
            .flat_map(|service| service.deployments())
            .filter_map(|deployment| {
                deployment.task_definition().map(|td| ServiceDeployment {
                    task_definition: td.to_string(),
                    running_count: deployment.running_count().max(0) as u64,
                })
            })
            .collect())
    }

    async fn container_count(&self, task_definition: &str) -> Result<u64> {
        let response = self
            .describe_task_definition()
            .task_definition(task_definition)
            .send()
            .await
            .map_err(sdk_error)
            .with_context(|| {
                format!("failed to describe task definition for {}", task_definition)
            })?;

        Ok(response
            .task_definition()
            .map(|td| td.container_definitions().len() as u64)
            .unwrap_or(0))
    }
}

/// Running containers: for every deployment, running tasks times containers per task
pub struct EcsContainerCount {
    api: Arc<dyn EcsApi>,
}

impl EcsContainerCount {
    pub fn new(api: Arc<dyn EcsApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl CountSource for EcsContainerCount {
    async fn count(&self, _descriptor: &CounterDescriptor) -> Result<u64> {
        let clusters = collect_pages(|token| self.api.list_clusters(token)).await?;

        // Several deployments usually share a task definition revision
        let mut containers_per_task: HashMap<String, u64> = HashMap::new();
        let mut total = 0;

        for cluster in &clusters {
            let services = collect_pages(|token| self.api.list_services(cluster, token)).await?;

            for batch in services.chunks(DESCRIBE_SERVICES_BATCH) {
                for deployment in self.api.describe_services(cluster, batch).await? {
                    let containers = match containers_per_task.get(&deployment.task_definition) {
                        Some(count) => *count,
                        None => {
                            let count = self.api.container_count(&deployment.task_definition).await?;
                            containers_per_task.insert(deployment.task_definition.clone(), count);
                            count
                        }
                    };
                    total += deployment.running_count * containers;
                }
            }
        }

        Ok(total)
    }
}
