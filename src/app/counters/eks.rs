use super::{CountSource, CounterDescriptor};
use crate::app::pagination::{collect_pages, count_pages, Page};
use crate::app::sdk_errors::sdk_error;
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_ec2::types::Filter;
use std::sync::Arc;

/// Tag key carried by every node of an EKS cluster
pub fn cluster_tag_key(cluster: &str) -> String {
    format!("kubernetes.io/cluster/{}", cluster)
}

#[async_trait]
pub trait EksApi: Send + Sync {
    async fn list_clusters(&self, next_token: Option<String>) -> Result<Page<String>>;
}

#[async_trait]
pub trait Ec2InstanceApi: Send + Sync {
    /// One page of ids of instances carrying the tag key `tag_key`
    async fn instances_with_tag_key(&self, tag_key: &str, next_token: Option<String>) -> Result<Page<String>>;
}

#[async_trait]
impl EksApi for aws_sdk_eks::Client {
    async fn list_clusters(&self, next_token: Option<String>) -> Result<Page<String>> {
        let response = self
            .list_clusters()
            .set_next_token(next_token)
            .send()
            .await
            .map_err(sdk_error)
            .context("failed to list EKS clusters")?;
        Ok(Page::new(response.clusters().to_vec(), response.next_token()))
    }
}

#[async_trait]
impl Ec2InstanceApi for aws_sdk_ec2::Client {
    async fn instances_with_tag_key(&self, tag_key: &str, next_token: Option<String>) -> Result<Page<String>> {
        let response = self
            .describe_instances()
            .filters(Filter::builder().name("tag-key").values(tag_key).build())
            .set_next_token(next_token)
            .send()
            .await
            .map_err(sdk_error)
            .with_context(|| format!("failed to describe instances tagged {}", tag_key))?;

        let ids = response
            .reservations()
            .iter()
            .flat_map(|reservation| reservation.instances())
            .map(|instance| instance.instance_id().unwrap_or_default().to_string())
            .collect();

        Ok(Page::new(ids, response.next_token()))
    }
}

/// Worker nodes: EC2 instances tagged as members of any EKS cluster
pub struct EksNodeCount {
    eks: Arc<dyn EksApi>,
    ec2: Arc<dyn Ec2InstanceApi>,
}

impl EksNodeCount {
    pub fn new(eks: Arc<dyn EksApi>, ec2: Arc<dyn Ec2InstanceApi>) -> Self {
        Self { eks, ec2 }
    }
}

#[async_trait]
impl CountSource for EksNodeCount {
    async fn count(&self, _descriptor: &CounterDescriptor) -> Result<u64> {
        let clusters = collect_pages(|token| self.eks.list_clusters(token)).await?;

        let mut total = 0;
        for cluster in &clusters {
            let tag_key = cluster_tag_key(cluster);
            total += count_pages(|token| self.ec2.instances_with_tag_key(&tag_key, token))
                .await
                .with_context(|| format!("failed to count nodes of cluster {}", cluster))?;
        }
        Ok(total)
    }
}
