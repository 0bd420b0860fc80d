use super::{CountSource, CounterDescriptor};
use crate::app::pagination::{count_pages, Page};
use crate::app::sdk_errors::sdk_error;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait CloudControlApi: Send + Sync {
    /// One page of resource identifiers of `type_name`
    async fn list_resources(&self, type_name: &str, next_token: Option<String>) -> Result<Page<String>>;
}

#[async_trait]
impl CloudControlApi for aws_sdk_cloudcontrol::Client {
    async fn list_resources(&self, type_name: &str, next_token: Option<String>) -> Result<Page<String>> {
        let response = self
            .list_resources()
            .type_name(type_name)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(sdk_error)
            .with_context(|| format!("ListResources failed for {}", type_name))?;

        let identifiers = response
            .resource_descriptions()
            .iter()
            .map(|d| d.identifier().unwrap_or_default().to_string())
            .collect();

        Ok(Page::new(identifiers, response.next_token()))
    }
}

/// Counts the Cloud Control resource descriptions of the descriptor's type
pub struct CloudControlCount {
    api: Arc<dyn CloudControlApi>,
}

impl CloudControlCount {
    pub fn new(api: Arc<dyn CloudControlApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl CountSource for CloudControlCount {
    async fn count(&self, descriptor: &CounterDescriptor) -> Result<u64> {
        let type_name = descriptor.resource_type;
        count_pages(|token| self.api.list_resources(type_name, token)).await
    }
}
