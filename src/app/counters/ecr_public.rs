use super::{CountSource, CounterDescriptor};
use crate::app::pagination::{collect_pages, count_pages, Page};
use crate::app::sdk_errors::sdk_error;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait EcrPublicApi: Send + Sync {
    async fn describe_repositories(&self, next_token: Option<String>) -> Result<Page<String>>;
    /// One page of image digests of `repository`
    async fn describe_images(&self, repository: &str, next_token: Option<String>) -> Result<Page<String>>;
}

#[async_trait]
impl EcrPublicApi for aws_sdk_ecrpublic::Client {
    async fn describe_repositories(&self, next_token: Option<String>) -> Result<Page<String>> {
        let response = self
            .describe_repositories()
            .set_next_token(next_token)
            .send()
            .await
            .map_err(sdk_error)
            .context("failed to list public ECR repositories")?;

        let names = response
            .repositories()
            .iter()
            .filter_map(|repo| repo.repository_name())
            .map(String::from)
            .collect();

        Ok(Page::new(names, response.next_token()))
    }

    async fn describe_images(&self, repository: &str, next_token: Option<String>) -> Result<Page<String>> {
        let response = self
            .describe_images()
            .repository_name(repository)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(sdk_error)
            .with_context(|| format!("failed to describe images in repository {}", repository))?;

        let digests = response
            .image_details()
            .iter()
            .map(|detail| detail.image_digest().unwrap_or_default().to_string())
            .collect();

        Ok(Page::new(digests, response.next_token()))
    }
}

/// Sums the images of every public repository
pub struct EcrPublicImageCount {
    api: Arc<dyn EcrPublicApi>,
}

impl EcrPublicImageCount {
    pub fn new(api: Arc<dyn EcrPublicApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl CountSource for EcrPublicImageCount {
    async fn count(&self, _descriptor: &CounterDescriptor) -> Result<u64> {
        let repositories = collect_pages(|token| self.api.describe_repositories(token)).await?;

        let mut total = 0;
        for repository in &repositories {
            total += count_pages(|token| self.api.describe_images(repository, token)).await?;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::counters::COUNTERS;

    struct FakeEcrPublic;

    #[async_trait]
    impl EcrPublicApi for FakeEcrPublic {
        async fn describe_repositories(&self, next_token: Option<String>) -> Result<Page<String>> {
            Ok(match next_token.as_deref() {
                None => Page::new(vec!["agent".into()], Some("2")),
                _ => Page::last(vec!["cli".into()]),
            })
        }

        async fn describe_images(&self, repository: &str, _next_token: Option<String>) -> Result<Page<String>> {
            let n = if repository == "agent" { 5 } else { 1 };
            Ok(Page::last(vec!["sha256:abc".to_string(); n]))
        }
    }

    #[tokio::test]
    async fn test_sums_images_across_pages_of_repositories() {
        let descriptor = COUNTERS
            .iter()
            .find(|d| d.resource_type == "AWS::ECR::PublicRepository")
            .unwrap();

        let count = EcrPublicImageCount::new(Arc::new(FakeEcrPublic))
            .count(descriptor)
            .await
            .unwrap();

        assert_eq!(count, 6);
    }
}
