use super::{CountSource, CounterDescriptor};
use crate::app::pagination::{collect_pages, count_pages, Page};
use crate::app::sdk_errors::sdk_error;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait EcrApi: Send + Sync {
    /// One page of repository names
    async fn describe_repositories(&self, next_token: Option<String>) -> Result<Page<String>>;
    /// One page of image ids (digest, or tag when no digest is reported)
    async fn list_images(&self, repository: &str, next_token: Option<String>) -> Result<Page<String>>;
}

#[async_trait]
impl EcrApi for aws_sdk_ecr::Client {
    async fn describe_repositories(&self, next_token: Option<String>) -> Result<Page<String>> {
        let response = self
            .describe_repositories()
            .set_next_token(next_token)
            .send()
            .await
            .map_err(sdk_error)
            .context("failed to list ECR repositories")?;

        let names = response
            .repositories()
            .iter()
            .filter_map(|repo| repo.repository_name())
            .map(String::from)
            .collect();

        Ok(Page::new(names, response.next_token()))
    }

    async fn list_images(&self, repository: &str, next_token: Option<String>) -> Result<Page<String>> {
        let response = self
            .list_images()
            .repository_name(repository)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(sdk_error)
            .with_context(|| format!("failed to list images in repository {}", repository))?;

        let ids = response
            .image_ids()
            .iter()
            .map(|id| {
                id.image_digest()
                    .or(id.image_tag())
                    .unwrap_or_default()
                    .to_string()
            })
            .collect();

        Ok(Page::new(ids, response.next_token()))
    }
}

/// Sums the images of every private repository
pub struct EcrImageCount {
    api: Arc<dyn EcrApi>,
}

impl EcrImageCount {
    pub fn new(api: Arc<dyn EcrApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl CountSource for EcrImageCount {
    async fn count(&self, _descriptor: &CounterDescriptor) -> Result<u64> {
        let repositories = collect_pages(|token| self.api.describe_repositories(token)).await?;

        let mut total = 0;
        for repository in &repositories {
            total += count_pages(|token| self.api.list_images(repository, token)).await?;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::counters::COUNTERS;
    use std::collections::HashMap;

    struct FakeEcr {
        repositories: Vec<Vec<&'static str>>,
        images: HashMap<&'static str, Result<Vec<usize>, &'static str>>,
    }

    fn page<T>(pages: &[T], token: Option<String>) -> (usize, Option<String>) {
        let index: usize = token.map(|t| t.parse().unwrap()).unwrap_or(0);
        let next = (index + 1 < pages.len()).then(|| (index + 1).to_string());
        (index, next)
    }

    #[async_trait]
    impl EcrApi for FakeEcr {
        async fn describe_repositories(&self, next_token: Option<String>) -> Result<Page<String>> {
            let (index, next) = page(&self.repositories, next_token);
            Ok(Page {
                items: self.repositories[index].iter().map(|s| s.to_string()).collect(),
                next_token: next,
            })
        }

        async fn list_images(&self, repository: &str, next_token: Option<String>) -> Result<Page<String>> {
            let pages = match self.images.get(repository) {
                Some(Ok(pages)) => pages,
                Some(Err(e)) => anyhow::bail!("{}", e),
                None => return Ok(Page::last(Vec::new())),
            };
            let (index, next) = page(pages, next_token);
            Ok(Page {
                items: vec!["sha256:abc".to_string(); pages[index]],
                next_token: next,
            })
        }
    }

    fn descriptor() -> &'static CounterDescriptor {
        COUNTERS
            .iter()
            .find(|d| d.resource_type == "AWS::ECR::Repository")
            .unwrap()
    }

    #[tokio::test]
    async fn test_sums_images_across_repositories() {
        let api = FakeEcr {
            repositories: vec![vec!["web", "worker"], vec!["empty"]],
            images: HashMap::from([("web", Ok(vec![3, 2])), ("worker", Ok(vec![4]))]),
        };
        let count = EcrImageCount::new(Arc::new(api))
            .count(descriptor())
            .await
            .unwrap();
        assert_eq!(count, 9);
    }

    #[tokio::test]
    async fn test_image_listing_error_fails_counter() {
        let api = FakeEcr {
            repositories: vec![vec!["web"]],
            images: HashMap::from([("web", Err("RepositoryNotFoundException"))]),
        };
        let err = EcrImageCount::new(Arc::new(api))
            .count(descriptor())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("RepositoryNotFoundException"));
    }
}
