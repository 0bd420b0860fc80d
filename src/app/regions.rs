use crate::app::error::ScanError;
use crate::app::sdk_errors::sdk_error;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Lists the regions enabled for the caller
#[async_trait]
pub trait RegionLister: Send + Sync {
    async fn enabled_regions(&self) -> Result<Vec<String>>;
}

#[async_trait]
impl RegionLister for aws_sdk_ec2::Client {
    async fn enabled_regions(&self) -> Result<Vec<String>> {
        let response = self
            .describe_regions()
            .send()
            .await
            .map_err(sdk_error)
            .context("DescribeRegions failed")?;

        Ok(response
            .regions()
            .iter()
            .filter_map(|region| region.region_name())
            .map(String::from)
            .collect())
    }
}

pub struct RegionResolver {
    lister: Arc<dyn RegionLister>,
}

impl RegionResolver {
    pub fn new(lister: Arc<dyn RegionLister>) -> Self {
        Self { lister }
    }

    /// Regions to scan.
    ///
    /// A non-empty `specified` region is returned as-is without any remote call. Otherwise every
    /// enabled region is returned in the order the API reports them.
    pub async fn get_regions(&self, specified: Option<&str>) -> Result<Vec<String>, ScanError> {
        if let Some(region) = specified.filter(|r| !r.is_empty()) {
            return Ok(vec![region.to_string()]);
        }

        let regions = self
            .lister
            .enabled_regions()
            .await
            .map_err(|e| ScanError::RegionLookup(format!("{:#}", e)))?;
        trace_debug!("Resolved {} enabled regions", regions.len());
        Ok(regions)
    }
}
