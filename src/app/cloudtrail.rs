//! CloudTrail check printed after a scan with `--trail`.
//!
//! Lists the trails visible to the caller and resolves, for each one, the ARN of its S3 bucket
//! and the first SNS topic the bucket publishes notifications to.

use crate::app::sdk_errors::sdk_error;
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_types::region::Region;
use aws_types::SdkConfig;
use comfy_table::{presets::NOTHING, Attribute, Cell, Color, ContentArrangement, Table};

/// Region of buckets created without a location constraint
const DEFAULT_BUCKET_REGION: &str = "us-east-1";

/// Trail fields used by the check
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrailSummary {
    pub trail_arn: Option<String>,
    pub is_organization_trail: bool,
    pub s3_bucket_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrailInfo {
    pub account_id: String,
    pub trail_arn: String,
    pub is_organization_trail: bool,
    pub s3_bucket_arn: Option<String>,
    pub sns_topic_arn: Option<String>,
}

#[async_trait]
pub trait TrailApi: Send + Sync {
    async fn describe_trails(&self) -> Result<Vec<TrailSummary>>;
    /// Region of `bucket`, with the empty constraint resolved
    async fn bucket_region(&self, bucket: &str) -> Result<String>;
    /// First SNS topic in the notification configuration of `bucket`
    async fn bucket_topic_arn(&self, bucket: &str, region: &str) -> Result<Option<String>>;
}

/// Normalize a `GetBucketLocation` constraint into a region name
pub fn bucket_region_from_constraint(constraint: Option<&str>) -> String {
    match constraint {
        None | Some("") => DEFAULT_BUCKET_REGION.to_string(),
        // Legacy alias reported for old Ireland buckets
        Some("EU") => "eu-west-1".to_string(),
        Some(region) => region.to_string(),
    }
}

pub struct SdkTrailApi {
    config: SdkConfig,
    cloudtrail: aws_sdk_cloudtrail::Client,
    s3: aws_sdk_s3::Client,
}

impl SdkTrailApi {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            config: config.clone(),
            cloudtrail: aws_sdk_cloudtrail::Client::new(config),
            s3: aws_sdk_s3::Client::new(config),
        }
    }
}

#[async_trait]
impl TrailApi for SdkTrailApi {
    async fn describe_trails(&self) -> Result<Vec<TrailSummary>> {
        let response = self
            .cloudtrail
            .describe_trails()
            .send()
            .await
            .map_err(sdk_error)?;

        Ok(response
            .trail_list()
            .iter()
            .map(|trail| TrailSummary {
                trail_arn: trail.trail_arn().map(String::from),
                is_organization_trail: trail.is_organization_trail().unwrap_or(false),
                s3_bucket_name: trail.s3_bucket_name().map(String::from),
            })
            .collect())
    }

    async fn bucket_region(&self, bucket: &str) -> Result<String> {
        let response = self
            .s3
            .get_bucket_location()
            .bucket(bucket)
            .send()
            .await
            .map_err(sdk_error)
            .with_context(|| format!("failed to get bucket location for bucket {}", bucket))?;

        Ok(bucket_region_from_constraint(
            response.location_constraint().map(|c| c.as_str()),
        ))
    }

    async fn bucket_topic_arn(&self, bucket: &str, region: &str) -> Result<Option<String>> {
        // Notification configuration must be read in the bucket's own region
        let s3_config = aws_sdk_s3::config::Builder::from(&self.config)
            .region(Region::new(region.to_string()))
            .build();
        let client = aws_sdk_s3::Client::from_conf(s3_config);

        let response = client
            .get_bucket_notification_configuration()
            .bucket(bucket)
            .send()
            .await
            .map_err(sdk_error)
            .with_context(|| {
                format!(
                    "failed to get bucket notification configuration for bucket {}",
                    bucket
                )
            })?;

        Ok(response
            .topic_configurations()
            .iter()
            .map(|topic| topic.topic_arn())
            .find(|arn| !arn.is_empty())
            .map(String::from))
    }
}

pub struct CloudTrailChecker<'a> {
    api: &'a dyn TrailApi,
}

impl<'a> CloudTrailChecker<'a> {
    pub fn new(api: &'a dyn TrailApi) -> Self {
        Self { api }
    }

    /// Trail, bucket and topic ARNs of every trail; the first failure aborts the check
    pub async fn check(&self, account_id: &str) -> Result<Vec<TrailInfo>> {
        let trails = self
            .api
            .describe_trails()
            .await
            .with_context(|| format!("error checking CloudTrail for account {}", account_id))?;

        let mut infos = Vec::with_capacity(trails.len());
        for trail in trails {
            let info = self
                .trail_info(account_id, trail)
                .await
                .with_context(|| format!("error creating trail info for account {}", account_id))?;
            infos.push(info);
        }
        Ok(infos)
    }

    async fn trail_info(&self, account_id: &str, trail: TrailSummary) -> Result<TrailInfo> {
        let mut info = TrailInfo {
            account_id: account_id.to_string(),
            trail_arn: trail.trail_arn.unwrap_or_default(),
            is_organization_trail: trail.is_organization_trail,
            s3_bucket_arn: None,
            sns_topic_arn: None,
        };

        if let Some(bucket) = trail.s3_bucket_name.filter(|b| !b.is_empty()) {
            info.s3_bucket_arn = Some(format!("arn:aws:s3:::{}", bucket));

            let region = self
                .api
                .bucket_region(&bucket)
                .await
                .with_context(|| format!("failed to get bucket region for bucket {}", bucket))?;
            info.sns_topic_arn = self
                .api
                .bucket_topic_arn(&bucket, &region)
                .await
                .with_context(|| format!("failed to get SNS topic ARN for bucket {}", bucket))?;
        }

        Ok(info)
    }
}

/// `ResourceType | ARN` table with Trail, S3 and SNS rows per trail
pub fn trail_table(infos: &[TrailInfo]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ResourceType")
                .fg(Color::Green)
                .add_attribute(Attribute::Underlined),
            Cell::new("ARN")
                .fg(Color::Green)
                .add_attribute(Attribute::Underlined),
        ]);

    for info in infos {
        let rows = [
            ("Trail", Some(info.trail_arn.as_str()).filter(|a| !a.is_empty())),
            ("S3", info.s3_bucket_arn.as_deref()),
            ("SNS", info.sns_topic_arn.as_deref()),
        ];
        for (kind, arn) in rows {
            if let Some(arn) = arn {
                table.add_row(vec![Cell::new(kind).fg(Color::Yellow), Cell::new(arn)]);
            }
        }
    }

    table
}
