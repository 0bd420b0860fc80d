//! Resource counters.
//!
//! Every counted resource type is described by a static [`CounterDescriptor`]: its tag, the
//! wording of its remediation hint and the [`CountStrategy`] used to count it. A [`Counter`]
//! binds a descriptor to the service APIs of one account/region pair and implements the shared
//! [`ResourceCounter`] capability used by the scanner.

pub mod cloudcontrol;
pub mod ecr;
pub mod ecr_public;
pub mod ecs;
pub mod eks;

use crate::app::credentials::ScanCredentials;
use crate::app::global_services::GlobalServiceRegistry;
use crate::app::sdk_errors::categorize_error_string;
use crate::app::session::regional_config;
use anyhow::Result;
use async_trait::async_trait;
use aws_types::SdkConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub use cloudcontrol::CloudControlApi;
pub use ecr::EcrApi;
pub use ecr_public::EcrPublicApi;
pub use ecs::{EcsApi, ServiceDeployment};
pub use eks::{Ec2InstanceApi, EksApi};

/// How a resource type is counted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountStrategy {
    /// Number of Cloud Control resource descriptions of the type
    CloudControl,
    /// Images across all private ECR repositories
    EcrImages,
    /// Images across all ECR Public repositories
    EcrPublicImages,
    /// Running containers of every ECS service deployment
    EcsContainers,
    /// EC2 instances tagged as members of an EKS cluster
    EksNodes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterDescriptor {
    pub resource_type: &'static str,
    /// Plural noun used in the remediation hint
    pub display_name: &'static str,
    pub permissions: &'static [&'static str],
    pub strategy: CountStrategy,
}

impl CounterDescriptor {
    /// Permission hint attached to a failed result
    pub fn remediation(&self) -> String {
        let mut text = format!(
            "\nTo scan {}, the provided credentials must have the following permissions:\n",
            self.display_name
        );
        for permission in self.permissions {
            text.push_str("- ");
            text.push_str(permission);
            text.push('\n');
        }
        text
    }
}

/// Every counter, in execution order
pub const COUNTERS: &[CounterDescriptor] = &[
    CounterDescriptor {
        resource_type: "AWS::S3::Bucket",
        display_name: "S3 buckets",
        permissions: &["s3:ListAllMyBuckets", "s3:GetBucketLocation"],
        strategy: CountStrategy::CloudControl,
    },
    CounterDescriptor {
        resource_type: "AWS::ECR::PublicRepository",
        display_name: "public ECR repositories",
        permissions: &["ecr-public:DescribeRepositories", "ecr-public:DescribeImages"],
        strategy: CountStrategy::EcrPublicImages,
    },
    CounterDescriptor {
        resource_type: "AWS::EC2::Instance",
        display_name: "EC2 instances",
        permissions: &["ec2:DescribeInstances"],
        strategy: CountStrategy::CloudControl,
    },
    CounterDescriptor {
        resource_type: "AWS::DynamoDB::Table",
        display_name: "DynamoDB tables",
        permissions: &["dynamodb:ListTables", "dynamodb:ListGlobalTables"],
        strategy: CountStrategy::CloudControl,
    },
    CounterDescriptor {
        resource_type: "AWS::EC2::Volume",
        display_name: "EBS volumes",
        permissions: &["ec2:DescribeVolumes"],
        strategy: CountStrategy::CloudControl,
    },
    CounterDescriptor {
        resource_type: "AWS::ECR::Repository",
        display_name: "ECR repositories",
        permissions: &["ecr:DescribeRepositories", "ecr:ListImages"],
        strategy: CountStrategy::EcrImages,
    },
    CounterDescriptor {
        resource_type: "AWS::ECS::Cluster",
        display_name: "ECS containers",
        permissions: &[
            "ecs:ListClusters",
            "ecs:ListServices",
            "ecs:DescribeServices",
            "ecs:DescribeTaskDefinition",
        ],
        strategy: CountStrategy::EcsContainers,
    },
    CounterDescriptor {
        resource_type: "AWS::EFS::FileSystem",
        display_name: "EFS file systems",
        permissions: &["elasticfilesystem:DescribeFileSystems"],
        strategy: CountStrategy::CloudControl,
    },
    CounterDescriptor {
        resource_type: "AWS::EKS::Cluster",
        display_name: "EKS clusters",
        permissions: &["eks:ListClusters", "ec2:DescribeInstances"],
        strategy: CountStrategy::EksNodes,
    },
    CounterDescriptor {
        resource_type: "AWS::Lambda::Function",
        display_name: "Lambda functions",
        permissions: &["lambda:ListFunctions"],
        strategy: CountStrategy::CloudControl,
    },
    CounterDescriptor {
        resource_type: "AWS::RDS::DBInstance",
        display_name: "RDS instances",
        permissions: &["rds:DescribeDBInstances"],
        strategy: CountStrategy::CloudControl,
    },
];

/// Descriptors that run in `region`; account-wide types only run in the global scan region
pub fn descriptors_for_region(region: &str) -> Vec<&'static CounterDescriptor> {
    let registry = GlobalServiceRegistry::new();
    COUNTERS
        .iter()
        .filter(|d| registry.should_count_in(d.resource_type, region))
        .collect()
}

/// Outcome of one counter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterResult {
    pub resource_type: String,
    pub count: u64,
    pub error: Option<String>,
    pub permission_suggestion: Option<String>,
}

impl CounterResult {
    /// Placeholder held by a counter that has not executed yet
    pub fn pending(descriptor: &CounterDescriptor) -> Self {
        Self::success(descriptor, 0)
    }

    pub fn success(descriptor: &CounterDescriptor, count: u64) -> Self {
        Self {
            resource_type: descriptor.resource_type.to_string(),
            count,
            error: None,
            permission_suggestion: None,
        }
    }

    /// Zero count carrying the error and the remediation hint
    pub fn failure(descriptor: &CounterDescriptor, error: impl Into<String>) -> Self {
        Self {
            resource_type: descriptor.resource_type.to_string(),
            count: 0,
            error: Some(error.into()),
            permission_suggestion: Some(descriptor.remediation()),
        }
    }

    pub fn timed_out(descriptor: &CounterDescriptor, timeout: Duration) -> Self {
        Self::failure(
            descriptor,
            format!("counter timed out after {:?}", timeout),
        )
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Capability shared by all counters: run once, then report
#[async_trait]
pub trait ResourceCounter: Send {
    fn descriptor(&self) -> &'static CounterDescriptor;
    async fn execute(&mut self);
    fn result(&self) -> CounterResult;
}

/// Counting logic of one strategy
#[async_trait]
pub trait CountSource: Send + Sync {
    async fn count(&self, descriptor: &CounterDescriptor) -> Result<u64>;
}

/// A descriptor bound to the source that counts it
pub struct Counter {
    descriptor: &'static CounterDescriptor,
    source: Arc<dyn CountSource>,
    result: CounterResult,
}

impl Counter {
    pub fn new(descriptor: &'static CounterDescriptor, source: Arc<dyn CountSource>) -> Self {
        Self {
            descriptor,
            source,
            result: CounterResult::pending(descriptor),
        }
    }
}

#[async_trait]
impl ResourceCounter for Counter {
    fn descriptor(&self) -> &'static CounterDescriptor {
        self.descriptor
    }

    async fn execute(&mut self) {
        self.result = match self.source.count(self.descriptor).await {
            Ok(count) => CounterResult::success(self.descriptor, count),
            Err(e) => {
                let message = format!("{:#}", e);
                let category = categorize_error_string(&message);
                warn!(
                    retryable = category.is_retryable(),
                    "Error counting {} ({}): {}",
                    self.descriptor.resource_type,
                    category.short_label(),
                    message
                );
                CounterResult::failure(self.descriptor, message)
            }
        };
    }

    fn result(&self) -> CounterResult {
        self.result.clone()
    }
}

/// Service APIs of one account/region pair
#[derive(Clone)]
pub struct ServiceClients {
    pub cloud_control: Arc<dyn CloudControlApi>,
    pub ecr: Arc<dyn EcrApi>,
    pub ecr_public: Arc<dyn EcrPublicApi>,
    pub ecs: Arc<dyn EcsApi>,
    pub eks: Arc<dyn EksApi>,
    pub ec2: Arc<dyn Ec2InstanceApi>,
}

impl ServiceClients {
    pub fn from_sdk_config(config: &SdkConfig) -> Self {
        Self {
            cloud_control: Arc::new(aws_sdk_cloudcontrol::Client::new(config)),
            ecr: Arc::new(aws_sdk_ecr::Client::new(config)),
            ecr_public: Arc::new(aws_sdk_ecrpublic::Client::new(config)),
            ecs: Arc::new(aws_sdk_ecs::Client::new(config)),
            eks: Arc::new(aws_sdk_eks::Client::new(config)),
            ec2: Arc::new(aws_sdk_ec2::Client::new(config)),
        }
    }

    fn source_for(&self, strategy: CountStrategy) -> Arc<dyn CountSource> {
        match strategy {
            CountStrategy::CloudControl => {
                Arc::new(cloudcontrol::CloudControlCount::new(self.cloud_control.clone()))
            }
            CountStrategy::EcrImages => Arc::new(ecr::EcrImageCount::new(self.ecr.clone())),
            CountStrategy::EcrPublicImages => Arc::new(ecr_public::EcrPublicImageCount::new(
                self.ecr_public.clone(),
            )),
            CountStrategy::EcsContainers => {
                Arc::new(ecs::EcsContainerCount::new(self.ecs.clone()))
            }
            CountStrategy::EksNodes => {
                Arc::new(eks::EksNodeCount::new(self.eks.clone(), self.ec2.clone()))
            }
        }
    }

    /// Counters that run in `region`, bound to these clients
    pub fn counters_for_region(&self, region: &str) -> Vec<Box<dyn ResourceCounter>> {
        descriptors_for_region(region)
            .into_iter()
            .map(|descriptor| {
                Box::new(Counter::new(descriptor, self.source_for(descriptor.strategy)))
                    as Box<dyn ResourceCounter>
            })
            .collect()
    }
}

/// Builds the counters of one account/region pair
pub trait CounterFactory: Send + Sync {
    fn counters_for(
        &self,
        region: &str,
        credentials: Option<&ScanCredentials>,
    ) -> Vec<Box<dyn ResourceCounter>>;
}

/// Factory backed by real SDK clients
pub struct SdkCounterFactory {
    base: SdkConfig,
}

impl SdkCounterFactory {
    pub fn new(base: SdkConfig) -> Self {
        Self { base }
    }
}

impl CounterFactory for SdkCounterFactory {
    fn counters_for(
        &self,
        region: &str,
        credentials: Option<&ScanCredentials>,
    ) -> Vec<Box<dyn ResourceCounter>> {
        let config = regional_config(&self.base, region, credentials);
        ServiceClients::from_sdk_config(&config).counters_for_region(region)
    }
}
