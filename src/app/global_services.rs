use std::collections::HashSet;

/// Region where account-wide resource types are counted
pub const GLOBAL_SCAN_REGION: &str = "us-east-1";

/// Registry of resource types that are counted once per account instead of once per region.
/// Cloud Control lists every bucket of the account from any region, and ECR Public only exists
/// in us-east-1.
pub struct GlobalServiceRegistry {
    global_resource_types: HashSet<&'static str>,
}

impl Default for GlobalServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalServiceRegistry {
    pub fn new() -> Self {
        let mut registry = HashSet::new();

        // S3 - bucket listing is account-wide
        registry.insert("AWS::S3::Bucket");

        // ECR Public - single-region service
        registry.insert("AWS::ECR::PublicRepository");

        Self {
            global_resource_types: registry,
        }
    }

    /// Check if a resource type is counted once per account
    pub fn is_global(&self, resource_type: &str) -> bool {
        self.global_resource_types.contains(resource_type)
    }

    /// Get the query region for global resource types
    pub fn get_query_region(&self) -> &'static str {
        GLOBAL_SCAN_REGION
    }

    /// Whether `resource_type` should be counted in `region`
    pub fn should_count_in(&self, resource_type: &str, region: &str) -> bool {
        !self.is_global(resource_type) || region == self.get_query_region()
    }
}

/// Convenience function to check if a resource type is global
pub fn is_global_service(resource_type: &str) -> bool {
    GlobalServiceRegistry::new().is_global(resource_type)
}
