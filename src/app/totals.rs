use comfy_table::{presets::NOTHING, Attribute, Cell, Color, ContentArrangement, Table};

/// Reporting category a resource type is aggregated into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceCategory {
    Buckets,
    ContainerHosts,
    Databases,
    NonOsDisks,
    ServerlessContainers,
    ServerlessFunctions,
    VirtualMachines,
    ContainerRegistryImages,
}

impl ResourceCategory {
    /// Display order of the totals table
    pub const ALL: [ResourceCategory; 8] = [
        ResourceCategory::Buckets,
        ResourceCategory::ContainerHosts,
        ResourceCategory::Databases,
        ResourceCategory::NonOsDisks,
        ResourceCategory::ServerlessContainers,
        ResourceCategory::ServerlessFunctions,
        ResourceCategory::VirtualMachines,
        ResourceCategory::ContainerRegistryImages,
    ];

    pub fn from_resource_type(resource_type: &str) -> Option<Self> {
        match resource_type {
            "AWS::S3::Bucket" => Some(ResourceCategory::Buckets),
            "AWS::EKS::Cluster" => Some(ResourceCategory::ContainerHosts),
            "AWS::DynamoDB::Table" | "AWS::RDS::DBInstance" => Some(ResourceCategory::Databases),
            "AWS::EFS::FileSystem" | "AWS::EC2::Volume" => Some(ResourceCategory::NonOsDisks),
            "AWS::ECS::Cluster" => Some(ResourceCategory::ServerlessContainers),
            "AWS::Lambda::Function" => Some(ResourceCategory::ServerlessFunctions),
            "AWS::EC2::Instance" => Some(ResourceCategory::VirtualMachines),
            "AWS::ECR::Repository" | "AWS::ECR::PublicRepository" => {
                Some(ResourceCategory::ContainerRegistryImages)
            }
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ResourceCategory::Buckets => "Storage Buckets",
            ResourceCategory::ContainerHosts => "Container Hosts",
            ResourceCategory::Databases => "Databases",
            ResourceCategory::NonOsDisks => "Non-OS Disks",
            ResourceCategory::ServerlessContainers => "Serverless Containers",
            ResourceCategory::ServerlessFunctions => "Serverless Functions",
            ResourceCategory::VirtualMachines => "Virtual Machines",
            ResourceCategory::ContainerRegistryImages => "Container Registry Images",
        }
    }
}

/// Run-wide counts per category
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceTotals {
    pub buckets: u64,
    pub container_hosts: u64,
    pub databases: u64,
    pub non_os_disks: u64,
    pub serverless_containers: u64,
    pub serverless_functions: u64,
    pub virtual_machines: u64,
    pub container_registry_images: u64,
}

impl ResourceTotals {
    /// Add `count` to the category of `resource_type`.
    /// Returns false, leaving the totals untouched, when the type has no category.
    pub fn record(&mut self, resource_type: &str, count: u64) -> bool {
        match ResourceCategory::from_resource_type(resource_type) {
            Some(category) => {
                *self.slot_mut(category) += count;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, category: ResourceCategory) -> u64 {
        match category {
            ResourceCategory::Buckets => self.buckets,
            ResourceCategory::ContainerHosts => self.container_hosts,
            ResourceCategory::Databases => self.databases,
            ResourceCategory::NonOsDisks => self.non_os_disks,
            ResourceCategory::ServerlessContainers => self.serverless_containers,
            ResourceCategory::ServerlessFunctions => self.serverless_functions,
            ResourceCategory::VirtualMachines => self.virtual_machines,
            ResourceCategory::ContainerRegistryImages => self.container_registry_images,
        }
    }

    fn slot_mut(&mut self, category: ResourceCategory) -> &mut u64 {
        match category {
            ResourceCategory::Buckets => &mut self.buckets,
            ResourceCategory::ContainerHosts => &mut self.container_hosts,
            ResourceCategory::Databases => &mut self.databases,
            ResourceCategory::NonOsDisks => &mut self.non_os_disks,
            ResourceCategory::ServerlessContainers => &mut self.serverless_containers,
            ResourceCategory::ServerlessFunctions => &mut self.serverless_functions,
            ResourceCategory::VirtualMachines => &mut self.virtual_machines,
            ResourceCategory::ContainerRegistryImages => &mut self.container_registry_images,
        }
    }

    pub fn total(&self) -> u64 {
        ResourceCategory::ALL.iter().map(|c| self.get(*c)).sum()
    }

    /// `ResourceType | Count` table in display order
    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(NOTHING)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("ResourceType")
                    .fg(Color::Green)
                    .add_attribute(Attribute::Underlined),
                Cell::new("Count")
                    .fg(Color::Green)
                    .add_attribute(Attribute::Underlined),
            ]);

        for category in ResourceCategory::ALL {
            table.add_row(vec![
                Cell::new(category.label()).fg(Color::Yellow),
                Cell::new(self.get(category)),
            ]);
        }

        table
    }
}

/// Outcome of the account/region loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub accounts: usize,
    pub pairs_scanned: usize,
    pub pairs_skipped: usize,
    pub totals: ResourceTotals,
}

impl ScanSummary {
    pub fn headline(&self) -> String {
        if self.accounts == 1 {
            "Scanned 1 AWS account.".to_string()
        } else {
            format!("Scanned {} AWS accounts.", self.accounts)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RESULTS: [(&str, u64); 6] = [
        ("AWS::EC2::Instance", 3),
        ("AWS::S3::Bucket", 2),
        ("AWS::RDS::DBInstance", 1),
        ("AWS::DynamoDB::Table", 4),
        ("AWS::ECR::PublicRepository", 5),
        ("AWS::ECR::Repository", 6),
    ];

    #[test]
    fn test_mapping_table() {
        assert_eq!(
            ResourceCategory::from_resource_type("AWS::EC2::Volume"),
            Some(ResourceCategory::NonOsDisks)
        );
        assert_eq!(
            ResourceCategory::from_resource_type("AWS::EKS::Cluster"),
            Some(ResourceCategory::ContainerHosts)
        );
        assert_eq!(ResourceCategory::from_resource_type("AWS::SNS::Topic"), None);
    }

    #[test]
    fn test_unmapped_type_is_not_aggregated() {
        let mut totals = ResourceTotals::default();
        assert!(!totals.record("AWS::SNS::Topic", 10));
        assert_eq!(totals, ResourceTotals::default());
    }

    #[test]
    fn test_aggregation_is_commutative() {
        let mut forward = ResourceTotals::default();
        for (tag, count) in RESULTS {
            forward.record(tag, count);
        }

        let mut reverse = ResourceTotals::default();
        for (tag, count) in RESULTS.iter().rev() {
            reverse.record(tag, *count);
        }

        assert_eq!(forward, reverse);
        assert_eq!(forward.databases, 5);
        assert_eq!(forward.container_registry_images, 11);
        assert_eq!(forward.total(), 21);
    }

    #[test]
    fn test_table_lists_every_category() {
        let mut totals = ResourceTotals::default();
        totals.record("AWS::EC2::Instance", 3);

        let mut table = totals.to_table();
        table.force_no_tty();
        let rendered = table.to_string();

        assert!(rendered.contains("ResourceType"));
        for category in ResourceCategory::ALL {
            assert!(rendered.contains(category.label()));
        }
        let vm_line = rendered
            .lines()
            .find(|line| line.contains("Virtual Machines"))
            .unwrap();
        assert!(vm_line.trim_end().ends_with('3'));
    }

    #[test]
    fn test_headline() {
        let mut summary = ScanSummary {
            accounts: 1,
            ..Default::default()
        };
        assert_eq!(summary.headline(), "Scanned 1 AWS account.");
        summary.accounts = 4;
        assert_eq!(summary.headline(), "Scanned 4 AWS accounts.");
    }
}
