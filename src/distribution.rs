// Copyright (c) 2025 - Cowboy AI, Inc.
//! Static Distribution Blueprint
//!
//! Builds the resource graph for one static site from a
//! [`DeploymentConfig`]:
//!
//! ```text
//! wwwBucket (home) <──────────────── wwwDistribution (cdn) <── dnsRecord (cdn)
//!                                        │ validation gate           │
//!                                        v                           │
//! subHostedZone <── subHostedZoneDelegate <── certificate (cdn)      │
//!       ^                                         │                  │
//!       └─────────────────────────────────────────┴──────────────────┘
//! ```
//!
//! The hosted zone and its delegation follow their consumers into the CDN
//! region; the bucket stays home. The distribution's reference to the
//! bucket therefore crosses regions.

use serde::Serialize;

use crate::backend::outputs;
use crate::config::DeploymentConfig;
use crate::domain::invariants::{validate_bucket_prefix, validate_record_name};
use crate::domain::{DomainName, InvariantViolation, Region, ResourceCategory, ResourceKind};
use crate::errors::ProvisioningResult;
use crate::graph::{
    BucketAttributes, CertificateAttributes, DelegationAttributes, DistributionAttributes,
    DnsRecordAttributes, EdgeKind, HostedZoneAttributes, RecordTarget, RecordType, RemovalPolicy,
    ResourceAttributes, ResourceGraph,
};
use crate::orchestrator::Deployment;
use crate::partition::{partition, PartitionedGraph, RegionPolicy};

/// Logical names of the blueprint's nodes
pub mod names {
    pub const WWW_BUCKET: &str = "wwwBucket";
    pub const SUB_HOSTED_ZONE: &str = "subHostedZone";
    pub const DELEGATION: &str = "subHostedZoneDelegate";
    pub const CERTIFICATE: &str = "certificate";
    pub const DISTRIBUTION: &str = "wwwDistribution";
    pub const DNS_RECORD: &str = "dnsRecord";
}

/// TTL of the NS record in the parent zone (two days)
const DELEGATION_TTL_SECONDS: u32 = 172_800;

/// Graph and placement rules for one static site
#[derive(Debug, Clone)]
pub struct DistributionBlueprint {
    config: DeploymentConfig,
}

impl DistributionBlueprint {
    pub fn new(config: DeploymentConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DeploymentConfig {
        &self.config
    }

    /// Build and validate the resource graph
    pub fn graph(&self) -> ProvisioningResult<ResourceGraph> {
        let config = &self.config;
        let project_domain = config.project_domain()?;
        validate_bucket_prefix(&config.stack_name)?;
        validate_record_name(config.record_name.as_deref(), &project_domain)?;

        let public_name = match &config.record_name {
            Some(label) => DomainName::new(format!("{}.{}", label, project_domain))
                .map_err(|e| InvariantViolation::InvalidRecordName(e.to_string()))?,
            None => project_domain.clone(),
        };

        let mut graph = ResourceGraph::new();

        let bucket = graph.add_named_node(
            names::WWW_BUCKET,
            ResourceKind::Bucket,
            ResourceAttributes::Bucket(BucketAttributes {
                name_prefix: config.stack_name.clone(),
                block_public_access: true,
                removal_policy: RemovalPolicy::Destroy,
            }),
        );
        let zone = graph.add_named_node(
            names::SUB_HOSTED_ZONE,
            ResourceKind::HostedZone,
            ResourceAttributes::HostedZone(HostedZoneAttributes {
                zone_name: project_domain.clone(),
            }),
        );
        let delegation = graph.add_named_node(
            names::DELEGATION,
            ResourceKind::DelegationRecord,
            ResourceAttributes::DelegationRecord(DelegationAttributes {
                parent_zone: config.domain_name.clone(),
                delegated_zone: project_domain.clone(),
                delegation_role: config.parent_zone_role.clone(),
                ttl_seconds: DELEGATION_TTL_SECONDS,
            }),
        );
        let certificate = graph.add_named_node(
            names::CERTIFICATE,
            ResourceKind::Certificate,
            ResourceAttributes::Certificate(CertificateAttributes {
                domain_name: public_name.clone(),
                subject_alternative_names: Vec::new(),
            }),
        );
        let distribution = graph.add_named_node(
            names::DISTRIBUTION,
            ResourceKind::Distribution,
            ResourceAttributes::Distribution(DistributionAttributes::for_aliases(vec![
                public_name,
            ])),
        );
        let record = graph.add_named_node(
            names::DNS_RECORD,
            ResourceKind::DnsRecord,
            ResourceAttributes::DnsRecord(DnsRecordAttributes {
                record_name: config.record_name.clone(),
                record_type: RecordType::A,
                target: RecordTarget::Distribution,
            }),
        );

        graph.add_edge(delegation, zone, EdgeKind::DependsOn);
        graph.add_edge(certificate, zone, EdgeKind::DependsOn);
        // Validation records only resolve once the zone is delegated.
        graph.add_edge(certificate, delegation, EdgeKind::DependsOn);
        graph.add_edge(distribution, bucket, EdgeKind::DependsOn);
        graph.add_edge(distribution, certificate, EdgeKind::ValidationGate);
        graph.add_edge(record, zone, EdgeKind::DependsOn);
        graph.add_edge(record, distribution, EdgeKind::DependsOn);

        graph.validate()?;
        Ok(graph)
    }

    /// Placement rules: CDN-facing kinds in the CDN region, bucket at home
    pub fn region_policy(&self) -> RegionPolicy {
        let cdn = &self.config.cdn_region;
        RegionPolicy::new(self.config.home_region.clone())
            .pin(ResourceKind::Certificate, cdn.clone())
            .pin(ResourceKind::Distribution, cdn.clone())
            .pin(ResourceKind::DnsRecord, cdn.clone())
            .pin(ResourceKind::Bucket, self.config.home_region.clone())
            .co_locate(ResourceKind::HostedZone)
            .co_locate(ResourceKind::DelegationRecord)
    }

    pub fn partition(&self) -> ProvisioningResult<PartitionedGraph> {
        Ok(partition(&self.graph()?, &self.region_policy())?)
    }

    /// Fresh deployment with every node Pending
    pub fn deployment(&self) -> ProvisioningResult<Deployment> {
        Ok(Deployment::new(self.partition()?)?)
    }

    /// What an apply would do, without touching anything
    pub fn plan(&self) -> ProvisioningResult<DeploymentPlan> {
        let partitioned = self.partition()?;
        let graph = partitioned.graph();

        let planned = |id| {
            graph.node(id).map(|node| PlannedNode {
                name: node.name.clone(),
                kind: node.kind,
                category: node.kind.category(),
                awaits_external: node.kind.requires_external_confirmation(),
            })
        };

        let partitions = partitioned
            .partitions()
            .iter()
            .map(|p| PlannedPartition {
                region: p.region.clone(),
                nodes: p.nodes.iter().filter_map(|id| planned(*id)).collect(),
            })
            .collect();

        let cross_region_edges = partitioned
            .cross_region_edges()
            .filter_map(|edge| {
                Some(PlannedEdge {
                    consumer: graph.name_of(edge.from),
                    consumer_region: partitioned.region_of(edge.from)?.clone(),
                    dependency: graph.name_of(edge.to),
                    dependency_region: partitioned.region_of(edge.to)?.clone(),
                })
            })
            .collect();

        let apply_order = graph
            .topological_order()?
            .into_iter()
            .map(|id| graph.name_of(id))
            .collect();

        Ok(DeploymentPlan {
            stack_name: self.config.stack_name.clone(),
            project_domain: self.config.project_domain()?,
            partitions,
            apply_order,
            cross_region_edges,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedNode {
    pub name: String,
    pub kind: ResourceKind,
    pub category: ResourceCategory,
    /// Readiness depends on a party outside the deployment
    pub awaits_external: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedPartition {
    pub region: Region,
    pub nodes: Vec<PlannedNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedEdge {
    pub consumer: String,
    pub consumer_region: Region,
    pub dependency: String,
    pub dependency_region: Region,
}

/// Dry-run view of a deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentPlan {
    pub stack_name: String,
    pub project_domain: DomainName,
    pub partitions: Vec<PlannedPartition>,
    /// Dependencies first
    pub apply_order: Vec<String>,
    pub cross_region_edges: Vec<PlannedEdge>,
}

/// Values surfaced to the operator after an apply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentOutputs {
    pub www_bucket_name: Option<String>,
    pub sub_hosted_zone_id: Option<String>,
    pub www_distribution_id: Option<String>,
    pub project_domain_name: Option<String>,
}

impl DeploymentOutputs {
    /// Read outputs of the Ready nodes; missing ones stay `None`
    pub fn collect(deployment: &Deployment) -> Self {
        let scalar = |node: &str, output: &str| {
            deployment
                .outputs_of(node)
                .and_then(|o| o.scalar(output))
                .map(str::to_string)
        };
        Self {
            www_bucket_name: scalar(names::WWW_BUCKET, outputs::BUCKET_NAME),
            sub_hosted_zone_id: scalar(names::SUB_HOSTED_ZONE, outputs::HOSTED_ZONE_ID),
            www_distribution_id: scalar(names::DISTRIBUTION, outputs::DISTRIBUTION_ID),
            project_domain_name: scalar(names::DNS_RECORD, outputs::RECORD_FQDN),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.www_bucket_name.is_some()
            && self.sub_hosted_zone_id.is_some()
            && self.www_distribution_id.is_some()
            && self.project_domain_name.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        CDN_REGION, DNS_RECORD_NAME, DOMAIN_NAME, HOME_REGION, PARENT_ZONE_ROLE, STACK_NAME,
    };
    use crate::errors::ProvisioningError;
    use crate::graph::EdgeKind;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn blueprint(extra: &[(&str, &str)]) -> DistributionBlueprint {
        let mut env: HashMap<&str, &str> = [
            (STACK_NAME, "docs"),
            (DOMAIN_NAME, "example.com"),
            (PARENT_ZONE_ROLE, "arn:aws:iam::222222222222:role/ZoneEditor"),
            (HOME_REGION, "eu-west-1"),
            (CDN_REGION, "us-east-1"),
        ]
        .into_iter()
        .collect();
        env.extend(extra.iter().copied());
        let config =
            DeploymentConfig::from_lookup(|name| env.get(name).map(|v| v.to_string())).unwrap();
        DistributionBlueprint::new(config)
    }

    #[test]
    fn test_graph_has_six_named_nodes() {
        let graph = blueprint(&[]).graph().unwrap();
        assert_eq!(graph.len(), 6);
        for name in [
            names::WWW_BUCKET,
            names::SUB_HOSTED_ZONE,
            names::DELEGATION,
            names::CERTIFICATE,
            names::DISTRIBUTION,
            names::DNS_RECORD,
        ] {
            assert!(graph.find(name).is_some(), "{}", name);
        }
    }

    #[test]
    fn test_certificate_gates_distribution() {
        let graph = blueprint(&[]).graph().unwrap();
        let distribution = graph.find(names::DISTRIBUTION).unwrap();
        let certificate = graph.find(names::CERTIFICATE).unwrap();
        assert!(graph
            .dependencies_of(distribution)
            .any(|e| e.to == certificate && e.kind == EdgeKind::ValidationGate));
    }

    #[test]
    fn test_placement() {
        let partitioned = blueprint(&[]).partition().unwrap();
        let graph = partitioned.graph();
        let region_of = |name: &str| {
            partitioned
                .region_of(graph.find(name).unwrap())
                .map(|r| r.as_str().to_string())
        };

        assert_eq!(region_of(names::WWW_BUCKET).as_deref(), Some("eu-west-1"));
        assert_eq!(region_of(names::CERTIFICATE).as_deref(), Some("us-east-1"));
        assert_eq!(region_of(names::DISTRIBUTION).as_deref(), Some("us-east-1"));
        assert_eq!(region_of(names::DNS_RECORD).as_deref(), Some("us-east-1"));
        assert_eq!(region_of(names::SUB_HOSTED_ZONE).as_deref(), Some("us-east-1"));
        assert_eq!(region_of(names::DELEGATION).as_deref(), Some("us-east-1"));
    }

    #[test]
    fn test_plan_lists_bucket_reference_as_cross_region() {
        let plan = blueprint(&[]).plan().unwrap();
        assert_eq!(plan.project_domain.as_str(), "docs.example.com");
        assert_eq!(plan.partitions.len(), 2);
        assert_eq!(plan.cross_region_edges.len(), 1);
        let edge = &plan.cross_region_edges[0];
        assert_eq!(edge.consumer, names::DISTRIBUTION);
        assert_eq!(edge.dependency, names::WWW_BUCKET);

        let position = |name: &str| plan.apply_order.iter().position(|n| n == name).unwrap();
        assert!(position(names::WWW_BUCKET) < position(names::DISTRIBUTION));
        assert!(position(names::CERTIFICATE) < position(names::DISTRIBUTION));
        assert!(position(names::DELEGATION) < position(names::CERTIFICATE));
    }

    #[test]
    fn test_plan_serializes() {
        let json = serde_json::to_value(blueprint(&[]).plan().unwrap()).unwrap();
        assert_eq!(json["apply_order"].as_array().map(Vec::len), Some(6));
        assert_eq!(json["cross_region_edges"][0]["dependency_region"], "eu-west-1");
    }

    #[test]
    fn test_record_name_sets_alias() {
        let graph = blueprint(&[(DNS_RECORD_NAME, "www")]).graph().unwrap();
        let certificate = graph.node(graph.find(names::CERTIFICATE).unwrap()).unwrap();
        match &certificate.attributes {
            ResourceAttributes::Certificate(attrs) => {
                assert_eq!(attrs.domain_name.as_str(), "www.docs.example.com")
            }
            other => panic!("unexpected attributes {:?}", other),
        }
    }

    #[test]
    fn test_invalid_record_name_rejected() {
        let result = blueprint(&[(DNS_RECORD_NAME, "bad_label!")]).graph();
        assert!(matches!(result, Err(ProvisioningError::Invariant(_))));
    }

    #[test]
    fn test_outputs_empty_before_apply() {
        let deployment = blueprint(&[]).deployment().unwrap();
        let outputs = DeploymentOutputs::collect(&deployment);
        assert_eq!(outputs, DeploymentOutputs::default());
        assert!(!outputs.is_complete());
    }
}
