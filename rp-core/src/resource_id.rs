//! Canonical hierarchical resource identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// The provider namespace every resource in this repository's scope lives under.
pub const PROVIDER_NAMESPACE: &str = "microsoft.redhatopenshift";

/// The resource type segment used for the cluster kind, lowercased.
///
/// [`ResourceId::cluster_id`] and [`ResourceId::is_cluster`] key off this constant, so it
/// must stay in sync with [`crate::entities::hcp_cluster`]'s resource type string.
pub const CLUSTER_RESOURCE_TYPE: &str = "hcpopenshiftclusters";

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("resource id must start with /subscriptions/<id>")]
    MissingSubscription,
    #[error("invalid subscription id: {0}")]
    InvalidSubscriptionId(#[from] uuid::Error),
    #[error("resource id has a dangling type segment with no name")]
    DanglingTypeSegment,
    #[error("resource id is missing a provider namespace")]
    MissingProviderNamespace,
    #[error("resource id has no type/name segments after the provider namespace")]
    EmptyTypeChain,
}

/// Canonical hierarchical identifier for a resource.
///
/// The lowercase string form (produced by [`Display`](fmt::Display)) is the unique
/// cache and store key for every component in this crate: two `ResourceId`s compare
/// equal iff their lowercase rendering is identical, regardless of the casing used to
/// construct them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceId {
    subscription: Uuid,
    resource_group: Option<String>,
    provider_namespace: String,
    /// (resource type, resource name) pairs, root to leaf.
    type_chain: Vec<(String, String)>,
}

impl ResourceId {
    /// Build a resource-group-scoped id, e.g. a cluster or a service provider cluster.
    #[must_use]
    pub fn new(
        subscription: Uuid,
        resource_group: impl Into<String>,
        provider_namespace: impl Into<String>,
        type_chain: Vec<(String, String)>,
    ) -> Self {
        Self {
            subscription,
            resource_group: Some(resource_group.into().to_lowercase()),
            provider_namespace: provider_namespace.into().to_lowercase(),
            type_chain: lowercase_chain(type_chain),
        }
    }

    /// Build a subscription-scoped id with no resource group, e.g. a `DnsReservation`.
    #[must_use]
    pub fn new_subscription_scoped(
        subscription: Uuid,
        provider_namespace: impl Into<String>,
        type_chain: Vec<(String, String)>,
    ) -> Self {
        Self {
            subscription,
            resource_group: None,
            provider_namespace: provider_namespace.into().to_lowercase(),
            type_chain: lowercase_chain(type_chain),
        }
    }

    /// Build the id of the subscription resource itself.
    #[must_use]
    pub fn subscription_root(subscription: Uuid) -> Self {
        Self {
            subscription,
            resource_group: None,
            provider_namespace: String::new(),
            type_chain: Vec::new(),
        }
    }

    #[must_use]
    pub fn subscription_id(&self) -> Uuid {
        self.subscription
    }

    #[must_use]
    pub fn resource_group(&self) -> Option<&str> {
        self.resource_group.as_deref()
    }

    #[must_use]
    pub fn provider_namespace(&self) -> &str {
        &self.provider_namespace
    }

    /// The name of the leaf segment, or `None` for a bare subscription id.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.type_chain.last().map(|(_, name)| name.as_str())
    }

    /// The resource type of the leaf segment, or `None` for a bare subscription id.
    #[must_use]
    pub fn resource_type(&self) -> Option<&str> {
        self.type_chain.last().map(|(ty, _)| ty.as_str())
    }

    /// The id of the owning parent, obtained by dropping the leaf type/name segment.
    ///
    /// Returns `None` if this id has no parent (a bare subscription, or a
    /// resource-group-less root).
    #[must_use]
    pub fn parent(&self) -> Option<ResourceId> {
        if self.type_chain.len() > 1 {
            let mut chain = self.type_chain.clone();
            chain.pop();
            Some(Self {
                subscription: self.subscription,
                resource_group: self.resource_group.clone(),
                provider_namespace: self.provider_namespace.clone(),
                type_chain: chain,
            })
        } else if self.resource_group.is_some() && !self.type_chain.is_empty() {
            Some(Self {
                subscription: self.subscription,
                resource_group: self.resource_group.clone(),
                provider_namespace: String::new(),
                type_chain: Vec::new(),
            })
        } else {
            None
        }
    }

    /// True if the leaf segment's resource type is the cluster type.
    #[must_use]
    pub fn is_cluster(&self) -> bool {
        self.resource_type() == Some(CLUSTER_RESOURCE_TYPE)
    }

    /// True if this id sits inside a resource group.
    #[must_use]
    pub fn is_in_resource_group(&self) -> bool {
        self.resource_group.is_some()
    }

    /// True if this id's provider namespace matches the framework's provider namespace.
    #[must_use]
    pub fn is_in_provider_namespace(&self) -> bool {
        self.provider_namespace == PROVIDER_NAMESPACE
    }

    /// Walk up the type chain to the id of the owning cluster, if any segment is one.
    #[must_use]
    pub fn cluster_id(&self) -> Option<ResourceId> {
        let pos = self
            .type_chain
            .iter()
            .position(|(ty, _)| ty == CLUSTER_RESOURCE_TYPE)?;
        Some(Self {
            subscription: self.subscription,
            resource_group: self.resource_group.clone(),
            provider_namespace: self.provider_namespace.clone(),
            type_chain: self.type_chain[..=pos].to_vec(),
        })
    }

    /// Append a child type/name segment, returning the child's id.
    #[must_use]
    pub fn child(&self, resource_type: impl Into<String>, name: impl Into<String>) -> ResourceId {
        let mut chain = self.type_chain.clone();
        chain.push((resource_type.into().to_lowercase(), name.into().to_lowercase()));
        Self {
            subscription: self.subscription,
            resource_group: self.resource_group.clone(),
            provider_namespace: self.provider_namespace.clone(),
            type_chain: chain,
        }
    }
}

fn lowercase_chain(chain: Vec<(String, String)>) -> Vec<(String, String)> {
    chain
        .into_iter()
        .map(|(ty, name)| (ty.to_lowercase(), name.to_lowercase()))
        .collect()
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/subscriptions/{}", self.subscription)?;
        if let Some(rg) = &self.resource_group {
            write!(f, "/resourcegroups/{rg}")?;
        }
        if !self.provider_namespace.is_empty() {
            write!(f, "/providers/{}", self.provider_namespace)?;
            for (ty, name) in &self.type_chain {
                write!(f, "/{ty}/{name}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for ResourceId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        let mut segments = lower.split('/').filter(|s| !s.is_empty());

        if segments.next() != Some("subscriptions") {
            return Err(ParseError::MissingSubscription);
        }
        let subscription: Uuid = segments
            .next()
            .ok_or(ParseError::MissingSubscription)?
            .parse()?;

        let mut resource_group = None;
        let mut next = segments.next();
        if next == Some("resourcegroups") {
            resource_group = Some(segments.next().ok_or(ParseError::DanglingTypeSegment)?.to_string());
            next = segments.next();
        }

        let Some(providers_tok) = next else {
            return Ok(Self {
                subscription,
                resource_group,
                provider_namespace: String::new(),
                type_chain: Vec::new(),
            });
        };
        if providers_tok != "providers" {
            return Err(ParseError::MissingProviderNamespace);
        }
        let provider_namespace = segments
            .next()
            .ok_or(ParseError::MissingProviderNamespace)?
            .to_string();

        let rest: Vec<&str> = segments.collect();
        if rest.is_empty() {
            return Err(ParseError::EmptyTypeChain);
        }
        if rest.len() % 2 != 0 {
            return Err(ParseError::DanglingTypeSegment);
        }
        let type_chain = rest
            .chunks(2)
            .map(|pair| (pair[0].to_string(), pair[1].to_string()))
            .collect();

        Ok(Self {
            subscription,
            resource_group,
            provider_namespace,
            type_chain,
        })
    }
}

impl PartialEq for ResourceId {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}
impl Eq for ResourceId {}

impl std::hash::Hash for ResourceId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.to_string().hash(state);
    }
}

impl Ord for ResourceId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.to_string().cmp(&other.to_string())
    }
}
impl PartialOrd for ResourceId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub() -> Uuid {
        "11111111-1111-1111-1111-111111111111".parse().unwrap()
    }

    #[test]
    fn roundtrips_through_display_and_parse() {
        let id = ResourceId::new(
            sub(),
            "rg",
            "Microsoft.RedHatOpenShift",
            vec![("hcpOpenShiftClusters".into(), "C".into())],
        );
        let rendered = id.to_string();
        assert_eq!(rendered, format!("/subscriptions/{}/resourcegroups/rg/providers/microsoft.redhatopenshift/hcpopenshiftclusters/c", sub()));
        let reparsed: ResourceId = rendered.parse().unwrap();
        assert_eq!(reparsed, id);
    }

    #[test]
    fn equality_is_case_insensitive() {
        let a: ResourceId = format!(
            "/subscriptions/{}/resourceGroups/RG/providers/Microsoft.RedHatOpenShift/hcpOpenShiftClusters/C",
            sub()
        )
        .parse()
        .unwrap();
        let b: ResourceId = format!(
            "/subscriptions/{}/resourcegroups/rg/providers/microsoft.redhatopenshift/hcpopenshiftclusters/c",
            sub()
        )
        .parse()
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn parent_drops_the_leaf_segment() {
        let cluster = ResourceId::new(
            sub(),
            "rg",
            PROVIDER_NAMESPACE,
            vec![("hcpOpenShiftClusters".into(), "c".into())],
        );
        let spc = cluster.child("serviceProviderClusters", "default");
        assert_eq!(spc.parent().unwrap(), cluster);
        assert!(cluster.is_cluster());
        assert!(!spc.is_cluster());
    }

    #[test]
    fn cluster_id_walks_up_from_a_grandchild() {
        let cluster = ResourceId::new(
            sub(),
            "rg",
            PROVIDER_NAMESPACE,
            vec![("hcpOpenShiftClusters".into(), "c".into())],
        );
        let spc = cluster.child("serviceProviderClusters", "default");
        assert_eq!(spc.cluster_id().unwrap(), cluster);
    }

    #[test]
    fn subscription_scoped_id_has_no_resource_group() {
        let dns = ResourceId::new_subscription_scoped(
            sub(),
            PROVIDER_NAMESPACE,
            vec![("dnsReservations".into(), "api.abcd".into())],
        );
        assert!(!dns.is_in_resource_group());
        assert_eq!(dns.name(), Some("api.abcd"));
    }
}
