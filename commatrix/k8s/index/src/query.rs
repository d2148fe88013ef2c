//! Selection of ingress-relevant EndpointSlices.
//!
//! A query accumulates [`Predicate`]s and selects every EndpointSlice that satisfies *any* of
//! them. Predicates never exclude a slice that another predicate selected, so the selection is
//! the union of the slices matched by each predicate and does not depend on the order in which
//! predicates were added. A query with no predicates selects nothing.

use ahash::AHashMap as HashMap;
use commatrix_k8s_api::{self as k8s, Labels, ResourceExt, Selector, Snapshot};
use tracing::{debug, trace};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Predicate {
    /// The slice carries every label of the selector with an equal value.
    Labels(Selector),

    /// At least one endpoint targets a pod that uses the host network.
    HostNetwork,

    /// At least one owner reference resolves to a Service of the given type.
    ServiceType(String),
}

/// Chainable construction of an EndpointSlice selection.
pub trait QueryBuilder: Sized {
    fn with_predicate(self, predicate: Predicate) -> Self;

    fn with_labels(self, labels: impl IntoIterator<Item = (String, String)>) -> Self {
        self.with_predicate(Predicate::Labels(labels.into_iter().collect()))
    }

    fn with_host_network(self) -> Self {
        self.with_predicate(Predicate::HostNetwork)
    }

    fn with_service_type(self, service_type: impl ToString) -> Self {
        self.with_predicate(Predicate::ServiceType(service_type.to_string()))
    }
}

/// Selects EndpointSlices out of a [`Snapshot`].
#[derive(Debug)]
pub struct EndpointSliceQuery<'s> {
    endpoint_slices: &'s [k8s::EndpointSlice],
    pods: HashMap<ResourceId<'s>, &'s k8s::Pod>,
    services: HashMap<ResourceId<'s>, &'s k8s::Service>,
    predicates: Vec<Predicate>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
struct ResourceId<'s> {
    namespace: &'s str,
    name: &'s str,
}

/// Builds the query selecting slices that carry ingress traffic: slices backed by host-network
/// pods, slices explicitly labeled `ingress`, and slices of NodePort or LoadBalancer services.
pub fn ingress_query(snapshot: &Snapshot) -> EndpointSliceQuery<'_> {
    EndpointSliceQuery::new(snapshot)
        .with_host_network()
        .with_labels(Some((k8s::INGRESS_LABEL.to_string(), String::new())))
        .with_service_type(k8s::SERVICE_TYPE_NODE_PORT)
        .with_service_type(k8s::SERVICE_TYPE_LOAD_BALANCER)
}

// === impl EndpointSliceQuery ===

impl<'s> EndpointSliceQuery<'s> {
    pub fn new(snapshot: &'s Snapshot) -> Self {
        let pods = snapshot
            .pods
            .iter()
            .filter_map(|pod| Some((ResourceId::of(&pod.metadata)?, pod)))
            .collect();
        let services = snapshot
            .services
            .iter()
            .filter_map(|svc| Some((ResourceId::of(&svc.metadata)?, svc)))
            .collect();

        Self {
            endpoint_slices: &snapshot.endpoint_slices,
            pods,
            services,
            predicates: Vec::new(),
        }
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Returns the selected slices in snapshot order.
    pub fn query(&self) -> Vec<&'s k8s::EndpointSlice> {
        let selected = self
            .endpoint_slices
            .iter()
            .filter(|slice| {
                let labels = Labels::from(slice.metadata.labels.clone());
                self.predicates
                    .iter()
                    .any(|p| self.matches(p, slice, &labels))
            })
            .collect::<Vec<_>>();
        debug!(
            total = self.endpoint_slices.len(),
            selected = selected.len(),
            predicates = self.predicates.len(),
            "Selected EndpointSlices"
        );
        selected
    }

    fn matches(
        &self,
        predicate: &Predicate,
        slice: &k8s::EndpointSlice,
        labels: &Labels,
    ) -> bool {
        let matched = match predicate {
            Predicate::Labels(selector) => selector.matches(labels),
            Predicate::HostNetwork => self.is_host_networked(slice),
            Predicate::ServiceType(t) => self.has_service_type(slice, t),
        };
        if matched {
            trace!(slice = %slice.name_any(), ?predicate, "Matched");
        }
        matched
    }

    fn is_host_networked(&self, slice: &k8s::EndpointSlice) -> bool {
        let slice_ns = slice.metadata.namespace.as_deref().unwrap_or_default();
        slice
            .endpoints
            .iter()
            .filter_map(|ep| {
                let target = ep.target_ref.as_ref()?;
                let id = ResourceId {
                    namespace: target.namespace.as_deref().unwrap_or(slice_ns),
                    name: target.name.as_deref()?,
                };
                self.pods.get(&id)
            })
            .any(|pod| {
                pod.spec
                    .as_ref()
                    .and_then(|spec| spec.host_network)
                    .unwrap_or(false)
            })
    }

    fn has_service_type(&self, slice: &k8s::EndpointSlice, service_type: &str) -> bool {
        let namespace = slice.metadata.namespace.as_deref().unwrap_or_default();
        slice
            .owner_references()
            .iter()
            .filter_map(|owner| {
                self.services.get(&ResourceId {
                    namespace,
                    name: &owner.name,
                })
            })
            .any(|svc| {
                svc.spec.as_ref().and_then(|spec| spec.type_.as_deref()) == Some(service_type)
            })
    }
}

impl QueryBuilder for EndpointSliceQuery<'_> {
    fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }
}

// === impl ResourceId ===

impl<'s> ResourceId<'s> {
    fn of(meta: &'s k8s::ObjectMeta) -> Option<Self> {
        Some(Self {
            namespace: meta.namespace.as_deref().unwrap_or_default(),
            name: meta.name.as_deref()?,
        })
    }
}
