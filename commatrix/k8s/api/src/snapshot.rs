use k8s_openapi::{
    api::{
        core::v1::{Node, Pod, Service},
        discovery::v1::EndpointSlice,
    },
    NamespaceResourceScope,
};
use kube::{
    api::{Api, ListParams},
    Client, Resource,
};
use std::fmt::Debug;
use tracing::{debug, instrument};

/// A point-in-time listing of the cluster resources a communication matrix is derived from.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub nodes: Vec<Node>,
    pub pods: Vec<Pod>,
    pub services: Vec<Service>,
    pub endpoint_slices: Vec<EndpointSlice>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to list {kind}: {source}")]
    List {
        kind: String,
        #[source]
        source: kube::Error,
    },
}

// === impl Snapshot ===

impl Snapshot {
    /// Lists nodes, and the pods, services and EndpointSlices in `namespace` (or in all
    /// namespaces when `None`).
    ///
    /// Any failure aborts the whole fetch; no partial snapshot is returned.
    #[instrument(skip(client))]
    pub async fn fetch(client: &Client, namespace: Option<&str>) -> Result<Self, Error> {
        let nodes = list(Api::<Node>::all(client.clone())).await?;
        let pods = list(scoped::<Pod>(client, namespace)).await?;
        let services = list(scoped::<Service>(client, namespace)).await?;
        let endpoint_slices = list(scoped::<EndpointSlice>(client, namespace)).await?;
        debug!(
            nodes = nodes.len(),
            pods = pods.len(),
            services = services.len(),
            endpoint_slices = endpoint_slices.len(),
            "Fetched snapshot"
        );

        Ok(Self {
            nodes,
            pods,
            services,
            endpoint_slices,
        })
    }
}

fn scoped<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope>,
    K::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

async fn list<K>(api: Api<K>) -> Result<Vec<K>, Error>
where
    K: Resource + Clone + Debug + serde::de::DeserializeOwned,
    K::DynamicType: Default,
{
    api.list(&ListParams::default())
        .await
        .map(|list| list.items)
        .map_err(|source| Error::List {
            kind: K::kind(&Default::default()).to_string(),
            source,
        })
}
