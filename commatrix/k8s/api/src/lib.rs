#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod labels;
mod snapshot;

pub use self::{
    labels::{Labels, Selector},
    snapshot::{Error, Snapshot},
};
pub use k8s_openapi::{
    api::{
        self,
        core::v1::{Node, ObjectReference, Pod, PodSpec, Service, ServiceSpec},
        discovery::v1::{Endpoint, EndpointPort, EndpointSlice},
    },
    apimachinery::pkg::apis::meta::v1::OwnerReference,
};
pub use kube::{
    api::{ObjectMeta, ResourceExt},
    Client,
};

/// Label marking a node as a worker.
pub const WORKER_ROLE_LABEL: &str = "node-role.kubernetes.io/worker";

/// Labels marking a node as a master. Newer clusters use `control-plane`.
pub const MASTER_ROLE_LABELS: &[&str] = &[
    "node-role.kubernetes.io/master",
    "node-role.kubernetes.io/control-plane",
];

/// Label naming the Service that owns an EndpointSlice.
pub const SERVICE_NAME_LABEL: &str = "kubernetes.io/service-name";

/// Label naming the controller that manages an EndpointSlice.
pub const MANAGED_BY_LABEL: &str = "endpointslice.kubernetes.io/managed-by";

/// Label that explicitly marks an EndpointSlice as carrying ingress traffic.
pub const INGRESS_LABEL: &str = "ingress";

/// Label that marks an EndpointSlice's ports as optional.
pub const OPTIONAL_LABEL: &str = "optional";

pub const SERVICE_TYPE_NODE_PORT: &str = "NodePort";
pub const SERVICE_TYPE_LOAD_BALANCER: &str = "LoadBalancer";
