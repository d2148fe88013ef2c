//! Synthetic EndpointSlices for services that run directly on hosts.
//!
//! Host daemons (sshd, the kubelet, ...) listen on nodes without any Service or EndpointSlice
//! describing them. They can be declared as matrix rows and turned into EndpointSlices, which
//! are then selected like any other slice labeled for ingress.

use crate::{Error, NodeRoles};
use commatrix_core::ComDetail;
use commatrix_k8s_api::{self as k8s, ObjectMeta};
use std::num::NonZeroU16;
use tracing::debug;

const MANAGED_BY: &str = "commatrix";

/// Converts host service definitions into EndpointSlices in `namespace`.
///
/// Each definition yields a slice with a single port and a single endpoint on a node with the
/// definition's role. Fails on the first definition whose port is not a port number or whose
/// role no node has.
pub fn host_service_slices(
    details: &[ComDetail],
    roles: &NodeRoles,
    namespace: &str,
) -> Result<Vec<k8s::EndpointSlice>, Error> {
    details
        .iter()
        .map(|cd| host_service_slice(cd, roles, namespace))
        .collect()
}

fn host_service_slice(
    cd: &ComDetail,
    roles: &NodeRoles,
    namespace: &str,
) -> Result<k8s::EndpointSlice, Error> {
    let port = cd
        .port
        .trim()
        .parse::<NonZeroU16>()
        .map_err(|source| Error::InvalidPort {
            service: cd.service_name.clone(),
            port: cd.port.clone(),
            source,
        })?;
    let node = roles
        .node_with_role(&cd.node_role)
        .ok_or_else(|| Error::UnknownRole(cd.node_role.clone()))?;

    let name = format!("host-{}-{}-{}", cd.service_name, cd.node_role, port).to_lowercase();
    debug!(%name, %node, "Defining host service");

    let mut labels = maplit::btreemap! {
        k8s::INGRESS_LABEL.to_string() => String::new(),
        k8s::SERVICE_NAME_LABEL.to_string() => cd.service_name.clone(),
        k8s::MANAGED_BY_LABEL.to_string() => MANAGED_BY.to_string(),
    };
    if !cd.required {
        labels.insert(k8s::OPTIONAL_LABEL.to_string(), "true".to_string());
    }

    Ok(k8s::EndpointSlice {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        address_type: "IPv4".to_string(),
        ports: Some(vec![k8s::EndpointPort {
            port: Some(i32::from(port.get())),
            protocol: Some(cd.protocol.clone()),
            ..Default::default()
        }]),
        endpoints: vec![k8s::Endpoint {
            node_name: Some(node.to_string()),
            ..Default::default()
        }],
        ..Default::default()
    })
}
