use crate::{Error, NodeRoles};
use commatrix_core::{ComDetail, ComMatrix, Direction};
use commatrix_k8s_api::{self as k8s, Labels, ResourceExt};
use tracing::{debug, instrument};

/// Protocol assumed for ports that do not declare one.
const DEFAULT_PROTOCOL: &str = "TCP";

/// Builds the inferred communication matrix from the selected EndpointSlices.
///
/// Each endpoint of a slice yields one row carrying all of the slice's ports; the rows are then
/// deduplicated so that each `(nodeRole, port, protocol)` appears once. Endpoints on nodes
/// without a role produce rows with an empty role.
#[instrument(skip_all)]
pub fn build<'a>(
    slices: impl IntoIterator<Item = &'a k8s::EndpointSlice>,
    roles: &NodeRoles,
) -> Result<ComMatrix, Error> {
    let mut rows = Vec::new();
    let mut count = 0;
    for slice in slices {
        count += 1;
        rows.extend(slice_rows(slice, roles));
    }
    if count == 0 {
        return Err(Error::NoInput);
    }

    let matrix = ComMatrix::new(rows);
    debug!(slices = count, rows = matrix.len(), "Built matrix");
    Ok(matrix)
}

fn slice_rows<'a>(
    slice: &'a k8s::EndpointSlice,
    roles: &'a NodeRoles,
) -> impl Iterator<Item = ComDetail> + 'a {
    let labels = Labels::from(slice.metadata.labels.clone());
    let required = !labels.contains_key(k8s::OPTIONAL_LABEL);
    let service_name = service_name(slice, &labels);

    let (ports, protocols): (Vec<_>, Vec<_>) = slice
        .ports
        .iter()
        .flatten()
        .filter_map(|p| {
            let port = p.port?;
            let protocol = p.protocol.as_deref().unwrap_or(DEFAULT_PROTOCOL);
            Some((port.to_string(), protocol.to_string()))
        })
        .unzip();
    let port = ports.join(",");
    let protocol = protocols.join(",");

    slice.endpoints.iter().map(move |ep| ComDetail {
        direction: Direction::Ingress,
        protocol: protocol.clone(),
        port: port.clone(),
        node_role: ep
            .node_name
            .as_deref()
            .map(|n| roles.label(n))
            .unwrap_or_default()
            .to_string(),
        service_name: service_name.clone(),
        required,
    })
}

/// Names the service behind a slice: the service-name label when set, otherwise the names of
/// the slice's owners.
fn service_name(slice: &k8s::EndpointSlice, labels: &Labels) -> String {
    match labels.get(k8s::SERVICE_NAME_LABEL) {
        Some(name) => name.to_string(),
        None => slice
            .owner_references()
            .iter()
            .map(|o| o.name.as_str())
            .collect::<Vec<_>>()
            .join(","),
    }
}
