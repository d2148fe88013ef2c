//! Communication matrix inference from cluster topology.
//!
//! The ingress-relevant part of a cluster is found by selecting over its EndpointSlices:
//!
//! ```text
//! [ Node ] <- [ EndpointSlice ] -> [ Pod ]
//!                   |
//!                   v
//!              [ Service ]
//! ```
//!
//! Each EndpointSlice references the pods that back it and the nodes those pods run on, and is
//! owned by a Service. An [`EndpointSliceQuery`] selects slices that are explicitly labeled,
//! backed by a host-network pod, or owned by a Service of an exposed type. The selected slices
//! are turned into matrix rows by [`build`], resolving each endpoint's node to a role with
//! [`NodeRoles`].

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod host_services;
mod matrix;
pub mod query;
mod roles;


pub use self::{
    host_services::host_service_slices,
    matrix::build,
    query::{ingress_query, EndpointSliceQuery, Predicate, QueryBuilder},
    roles::NodeRoles,
};
use std::num::ParseIntError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no EndpointSlices to build a matrix from")]
    NoInput,

    #[error("invalid port {port:?} for service {service}: {source}")]
    InvalidPort {
        service: String,
        port: String,
        #[source]
        source: ParseIntError,
    },

    #[error("no node has the {0:?} role")]
    UnknownRole(String),
}
