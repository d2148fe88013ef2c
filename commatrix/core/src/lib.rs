//! Communication matrix model.
//!
//! A communication matrix enumerates the `(node role, protocol, port, service)` tuples that a
//! cluster's ingress traffic depends on. Matrices are produced from two independent sources:
//!
//! - the *inferred* matrix is derived from cluster topology (EndpointSlices and the services,
//!   pods and nodes behind them);
//! - the *observed* matrix is parsed from the socket-listening dumps (`ss`) taken on each node.
//!
//! Both views share the [`ComDetail`] row shape and are always held in deduplicated form by
//! [`ComMatrix`], so that they can be reconciled with [`diff`].

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod diff;
mod matrix;
pub mod ss;

pub use self::{
    diff::{diff, Diff, DiffKey},
    matrix::{dedup, ComDetail, ComMatrix, Direction, InvalidProtocol, NodeRole, Protocol},
};
