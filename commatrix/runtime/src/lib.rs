#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use commatrix_core as core;
pub use commatrix_k8s_api as k8s;
pub use commatrix_k8s_index as index;

mod args;
mod observed;
mod output;

pub use self::{
    args::Args,
    output::{write_diff, write_matrix, Format},
};
