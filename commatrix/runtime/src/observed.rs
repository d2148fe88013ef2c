//! Builds the observed matrix from per-node `ss` dumps.
//!
//! Dumps are collected out of band (e.g. by running `ss -anplt` and `ss -anplu` through a
//! debug pod on each node) and stored in a single directory as `<node>-tcp.txt` and
//! `<node>-udp.txt`.

use crate::{
    core::{ss, ComMatrix, Protocol},
    index::NodeRoles,
};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub(crate) async fn load<'n>(
    dir: &Path,
    nodes: impl IntoIterator<Item = &'n str>,
    roles: &NodeRoles,
) -> Result<ComMatrix> {
    let mut rows = Vec::new();
    for node in nodes {
        let role = roles.label(node);
        if role.is_empty() {
            warn!(%node, "Node has no role; its sockets are reported without one");
        }

        for protocol in [Protocol::Tcp, Protocol::Udp] {
            let path = dump_path(dir, node, protocol);
            let output = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let parsed = ss::parse(&output, role, protocol);
            debug!(%node, %protocol, rows = parsed.len(), "Parsed socket dump");
            rows.extend(parsed);
        }
    }

    Ok(ComMatrix::new(rows))
}

fn dump_path(dir: &Path, node: &str, protocol: Protocol) -> PathBuf {
    let suffix = match protocol {
        Protocol::Tcp => "tcp",
        Protocol::Udp => "udp",
    };
    dir.join(format!("{node}-{suffix}.txt"))
}
