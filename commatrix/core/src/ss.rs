//! Parses `ss` socket-listening dumps into matrix rows.
//!
//! Each dump holds one node's sockets for a single protocol, one socket per line, laid out as
//! six whitespace-separated columns:
//!
//! ```text
//! State  Recv-Q  Send-Q  Local-Address:Port  Peer-Address:Port  Process
//! LISTEN 0       128     *:22                *:*                users:(("sshd",pid=1,fd=3))
//! ```
//!
//! Lines that cannot be parsed are skipped so that a single corrupt line never hides the rest of
//! a node's sockets. Lines with any other number of columns are always skipped.

use crate::{ComDetail, Direction, Protocol};
use tracing::trace;

/// Substrings identifying sockets bound to a loopback address.
const LOOPBACK: &[&str] = &["127.0.0", "[::1]"];

/// `ss` reports UDP sockets as `UNCONN` or `ESTAB`; only the latter is treated as listening.
const TCP_LISTENING: &str = "LISTEN";
const UDP_LISTENING: &str = "ESTAB";

const FIELDS: usize = 6;
const LOCAL_ADDR_FIELD: usize = 3;
const PROCESS_FIELD: usize = 5;

/// Processes whose sockets never become rows, even when shared with other processes.
const SKIPPED_PROCESSES: &[&str] = &["rpc.statd"];

/// Processes whose ports are not required for the cluster to function.
const OPTIONAL_PROCESSES: &[&str] = &["rpcbind", "sshd"];

/// Converts a single node's `ss` output for `protocol` into ingress rows for `role`.
///
/// The returned rows are not deduplicated.
pub fn parse(output: &str, role: &str, protocol: Protocol) -> Vec<ComDetail> {
    output
        .lines()
        .filter_map(|line| parse_line(line, role, protocol))
        .collect()
}

fn parse_line(line: &str, role: &str, protocol: Protocol) -> Option<ComDetail> {
    if LOOPBACK.iter().any(|lo| line.contains(lo)) {
        trace!(%line, "Skipping loopback socket");
        return None;
    }

    let state = match protocol {
        Protocol::Tcp => TCP_LISTENING,
        Protocol::Udp => UDP_LISTENING,
    };
    if !line.contains(state) {
        return None;
    }

    let fields = line.split_whitespace().collect::<Vec<_>>();
    if fields.len() != FIELDS {
        trace!(%line, fields = fields.len(), "Skipping malformed line");
        return None;
    }

    let processes = quoted(fields[PROCESS_FIELD]);
    if processes.iter().any(|p| SKIPPED_PROCESSES.contains(p)) {
        trace!(?processes, "Skipping ignored process");
        return None;
    }
    let process = processes.join(",");

    let port = match fields[LOCAL_ADDR_FIELD].rsplit_once(':') {
        Some((_, port)) => port,
        None => fields[LOCAL_ADDR_FIELD],
    };

    Some(ComDetail {
        direction: Direction::Ingress,
        protocol: protocol.to_string(),
        port: port.to_string(),
        node_role: role.to_string(),
        required: !OPTIONAL_PROCESSES.contains(&process.as_str()),
        service_name: process,
    })
}

/// Returns every double-quoted substring of `s`, in order.
///
/// An unterminated trailing quote is ignored.
fn quoted(s: &str) -> Vec<&str> {
    let parts = s.split('"').collect::<Vec<_>>();
    // Odd segments sit between an opening and a closing quote; the last segment never does.
    parts
        .iter()
        .enumerate()
        .skip(1)
        .step_by(2)
        .filter(|(i, _)| *i + 1 < parts.len())
        .map(|(_, part)| *part)
        .collect()
}
