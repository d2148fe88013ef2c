use crate::{
    core::{diff, ComDetail, DiffKey},
    index::{self, NodeRoles},
    k8s::{ResourceExt, Snapshot},
    observed,
    output::{write_diff, write_matrix, Format},
};
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Namespace synthetic host-service EndpointSlices are placed in when no namespace is selected.
const DEFAULT_HOST_SERVICES_NAMESPACE: &str = "default";

#[derive(Debug, Parser)]
#[clap(
    name = "commatrix",
    version,
    about = "Derives a cluster's ingress communication matrix"
)]
pub struct Args {
    #[clap(long, default_value = "commatrix=info,warn", env = "COMMATRIX_LOG")]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain", env = "COMMATRIX_LOG_FORMAT")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    /// Only consider pods, services and EndpointSlices in this namespace.
    #[clap(long, short = 'n')]
    namespace: Option<String>,

    #[clap(long, value_enum, default_value = "table")]
    format: Format,

    /// JSON list of matrix rows describing services that listen directly on hosts.
    #[clap(long)]
    host_services: Option<PathBuf>,

    /// Directory holding `<node>-tcp.txt` and `<node>-udp.txt` socket dumps.
    ///
    /// When set, the matrix observed on the nodes is compared against the inferred one and the
    /// differences are printed instead of the matrix.
    #[clap(long)]
    ss_dir: Option<PathBuf>,

    /// Row identity used when comparing matrices.
    #[clap(long, value_enum, default_value = "composite")]
    diff_key: DiffKeyArg,

    /// Exit with an error when the inferred and observed matrices differ.
    #[clap(long, requires = "ss_dir")]
    fail_on_diff: bool,
}

#[derive(Copy, Clone, Debug, clap::ValueEnum)]
enum DiffKeyArg {
    /// Node role, port and protocol.
    Composite,

    /// Port only.
    Port,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    #[instrument(skip_all)]
    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            client,
            namespace,
            format,
            host_services,
            ss_dir,
            diff_key,
            fail_on_diff,
        } = self;

        log_format
            .try_init(log_level)
            .expect("must configure logging");

        let client = client.try_client().await?;
        let mut snapshot = Snapshot::fetch(&client, namespace.as_deref()).await?;
        let roles = NodeRoles::from_nodes(&snapshot.nodes);
        info!(nodes = snapshot.nodes.len(), roles = roles.len(), "Resolved node roles");

        if let Some(path) = host_services {
            let details = read_host_services(&path).await?;
            let ns = namespace
                .as_deref()
                .unwrap_or(DEFAULT_HOST_SERVICES_NAMESPACE);
            let slices = index::host_service_slices(&details, &roles, ns)?;
            debug!(count = slices.len(), "Adding host service EndpointSlices");
            snapshot.endpoint_slices.extend(slices);
        }

        let query = index::ingress_query(&snapshot);
        debug!(predicates = ?query.predicates(), "Selecting ingress EndpointSlices");
        let inferred = index::build(query.query(), &roles)?;
        info!(rows = inferred.len(), "Inferred matrix");

        let stdout = std::io::stdout();
        let Some(dir) = ss_dir else {
            return write_matrix(stdout.lock(), format, &inferred);
        };

        let nodes = snapshot.nodes.iter().map(|n| n.name_any()).collect::<Vec<_>>();
        let observed = observed::load(&dir, nodes.iter().map(String::as_str), &roles).await?;
        info!(rows = observed.len(), "Observed matrix");

        let diff = diff(&inferred, &observed, diff_key.into());
        write_diff(stdout.lock(), format, &diff)?;
        if diff.is_empty() {
            info!("Inferred and observed matrices match");
        } else {
            info!(
                only_inferred = diff.only_in_first.len(),
                only_observed = diff.only_in_second.len(),
                "Inferred and observed matrices differ"
            );
            if fail_on_diff {
                bail!("inferred and observed matrices differ");
            }
        }

        Ok(())
    }
}

async fn read_host_services(path: &Path) -> Result<Vec<ComDetail>> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("failed to parse {}", path.display()))
}

impl From<DiffKeyArg> for DiffKey {
    fn from(arg: DiffKeyArg) -> Self {
        match arg {
            DiffKeyArg::Composite => Self::Composite,
            DiffKeyArg::Port => Self::Port,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_defaults() {
        let args = Args::try_parse_from(["commatrix"]).unwrap();
        assert_eq!(args.format, Format::Table);
        assert!(matches!(args.diff_key, DiffKeyArg::Composite));
        assert!(args.ss_dir.is_none());
        assert!(!args.fail_on_diff);
    }

    #[test]
    fn parses_comparison() {
        let args = Args::try_parse_from([
            "commatrix",
            "--format",
            "csv",
            "--ss-dir",
            "/tmp/artifacts",
            "--diff-key",
            "port",
            "--fail-on-diff",
            "-n",
            "openshift-ingress",
        ])
        .unwrap();
        assert_eq!(args.format, Format::Csv);
        assert_eq!(args.ss_dir, Some(PathBuf::from("/tmp/artifacts")));
        assert_eq!(DiffKey::from(args.diff_key), DiffKey::Port);
        assert_eq!(args.namespace.as_deref(), Some("openshift-ingress"));
    }

    #[test]
    fn fail_on_diff_requires_dumps() {
        assert!(Args::try_parse_from(["commatrix", "--fail-on-diff"]).is_err());
    }

    #[tokio::test]
    async fn reads_host_services() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host-services.json");
        std::fs::write(
            &path,
            r#"[{"direction": "ingress", "protocol": "TCP", "port": "22",
                 "nodeRole": "master", "serviceName": "sshd", "required": "false"}]"#,
        )
        .unwrap();

        let details = read_host_services(&path).await.unwrap();
        assert_eq!(
            details,
            vec![ComDetail::ingress("TCP", "22", "master", "sshd", false)]
        );

        std::fs::write(&path, "{").unwrap();
        assert!(read_host_services(&path).await.is_err());
    }
}
