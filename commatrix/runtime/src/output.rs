use crate::core::{ComMatrix, Diff};
use anyhow::Result;
use comfy_table::{presets::NOTHING, Table};
use serde::Serialize;
use std::io::Write;

const HEADER: [&str; 6] = [
    "DIRECTION",
    "PROTOCOL",
    "PORT",
    "NODE-ROLE",
    "SERVICE",
    "REQUIRED",
];

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    /// Aligned columns.
    #[default]
    Table,

    /// One comma-separated row per line.
    Text,

    Json,

    Csv,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DiffReport<'a> {
    only_in_inferred: &'a ComMatrix,
    only_in_observed: &'a ComMatrix,
}

pub fn write_matrix<W: Write>(mut w: W, format: Format, matrix: &ComMatrix) -> Result<()> {
    match format {
        Format::Table => {
            if matrix.is_empty() {
                writeln!(w, "(0 rows)")?;
                return Ok(());
            }
            let mut table = Table::new();
            table.load_preset(NOTHING).set_header(HEADER);
            for cd in matrix {
                table.add_row([
                    cd.direction.to_string(),
                    cd.protocol.clone(),
                    cd.port.clone(),
                    cd.node_role.clone(),
                    cd.service_name.clone(),
                    cd.required.to_string(),
                ]);
            }
            writeln!(w, "{table}")?;
        }
        Format::Text => {
            for cd in matrix {
                writeln!(w, "{cd}")?;
            }
        }
        Format::Json => {
            serde_json::to_writer_pretty(&mut w, matrix)?;
            writeln!(w)?;
        }
        Format::Csv => {
            let mut csv = csv::Writer::from_writer(&mut w);
            for cd in matrix {
                csv.serialize(cd)?;
            }
            csv.flush()?;
        }
    }
    Ok(())
}

/// Writes the rows only found in the inferred matrix, then those only found on the nodes.
pub fn write_diff<W: Write>(mut w: W, format: Format, diff: &Diff) -> Result<()> {
    if format == Format::Json {
        let report = DiffReport {
            only_in_inferred: &diff.only_in_first,
            only_in_observed: &diff.only_in_second,
        };
        serde_json::to_writer_pretty(&mut w, &report)?;
        writeln!(w)?;
        return Ok(());
    }

    writeln!(
        w,
        "# Inferred but not listening on nodes ({})",
        diff.only_in_first.len()
    )?;
    write_matrix(&mut w, format, &diff.only_in_first)?;
    writeln!(
        w,
        "# Listening on nodes but not inferred ({})",
        diff.only_in_second.len()
    )?;
    write_matrix(&mut w, format, &diff.only_in_second)?;
    Ok(())
}
