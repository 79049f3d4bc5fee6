mod csv;
mod dbml;
mod json;

use crate::types::Diagram;
use anyhow::Result;
use std::path::Path;

pub use self::csv::export_csv;
pub use dbml::export_dbml;
pub use json::export_json;

/// Export format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
    /// Raw DBML source of a single diagram
    Dbml,
}

/// Export diagrams to a file
pub fn export(diagrams: &[Diagram], format: ExportFormat, output_path: &Path) -> Result<()> {
    match format {
        ExportFormat::Csv => export_csv(diagrams, output_path),
        ExportFormat::Json => export_json(diagrams, output_path),
        ExportFormat::Dbml => match diagrams {
            [diagram] => export_dbml(diagram, output_path),
            _ => Err(anyhow::anyhow!(
                "DBML export needs exactly one diagram (got {})",
                diagrams.len()
            )),
        },
    }
}
