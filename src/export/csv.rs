use crate::types::Diagram;
use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;

const HEADER: [&str; 8] = [
    "id",
    "name",
    "description",
    "dbml",
    "canvasState",
    "owner",
    "created",
    "updated",
];

/// Export diagrams to CSV; canvas state is written as its JSON text
pub fn export_csv(diagrams: &[Diagram], output_path: &Path) -> Result<()> {
    let mut file = File::create(output_path)
        .with_context(|| format!("Failed to create output file: {}", output_path.display()))?;

    let mut writer = csv::Writer::from_writer(&mut file);

    writer
        .write_record(HEADER)
        .context("Failed to write CSV header")?;

    for diagram in diagrams {
        let canvas_state = match &diagram.canvas_state {
            Some(value) => serde_json::to_string(value).context("Failed to serialize canvas state")?,
            None => String::new(),
        };
        let created = diagram.created.to_rfc3339();
        let updated = diagram.updated.to_rfc3339();
        writer
            .write_record([
                diagram.id.as_str(),
                diagram.name.as_str(),
                diagram.description.as_str(),
                diagram.dbml.as_str(),
                canvas_state.as_str(),
                diagram.owner.as_str(),
                created.as_str(),
                updated.as_str(),
            ])
            .context("Failed to write CSV row")?;
    }

    writer.flush().context("Failed to flush CSV writer")?;
    Ok(())
}
