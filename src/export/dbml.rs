use crate::types::Diagram;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Write a diagram's DBML source as-is
pub fn export_dbml(diagram: &Diagram, output_path: &Path) -> Result<()> {
    fs::write(output_path, &diagram.dbml)
        .with_context(|| format!("Failed to write DBML file: {}", output_path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::tests::sample;

    #[test]
    fn writes_source_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.dbml");
        let diagram = sample("shop");
        export_dbml(&diagram, &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), diagram.dbml);
    }
}
