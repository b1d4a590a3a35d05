use crate::types::Table;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writes tables as JSON Lines files, one file per table
pub struct TableWriter {
    output_dir: PathBuf,
}

impl TableWriter {
    /// Create a writer rooted at `output_dir`, creating the directory
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Result<Self> {
        std::fs::create_dir_all(&output_dir).context("Failed to create output directory")?;

        Ok(TableWriter {
            output_dir: output_dir.as_ref().to_path_buf(),
        })
    }

    /// Write `table` to `<output_dir>/<table name>.jsonl`, replacing any old file
    pub fn write_table(&self, table: &Table) -> Result<PathBuf> {
        let path = self.output_dir.join(format!("{}.jsonl", table.name));
        let file = File::create(&path).with_context(|| format!("Failed to open file: {}", path.display()))?;

        let mut writer = BufWriter::new(file);
        write_rows(&mut writer, table)?;
        writer.flush().context("Failed to flush writer")?;

        Ok(path)
    }
}

/// Write every row of `table` as one JSON object per line
pub fn write_rows<W: Write>(writer: &mut W, table: &Table) -> Result<()> {
    for idx in 0..table.len() {
        if let Some(row) = table.row_view(idx) {
            let json = serde_json::to_string(&row).context("Failed to serialize row")?;
            writeln!(writer, "{}", json).context("Failed to write row")?;
        }
    }
    Ok(())
}
