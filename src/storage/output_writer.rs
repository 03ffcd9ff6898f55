use anyhow::{Context, Result};
use chrono::Local;
use polars::prelude::*;
use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use crate::config::OutputFormat;

/// Writes the artifacts of one run into `<base>/<timestamp>_<id>/`.
pub struct OutputWriter {
    run_dir: PathBuf,
    format: OutputFormat,
}

impl OutputWriter {
    pub fn new(base_dir: &Path, format: OutputFormat) -> Result<Self> {
        let run_dir = base_dir.join(Self::generate_run_name());
        fs::create_dir_all(&run_dir)
            .with_context(|| format!("Failed to create output directory: {}", run_dir.display()))?;

        Ok(Self { run_dir, format })
    }

    fn generate_run_name() -> String {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let run_id = Uuid::new_v4().simple().to_string();
        format!("{}_{}", timestamp, &run_id[..8])
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Issue reports are always CSV so they open in a spreadsheet.
    pub fn write_csv(&self, name: &str, df: &mut DataFrame) -> Result<PathBuf> {
        let path = self.run_dir.join(format!("{}.csv", name));
        let mut file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;

        CsvWriter::new(&mut file)
            .include_header(true)
            .with_separator(b';')
            .finish(df)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!("Wrote {} rows to {}", df.height(), path.display());
        Ok(path)
    }

    pub fn write_frame(&self, name: &str, df: &mut DataFrame) -> Result<PathBuf> {
        match self.format {
            OutputFormat::Csv => self.write_csv(name, df),
            OutputFormat::Parquet => {
                let path = self.run_dir.join(format!("{}.parquet", name));
                let mut file = File::create(&path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;

                ParquetWriter::new(&mut file)
                    .finish(df)
                    .with_context(|| format!("Failed to write {}", path.display()))?;

                info!("Wrote {} rows to {}", df.height(), path.display());
                Ok(path)
            }
        }
    }

    pub fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf> {
        let path = self.run_dir.join(format!("{}.json", name));
        let content = serde_json::to_string_pretty(value).context("Failed to serialize report")?;
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;

        info!("Wrote {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_base() -> PathBuf {
        std::env::temp_dir().join(format!("output_writer_{}", Uuid::new_v4()))
    }

    #[test]
    fn test_run_directory_layout() {
        let base = temp_base();
        let writer = OutputWriter::new(&base, OutputFormat::Csv).unwrap();

        let name = writer.run_dir().file_name().unwrap().to_string_lossy().to_string();
        // 20240105_103200_1a2b3c4d
        assert_eq!(name.len(), 24);
        assert!(writer.run_dir().starts_with(&base));
        assert!(writer.run_dir().is_dir());
    }

    #[test]
    fn test_write_frames() {
        let mut df = DataFrame::new(vec![
            Series::new("cpf".into(), vec!["52998224725", "11144477735"]).into(),
            Series::new("valor_total".into(), vec![Some(10.5), None]).into(),
        ])
        .unwrap();

        let csv = OutputWriter::new(&temp_base(), OutputFormat::Csv).unwrap();
        let path = csv.write_frame("clientes", &mut df).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("cpf;valor_total\n"));
        assert!(content.contains("52998224725;10.5"));

        let parquet = OutputWriter::new(&temp_base(), OutputFormat::Parquet).unwrap();
        let path = parquet.write_frame("clientes", &mut df).unwrap();
        assert_eq!(path.extension().unwrap(), "parquet");
        assert!(fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn test_write_json() {
        let writer = OutputWriter::new(&temp_base(), OutputFormat::Csv).unwrap();
        let path = writer
            .write_json("summary", &serde_json::json!({ "clientes": 3 }))
            .unwrap();
        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("\"clientes\": 3"));
    }
}
