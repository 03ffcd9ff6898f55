use anyhow::Result;
use polars::prelude::*;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use super::sheet_reader::SheetReader;
use super::store_merger::merge_frames;
use crate::config::{MigrationConfig, StoreConfig};
use crate::models::SaleKind;
use crate::models::columns::{ARQUIVO, DDD_PADRAO, LOJA_ORIGEM, TIPO};
use crate::models::frame::set_constant_column;
use crate::processor::FieldClassifier;
use crate::report::{DiagnosticLog, IssueKind, RowRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    Customers,
    Sales,
}

impl Dataset {
    pub fn label(&self) -> &'static str {
        match self {
            Dataset::Customers => "clientes",
            Dataset::Sales => "vendas",
        }
    }
}

/// A legacy file and the store it was exported from.
#[derive(Debug, Clone)]
pub struct SourceFile<'a> {
    pub store: &'a StoreConfig,
    pub path: PathBuf,
    pub kind: Option<SaleKind>,
}

#[derive(Debug)]
pub struct LoadedDataset {
    pub frame: DataFrame,
    pub files_read: usize,
    pub files_failed: usize,
}

/// Reads the configured files of every store. Each file is mapped to the
/// canonical columns on its own, so stores with different headers line up
/// before they are merged.
pub struct SourceLoader<'a> {
    config: &'a MigrationConfig,
    reader: SheetReader,
    classifier: FieldClassifier,
}

impl<'a> SourceLoader<'a> {
    pub fn new(config: &'a MigrationConfig) -> Self {
        Self {
            config,
            reader: SheetReader::new(config.input.separator, config.input.sheet.clone()),
            classifier: FieldClassifier::new(),
        }
    }

    pub fn sources(&self, dataset: Dataset) -> Vec<SourceFile<'a>> {
        let mut sources = Vec::new();
        for store in &self.config.stores {
            match dataset {
                Dataset::Customers => {
                    for path in &store.clientes {
                        sources.push(SourceFile {
                            store,
                            path: self.config.resolve_path(path),
                            kind: None,
                        });
                    }
                }
                Dataset::Sales => {
                    for path in &store.vendas {
                        sources.push(SourceFile {
                            store,
                            path: self.config.resolve_path(path),
                            kind: Some(SaleKind::Venda),
                        });
                    }
                    for path in &store.ordens_servico {
                        sources.push(SourceFile {
                            store,
                            path: self.config.resolve_path(path),
                            kind: Some(SaleKind::OrdemServico),
                        });
                    }
                }
            }
        }
        sources
    }

    /// Reads every file of the dataset and merges them. A file that cannot be
    /// read is reported and skipped; the remaining files still load.
    pub fn load(&self, dataset: Dataset, log: &mut DiagnosticLog) -> Result<LoadedDataset> {
        let sources = self.sources(dataset);
        if sources.is_empty() {
            warn!("No {} files configured", dataset.label());
        }

        let mut frames = Vec::with_capacity(sources.len());
        let mut files_failed = 0;

        for source in &sources {
            info!(
                "Loading {} for store {}: {}",
                dataset.label(),
                source.store.code,
                source.path.display()
            );

            match self.load_source(source) {
                Ok(df) => frames.push(df),
                Err(e) => {
                    error!("Failed to load {}: {:#}", source.path.display(), e);
                    log.record(
                        &RowRef::new(source.path.display().to_string(), None),
                        "arquivo",
                        &source.path.display().to_string(),
                        IssueKind::UnreadableFile,
                        format!("{:#}", e),
                    );
                    files_failed += 1;
                }
            }
        }

        let files_read = frames.len();
        let frame = merge_frames(frames)?;
        info!(
            "Loaded {} {} rows from {} files ({} failed)",
            frame.height(),
            dataset.label(),
            files_read,
            files_failed
        );

        Ok(LoadedDataset {
            frame,
            files_read,
            files_failed,
        })
    }

    pub fn load_source(&self, source: &SourceFile) -> Result<DataFrame> {
        let mut df = self.reader.read(&source.path)?;
        let label = self.display_path(&source.path);

        for (from, to) in self.classifier.map_to_canonical_schema(&mut df)? {
            debug!("{}: '{}' -> {}", label, from, to);
        }

        set_constant_column(&mut df, ARQUIVO, Some(&label))?;
        set_constant_column(&mut df, LOJA_ORIGEM, Some(&source.store.code))?;
        set_constant_column(&mut df, DDD_PADRAO, source.store.ddd.as_deref())?;
        if let Some(kind) = source.kind {
            set_constant_column(&mut df, TIPO, Some(kind.as_str()))?;
        }

        Ok(df)
    }

    /// Path relative to the config directory, for readable reports.
    fn display_path(&self, path: &std::path::Path) -> String {
        path.strip_prefix(&self.config.base_dir)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::columns::{CPF, NOME};
    use crate::models::frame::string_values;
    use uuid::Uuid;

    fn config(base: &std::path::Path) -> MigrationConfig {
        let toml = r#"
            [channels]
            catalog = "canais.toml"

            [[stores]]
            code = "centro"
            name = "Loja Centro"
            id = "6f1c2a9e-3b4d-4c1a-9e2f-000000000001"
            ddd = "11"
            clientes = ["centro.csv", "faltando.csv"]
            vendas = ["vendas.csv"]
            ordens_servico = ["os.csv"]

            [[stores]]
            code = "norte"
            name = "Loja Norte"
            id = "6f1c2a9e-3b4d-4c1a-9e2f-000000000002"
            clientes = ["norte.csv"]
        "#;
        MigrationConfig::from_toml_str(toml, base).unwrap()
    }

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("source_loader_{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_sources_per_dataset() {
        let base = temp_dir();
        let config = config(&base);
        let loader = SourceLoader::new(&config);

        let customers = loader.sources(Dataset::Customers);
        assert_eq!(customers.len(), 3);
        assert_eq!(customers[2].store.code, "norte");

        let sales = loader.sources(Dataset::Sales);
        assert_eq!(sales.len(), 2);
        assert_eq!(sales[0].kind, Some(SaleKind::Venda));
        assert_eq!(sales[1].kind, Some(SaleKind::OrdemServico));
        assert_eq!(sales[1].path, base.join("os.csv"));
    }

    #[test]
    fn test_load_aligns_headers_and_skips_unreadable_files() {
        let base = temp_dir();
        std::fs::write(base.join("centro.csv"), "Nome;CPF\nMaria;52998224725\n").unwrap();
        std::fs::write(base.join("norte.csv"), "cliente;nr cpf\nAna;39053344705\n").unwrap();
        let config = config(&base);

        let mut log = DiagnosticLog::new();
        let loaded = SourceLoader::new(&config)
            .load(Dataset::Customers, &mut log)
            .unwrap();

        assert_eq!(loaded.files_read, 2);
        assert_eq!(loaded.files_failed, 1);
        assert_eq!(log.count(IssueKind::UnreadableFile), 1);

        let df = loaded.frame;
        assert_eq!(df.height(), 2);
        assert_eq!(
            string_values(&df, NOME).unwrap(),
            vec![Some("Maria".to_string()), Some("Ana".to_string())]
        );
        assert_eq!(
            string_values(&df, CPF).unwrap()[1].as_deref(),
            Some("39053344705")
        );
        assert_eq!(
            string_values(&df, LOJA_ORIGEM).unwrap(),
            vec![Some("centro".to_string()), Some("norte".to_string())]
        );
        assert_eq!(
            string_values(&df, ARQUIVO).unwrap()[0].as_deref(),
            Some("centro.csv")
        );
        // The northern store has no default area code
        assert_eq!(string_values(&df, DDD_PADRAO).unwrap()[1], None);
    }
}
