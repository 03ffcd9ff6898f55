use anyhow::Result;
use chrono::{Local, NaiveDate, Utc};
use polars::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

use crate::config::{ChannelCatalog, MigrationConfig};
use crate::loader::{Dataset, SourceLoader};
use crate::models::{CustomerRecord, SaleRecord};
use crate::processor::{
    ChannelMapper, ConstraintValidator, CorrectionStats, Deduplicator, RuleNormalizer,
    StoreCorrector, StoreDirectory,
};
use crate::report::{DatasetSummary, DiagnosticLog, RunReport, UnmappedChannel};
use crate::storage::{OutputWriter, RecordSink};

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Only labels the report; the caller picks the sink.
    pub dry_run: bool,
    pub write_outputs: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            write_outputs: true,
        }
    }
}

struct PreparedDataset {
    frame: DataFrame,
    files_read: usize,
    stores: CorrectionStats,
}

/// Legacy customers and sales from every configured store, through
/// classification, cleaning, deduplication and constraint checks, into a
/// [`RecordSink`].
pub struct MigrationPipeline {
    config: MigrationConfig,
    catalog: ChannelCatalog,
    today: NaiveDate,
}

impl MigrationPipeline {
    pub fn new(config: MigrationConfig, catalog: ChannelCatalog) -> Self {
        Self {
            config,
            catalog,
            today: Local::now().date_naive(),
        }
    }

    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        let config = MigrationConfig::from_file(path)?;
        let catalog = ChannelCatalog::from_file(config.resolve_path(&config.channels.catalog))?;
        info!(
            "📋 Loaded config: {} stores, {} channels",
            config.stores.len(),
            catalog.canais.len()
        );
        Ok(Self::new(config, catalog))
    }

    /// Reference date for birth date and future date checks.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    pub fn catalog(&self) -> &ChannelCatalog {
        &self.catalog
    }

    fn prepare(
        &self,
        dataset: Dataset,
        directory: &StoreDirectory,
        mapper: Option<&ChannelMapper>,
        log: &mut DiagnosticLog,
    ) -> Result<PreparedDataset> {
        let loaded = SourceLoader::new(&self.config).load(dataset, log)?;
        let mut frame = loaded.frame;

        RuleNormalizer::new(self.config.input.pad_cpf_zeros)
            .with_today(self.today)
            .normalize_dataframe(&mut frame, log)?;

        let stores = StoreCorrector::new(directory).apply(&mut frame, log)?;

        if let Some(mapper) = mapper {
            mapper.map_dataframe(&mut frame, log)?;
        }

        Ok(PreparedDataset {
            frame,
            files_read: loaded.files_read,
            stores,
        })
    }

    pub async fn run(&self, sink: &dyn RecordSink, options: RunOptions) -> Result<RunReport> {
        let started_at = Utc::now();
        let mut log = DiagnosticLog::new();
        info!(
            "🚀 Starting migration ({})",
            if options.dry_run { "dry run" } else { "database import" }
        );

        let reference = sink.reference_data().await?;

        let mut catalog = self.catalog.clone();
        catalog.merge_database_channels(&reference.channels);
        let mapper = ChannelMapper::new(&catalog, self.config.channels.similarity_threshold);

        let mut directory = StoreDirectory::from_config(&self.config)?;
        directory.add_known_ids(reference.store_ids.iter().copied());

        let channel_ids: HashSet<_> = reference.channels.iter().map(|(id, _)| *id).collect();
        let validator = ConstraintValidator::new(reference.store_ids.clone(), channel_ids)
            .with_limits(&reference.column_limits);

        // Customers
        let customers_data = self.prepare(Dataset::Customers, &directory, Some(&mapper), &mut log)?;
        let canais_nao_mapeados = mapper.unmapped_values(&customers_data.frame)?;
        let customer_records = CustomerRecord::from_dataframe(&customers_data.frame)?;
        let customers_read = customer_records.len();

        let (deduped, dedup_stats) = Deduplicator::new().dedupe(customer_records, &mut log);
        let (customers, customer_outcome) = validator.validate_customers(deduped, &mut log);

        // Sales and service orders
        let sales_data = self.prepare(Dataset::Sales, &directory, None, &mut log)?;
        let sale_records = SaleRecord::from_dataframe(&sales_data.frame)?;
        let sales_read = sale_records.len();

        let mut known_cpfs = reference.existing_cpfs.clone();
        known_cpfs.extend(customers.iter().filter_map(|c| c.cpf.clone()));
        let (sales, sale_outcome) = validator.validate_sales(sale_records, &known_cpfs, &mut log);

        // Reports go out before the import so a failed import still leaves them
        let writer = if options.write_outputs {
            let base = self.config.resolve_path(&self.config.output.dir);
            Some(OutputWriter::new(&base, self.config.output.format)?)
        } else {
            None
        };
        if let Some(writer) = &writer {
            writer.write_frame("clientes", &mut CustomerRecord::to_dataframe(&customers)?)?;
            writer.write_frame("vendas", &mut SaleRecord::to_dataframe(&sales)?)?;
            writer.write_csv("issues", &mut log.to_dataframe()?)?;
            writer.write_csv(
                "canais_nao_mapeados",
                &mut UnmappedChannel::to_dataframe(&canais_nao_mapeados)?,
            )?;
        }

        let customer_import = sink.import_customers(&customers).await?;
        let sale_import = sink.import_sales(&sales, &customer_import.ids).await?;

        let report = RunReport {
            started_at,
            finished_at: Utc::now(),
            dry_run: options.dry_run,
            clientes: DatasetSummary {
                arquivos: customers_data.files_read,
                linhas_lidas: customers_read,
                validas: customer_outcome.accepted,
                rejeitadas: customer_outcome.rejected,
                importadas: customer_import.clientes.inserted,
                ja_existentes: customer_import.clientes.skipped,
            },
            deduplicacao: dedup_stats,
            telefones: customer_import.telefones,
            vendas: DatasetSummary {
                arquivos: sales_data.files_read,
                linhas_lidas: sales_read,
                validas: sale_outcome.accepted,
                rejeitadas: sale_outcome.rejected,
                importadas: sale_import.inserted,
                ja_existentes: sale_import.skipped,
            },
            lojas_corrigidas: customers_data.stores.corrected + sales_data.stores.corrected,
            issues: log.by_kind(),
            canais_nao_mapeados,
            output_dir: writer.as_ref().map(|w| w.run_dir().to_path_buf()),
        };

        if let Some(writer) = &writer {
            writer.write_json("summary", &report)?;
        }
        if report.total_issues() > 0 {
            warn!("⚠️  {} issues recorded", report.total_issues());
        }
        report.log_summary();

        Ok(report)
    }

    /// Distinct `como_conheceu` answers that match no catalog channel, most
    /// frequent first. Reads the customer files only.
    pub fn unmapped_channels(&self) -> Result<Vec<UnmappedChannel>> {
        let mut log = DiagnosticLog::new();
        let frame = SourceLoader::new(&self.config)
            .load(Dataset::Customers, &mut log)?
            .frame;

        ChannelMapper::new(&self.catalog, self.config.channels.similarity_threshold)
            .unmapped_values(&frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelEntry;
    use crate::report::IssueKind;
    use crate::storage::MemorySink;
    use std::fs;
    use std::path::PathBuf;
    use uuid::Uuid;

    const CENTRO: &str = "6f1c2a9e-3b4d-4c1a-9e2f-000000000001";
    const NORTE: &str = "6f1c2a9e-3b4d-4c1a-9e2f-000000000002";

    fn write(base: &Path, name: &str, content: &str) {
        let path = base.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn fixture() -> PathBuf {
        let base = std::env::temp_dir().join(format!("pipeline_{}", Uuid::new_v4()));

        write(
            &base,
            "centro/clientes.csv",
            "Nome;CPF;Celular;E-mail;Data Nascimento;Data Cadastro;Como conheceu\n\
             MARIA DA SILVA;529.982.247-25;(11) 98765-4321;maria@gmail.con;15/03/1985;01/02/2020;Instagram\n\
             Maria Silva;52998224725;11 3333-4444;;;10/01/2023;insta\n\
             JOAO PEREIRA;111.444.777-35;8765-4321;nao tem;;;Rádio\n\
             Sem Documento;123;;;;;\n",
        );
        write(
            &base,
            "norte/clientes.csv",
            "cliente;cpf;telefone;loja\n\
             Ana Souza;390.533.447-05;(21) 2222-3333;Loja Norte\n",
        );
        write(
            &base,
            "centro/vendas.csv",
            "Numero;Data;CPF Cliente;Valor Total;Vendedor\n\
             1001;05/01/2024;529.982.247-25;R$ 1.234,50;Carlos\n\
             1002;06/01/2024;390.533.447-05;89,90;Carlos\n\
             1002;06/01/2024;;89,90;Carlos\n\
             1003;07/01/2024;000.000.000-00;10,00;\n",
        );
        write(
            &base,
            "centro/os.csv",
            "Numero OS;Data Abertura;Valor;CPF\n\
             1001;2024-01-08;150;11144477735\n",
        );

        base
    }

    fn pipeline(base: &Path) -> MigrationPipeline {
        let toml = format!(
            r#"
            [channels]
            catalog = "canais.toml"

            [output]
            dir = "saida"

            [[stores]]
            code = "centro"
            name = "Loja Centro"
            id = "{CENTRO}"
            ddd = "11"
            clientes = ["centro/clientes.csv", "centro/clientes_2019.xlsx"]
            vendas = ["centro/vendas.csv"]
            ordens_servico = ["centro/os.csv"]

            [[stores]]
            code = "norte"
            name = "Loja Norte"
            id = "{NORTE}"
            ddd = "21"
            clientes = ["norte/clientes.csv"]
            "#
        );
        let config = MigrationConfig::from_toml_str(&toml, base).unwrap();

        let catalog = ChannelCatalog {
            fallback: Some("Outros".to_string()),
            canais: vec![
                ChannelEntry {
                    id: Uuid::new_v4(),
                    nome: "Instagram".to_string(),
                    aliases: vec!["insta".to_string()],
                },
                ChannelEntry {
                    id: Uuid::new_v4(),
                    nome: "Outros".to_string(),
                    aliases: Vec::new(),
                },
            ],
        };

        MigrationPipeline::new(config, catalog)
            .with_today(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
    }

    #[tokio::test]
    async fn test_dry_run_end_to_end() {
        let base = fixture();
        let pipeline = pipeline(&base);
        let sink = MemorySink::from_config(pipeline.config(), pipeline.catalog()).unwrap();

        let report = pipeline
            .run(
                &sink,
                RunOptions {
                    dry_run: true,
                    write_outputs: true,
                },
            )
            .await
            .unwrap();

        // The missing workbook is reported, the other files still load
        assert_eq!(report.clientes.arquivos, 2);
        assert_eq!(report.issues[&IssueKind::UnreadableFile], 1);

        assert_eq!(report.clientes.linhas_lidas, 5);
        assert_eq!(report.deduplicacao.output, 4);
        assert_eq!(report.deduplicacao.conflicts, 1);
        assert_eq!(report.clientes.validas, 3);
        assert_eq!(report.clientes.rejeitadas, 1);
        assert_eq!(report.clientes.importadas, 3);
        assert_eq!(sink.customer_count().unwrap(), 3);
        // Maria keeps both numbers
        assert_eq!(report.telefones.inserted, 4);

        assert_eq!(report.vendas.linhas_lidas, 5);
        assert_eq!(report.vendas.validas, 4);
        assert_eq!(report.vendas.rejeitadas, 1);
        assert_eq!(report.vendas.importadas, 4);
        assert_eq!(sink.linked_sale_count().unwrap(), 3);

        assert!(report.issues[&IssueKind::InvalidCpf] >= 2);
        assert_eq!(report.issues[&IssueKind::DuplicateCpf], 1);
        assert_eq!(report.canais_nao_mapeados.len(), 1);
        assert_eq!(report.canais_nao_mapeados[0].ocorrencias, 1);

        let run_dir = report.output_dir.unwrap();
        for name in ["clientes.csv", "vendas.csv", "issues.csv", "summary.json"] {
            assert!(run_dir.join(name).is_file(), "{} missing", name);
        }
        let clientes = fs::read_to_string(run_dir.join("clientes.csv")).unwrap();
        assert!(clientes.contains("maria@gmail.com"));
    }

    #[tokio::test]
    async fn test_second_run_skips_existing_rows() {
        let base = fixture();
        let pipeline = pipeline(&base);
        let sink = MemorySink::from_config(pipeline.config(), pipeline.catalog()).unwrap();
        let options = RunOptions {
            dry_run: true,
            write_outputs: false,
        };

        pipeline.run(&sink, options).await.unwrap();
        let report = pipeline.run(&sink, options).await.unwrap();

        assert_eq!(report.clientes.importadas, 0);
        assert_eq!(report.clientes.ja_existentes, 3);
        assert_eq!(report.vendas.importadas, 0);
        assert_eq!(report.vendas.ja_existentes, 4);
        assert!(report.output_dir.is_none());
        assert_eq!(sink.customer_count().unwrap(), 3);
    }

    #[test]
    fn test_unmapped_channels() {
        let base = fixture();
        let unmapped = pipeline(&base).unmapped_channels().unwrap();

        assert_eq!(unmapped.len(), 1);
        assert_eq!(unmapped[0].ocorrencias, 1);
    }
}
