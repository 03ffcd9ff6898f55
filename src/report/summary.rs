use anyhow::Result;
use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

use super::diagnostics::IssueKind;
use crate::processor::DedupStats;
use crate::storage::ImportStats;

#[derive(Debug, Clone, Default, Serialize)]
pub struct DatasetSummary {
    pub arquivos: usize,
    pub linhas_lidas: usize,
    pub validas: usize,
    pub rejeitadas: usize,
    pub importadas: usize,
    pub ja_existentes: usize,
}

/// Distinct "como conheceu" answer that no channel matched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnmappedChannel {
    pub valor: String,
    pub ocorrencias: usize,
}

impl UnmappedChannel {
    pub fn to_dataframe(values: &[UnmappedChannel]) -> Result<DataFrame> {
        let valor: Vec<&str> = values.iter().map(|v| v.valor.as_str()).collect();
        let ocorrencias: Vec<u64> = values.iter().map(|v| v.ocorrencias as u64).collect();

        let df = DataFrame::new(vec![
            Series::new("valor".into(), valor).into(),
            Series::new("ocorrencias".into(), ocorrencias).into(),
        ])?;
        Ok(df)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub clientes: DatasetSummary,
    pub deduplicacao: DedupStats,
    pub telefones: ImportStats,
    pub vendas: DatasetSummary,
    pub lojas_corrigidas: usize,
    pub issues: BTreeMap<IssueKind, usize>,
    pub canais_nao_mapeados: Vec<UnmappedChannel>,
    pub output_dir: Option<PathBuf>,
}

impl RunReport {
    pub fn log_summary(&self) {
        let mode = if self.dry_run { "dry run" } else { "database import" };
        info!("=== Migration Summary ({}) ===", mode);
        info!(
            "Customers: {} rows from {} files, {} after dedup, {} valid, {} rejected, {} imported, {} already present",
            self.clientes.linhas_lidas,
            self.clientes.arquivos,
            self.deduplicacao.output,
            self.clientes.validas,
            self.clientes.rejeitadas,
            self.clientes.importadas,
            self.clientes.ja_existentes
        );
        info!(
            "Phones: {} imported, {} already present",
            self.telefones.inserted, self.telefones.skipped
        );
        info!(
            "Sales/OS: {} rows from {} files, {} valid, {} rejected, {} imported, {} already present",
            self.vendas.linhas_lidas,
            self.vendas.arquivos,
            self.vendas.validas,
            self.vendas.rejeitadas,
            self.vendas.importadas,
            self.vendas.ja_existentes
        );
        if self.lojas_corrigidas > 0 {
            info!("Store references corrected: {}", self.lojas_corrigidas);
        }

        for (kind, count) in &self.issues {
            warn!("{}: {}", kind, count);
        }

        for unmapped in self.canais_nao_mapeados.iter().take(10) {
            warn!(
                "Unmapped channel answer '{}' ({} rows)",
                unmapped.valor, unmapped.ocorrencias
            );
        }

        if let Some(dir) = &self.output_dir {
            info!("Reports written to {}", dir.display());
        }
    }

    pub fn total_issues(&self) -> usize {
        self.issues.values().sum()
    }
}
