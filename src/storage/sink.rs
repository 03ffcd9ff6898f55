use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::models::{CustomerRecord, SaleRecord};

/// What the target database already holds.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    pub store_ids: HashSet<Uuid>,
    /// (id, nome) rows of `marketing.canais_aquisicao`.
    pub channels: Vec<(Uuid, String)>,
    pub existing_cpfs: HashSet<String>,
    /// varchar limits keyed `table.column`.
    pub column_limits: HashMap<String, usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub inserted: usize,
    /// Rows the database already had (conflicts ignored).
    pub skipped: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CustomerImport {
    pub clientes: ImportStats,
    pub telefones: ImportStats,
    /// Customer id by CPF, for every imported or pre-existing customer.
    pub ids: HashMap<String, Uuid>,
}

/// Destination of the migrated records.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn reference_data(&self) -> Result<ReferenceData>;

    async fn import_customers(&self, customers: &[CustomerRecord]) -> Result<CustomerImport>;

    /// `customer_ids` resolves each sale's CPF to `core.clientes.id`.
    async fn import_sales(
        &self,
        sales: &[SaleRecord],
        customer_ids: &HashMap<String, Uuid>,
    ) -> Result<ImportStats>;
}
