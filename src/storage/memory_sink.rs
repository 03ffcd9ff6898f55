use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use tracing::info;
use uuid::Uuid;

use super::sink::{CustomerImport, ImportStats, RecordSink, ReferenceData};
use crate::config::{ChannelCatalog, MigrationConfig};
use crate::models::{CustomerRecord, SaleKind, SaleRecord};

#[derive(Debug, Default)]
struct MemoryState {
    clientes: HashMap<String, Uuid>,
    telefones: HashSet<(Uuid, String, String)>,
    vendas: HashSet<(Uuid, SaleKind, String)>,
    /// Sales linked to a customer.
    vendas_com_cliente: usize,
}

/// Sink used for dry runs and tests. Applies the same uniqueness rules as
/// the database without persisting anything.
pub struct MemorySink {
    reference: ReferenceData,
    state: Mutex<MemoryState>,
}

impl MemorySink {
    pub fn new(reference: ReferenceData) -> Self {
        let state = MemoryState {
            clientes: reference
                .existing_cpfs
                .iter()
                .map(|cpf| (cpf.clone(), Uuid::new_v4()))
                .collect(),
            ..Default::default()
        };

        Self {
            reference,
            state: Mutex::new(state),
        }
    }

    /// Reference data taken from the configuration: configured stores and
    /// correction targets, catalog channels, no existing customers.
    pub fn from_config(config: &MigrationConfig, catalog: &ChannelCatalog) -> Result<Self> {
        let mut store_ids: HashSet<Uuid> = config.stores.iter().map(|s| s.id).collect();
        store_ids.extend(config.correction_map()?.values().copied());

        let channels = catalog
            .canais
            .iter()
            .map(|c| (c.id, c.nome.clone()))
            .collect();

        Ok(Self::new(ReferenceData {
            store_ids,
            channels,
            ..Default::default()
        }))
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("Memory sink state is poisoned"))
    }

    pub fn customer_count(&self) -> Result<usize> {
        Ok(self.lock()?.clientes.len())
    }

    pub fn phone_count(&self) -> Result<usize> {
        Ok(self.lock()?.telefones.len())
    }

    pub fn sale_count(&self) -> Result<usize> {
        Ok(self.lock()?.vendas.len())
    }

    pub fn linked_sale_count(&self) -> Result<usize> {
        Ok(self.lock()?.vendas_com_cliente)
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn reference_data(&self) -> Result<ReferenceData> {
        Ok(self.reference.clone())
    }

    async fn import_customers(&self, customers: &[CustomerRecord]) -> Result<CustomerImport> {
        let mut state = self.lock()?;
        let mut result = CustomerImport::default();

        for customer in customers {
            let Some(cpf) = customer.cpf.as_ref() else {
                result.clientes.skipped += 1;
                continue;
            };

            if let Some(id) = state.clientes.get(cpf) {
                result.ids.insert(cpf.clone(), *id);
                result.clientes.skipped += 1;
                continue;
            }

            let id = Uuid::new_v4();
            state.clientes.insert(cpf.clone(), id);
            result.ids.insert(cpf.clone(), id);
            result.clientes.inserted += 1;

            for phone in &customer.telefones {
                if state
                    .telefones
                    .insert((id, phone.ddd.clone(), phone.numero.clone()))
                {
                    result.telefones.inserted += 1;
                } else {
                    result.telefones.skipped += 1;
                }
            }
        }

        info!(
            "Dry run: {} customers and {} phones would be inserted",
            result.clientes.inserted, result.telefones.inserted
        );
        Ok(result)
    }

    async fn import_sales(
        &self,
        sales: &[SaleRecord],
        customer_ids: &HashMap<String, Uuid>,
    ) -> Result<ImportStats> {
        let mut state = self.lock()?;
        let mut stats = ImportStats::default();

        for sale in sales {
            let (Some(loja_id), Some(numero)) = (sale.loja_id, sale.numero.clone()) else {
                stats.skipped += 1;
                continue;
            };

            if !state.vendas.insert((loja_id, sale.kind, numero)) {
                stats.skipped += 1;
                continue;
            }
            stats.inserted += 1;

            let linked = sale
                .cpf
                .as_ref()
                .is_some_and(|cpf| customer_ids.contains_key(cpf) || state.clientes.contains_key(cpf));
            if linked {
                state.vendas_com_cliente += 1;
            }
        }

        info!("Dry run: {} sales would be inserted", stats.inserted);
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::validators::Phone;
    use crate::report::RowRef;

    fn customer(cpf: &str) -> CustomerRecord {
        let mut record = CustomerRecord::new(RowRef::new("c.csv", Some(2)));
        record.cpf = Some(cpf.to_string());
        record.nome = Some("Maria".to_string());
        record.telefones = vec![Phone::parse("11987654321", None).unwrap()];
        record
    }

    #[tokio::test]
    async fn test_existing_customers_are_skipped() {
        let sink = MemorySink::new(ReferenceData {
            existing_cpfs: HashSet::from(["52998224725".to_string()]),
            ..Default::default()
        });

        let result = sink
            .import_customers(&[customer("52998224725"), customer("11144477735")])
            .await
            .unwrap();

        assert_eq!(result.clientes, ImportStats { inserted: 1, skipped: 1 });
        assert_eq!(result.telefones.inserted, 1);
        assert_eq!(result.ids.len(), 2);
        assert_eq!(sink.customer_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_sales_unique_per_store_kind_and_number() {
        let sink = MemorySink::new(ReferenceData::default());
        let loja = Uuid::new_v4();
        let sale = |kind: SaleKind| SaleRecord {
            origem: RowRef::new("v.csv", Some(2)),
            numero: Some("1001".to_string()),
            kind,
            cpf: None,
            loja_id: Some(loja),
            data: None,
            valor_total: Some(10.0),
            vendedor: None,
        };

        let stats = sink
            .import_sales(
                &[sale(SaleKind::Venda), sale(SaleKind::OrdemServico), sale(SaleKind::Venda)],
                &HashMap::new(),
            )
            .await
            .unwrap();

        assert_eq!(stats, ImportStats { inserted: 2, skipped: 1 });
        assert_eq!(sink.sale_count().unwrap(), 2);
    }
}
