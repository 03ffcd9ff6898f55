use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::sink::{CustomerImport, ImportStats, RecordSink, ReferenceData};
use crate::config::MigrationConfig;
use crate::models::{CustomerRecord, SaleRecord};

/// Writes into the target PostgreSQL schema. Every batch runs in its own
/// transaction and conflicting rows are skipped, so a run can be repeated.
pub struct PostgresSink {
    pool: PgPool,
    batch_size: usize,
}

impl PostgresSink {
    pub fn new(pool: PgPool, batch_size: usize) -> Self {
        Self {
            pool,
            batch_size: batch_size.max(1),
        }
    }

    pub async fn connect(config: &MigrationConfig) -> Result<Self> {
        let url = config.database_url()?;
        let pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .connect(&url)
            .await
            .context("Failed to connect to PostgreSQL")?;
        info!("✅ Connected to PostgreSQL");

        Ok(Self::new(pool, config.database.batch_size))
    }

    async fn customer_ids(&self, cpfs: &[String]) -> Result<HashMap<String, Uuid>> {
        if cpfs.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(String, Uuid)> =
            sqlx::query_as("SELECT cpf, id FROM core.clientes WHERE cpf = ANY($1)")
                .bind(cpfs)
                .fetch_all(&self.pool)
                .await
                .context("Failed to look up customer ids")?;

        Ok(rows.into_iter().collect())
    }
}

#[async_trait]
impl RecordSink for PostgresSink {
    async fn reference_data(&self) -> Result<ReferenceData> {
        let store_ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM core.lojas")
            .fetch_all(&self.pool)
            .await
            .context("Failed to read core.lojas")?;

        let channels: Vec<(Uuid, String)> =
            sqlx::query_as("SELECT id, nome FROM marketing.canais_aquisicao")
                .fetch_all(&self.pool)
                .await
                .context("Failed to read marketing.canais_aquisicao")?;

        let existing_cpfs: Vec<String> =
            sqlx::query_scalar("SELECT cpf FROM core.clientes WHERE cpf IS NOT NULL")
                .fetch_all(&self.pool)
                .await
                .context("Failed to read existing CPFs")?;

        let limits: Vec<(String, String, i32)> = sqlx::query_as(
            r#"
            SELECT table_name::text, column_name::text, character_maximum_length::int4
            FROM information_schema.columns
            WHERE (table_schema, table_name) IN (('core', 'clientes'), ('vendas', 'vendas'))
              AND character_maximum_length IS NOT NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to read column limits")?;

        let column_limits: HashMap<String, usize> = limits
            .into_iter()
            .filter(|(_, _, limit)| *limit > 0)
            .map(|(table, column, limit)| (format!("{}.{}", table, column), limit as usize))
            .collect();

        info!(
            "Reference data: {} stores, {} channels, {} existing customers",
            store_ids.len(),
            channels.len(),
            existing_cpfs.len()
        );
        debug!("Column limits: {:?}", column_limits);

        Ok(ReferenceData {
            store_ids: store_ids.into_iter().collect(),
            channels,
            existing_cpfs: existing_cpfs.into_iter().collect::<HashSet<_>>(),
            column_limits,
        })
    }

    async fn import_customers(&self, customers: &[CustomerRecord]) -> Result<CustomerImport> {
        let mut result = CustomerImport::default();
        let mut existing: Vec<String> = Vec::new();

        for (batch_index, batch) in customers.chunks(self.batch_size).enumerate() {
            let mut tx = self.pool.begin().await.context("Failed to start transaction")?;

            for customer in batch {
                let Some(cpf) = customer.cpf.as_deref() else {
                    result.clientes.skipped += 1;
                    continue;
                };

                let inserted: Option<Uuid> = sqlx::query_scalar(
                    r#"
                    INSERT INTO core.clientes (
                        id, cpf, nome, email, data_nascimento, data_cadastro,
                        loja_id, canal_aquisicao_id
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    ON CONFLICT (cpf) DO NOTHING
                    RETURNING id
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(cpf)
                .bind(customer.nome.as_deref())
                .bind(customer.email.as_deref())
                .bind(customer.data_nascimento)
                .bind(customer.data_cadastro)
                .bind(customer.loja_id)
                .bind(customer.canal_id)
                .fetch_optional(&mut *tx)
                .await
                .with_context(|| format!("Failed to insert customer {}", cpf))?;

                let Some(cliente_id) = inserted else {
                    result.clientes.skipped += 1;
                    existing.push(cpf.to_string());
                    continue;
                };
                result.clientes.inserted += 1;
                result.ids.insert(cpf.to_string(), cliente_id);

                // Phones only for customers created by this run
                for (position, phone) in customer.telefones.iter().enumerate() {
                    let affected = sqlx::query(
                        r#"
                        INSERT INTO core.telefones (id, cliente_id, ddd, numero, tipo, principal)
                        VALUES ($1, $2, $3, $4, $5, $6)
                        ON CONFLICT (cliente_id, ddd, numero) DO NOTHING
                        "#,
                    )
                    .bind(Uuid::new_v4())
                    .bind(cliente_id)
                    .bind(&phone.ddd)
                    .bind(&phone.numero)
                    .bind(phone.kind.as_str())
                    .bind(position == 0)
                    .execute(&mut *tx)
                    .await
                    .with_context(|| format!("Failed to insert phone of customer {}", cpf))?
                    .rows_affected();

                    if affected > 0 {
                        result.telefones.inserted += 1;
                    } else {
                        result.telefones.skipped += 1;
                    }
                }
            }

            tx.commit().await.context("Failed to commit customer batch")?;
            info!(
                "Customer batch {} committed ({} rows)",
                batch_index + 1,
                batch.len()
            );
        }

        result.ids.extend(self.customer_ids(&existing).await?);
        if result.clientes.skipped > 0 {
            warn!("{} customers already existed and were kept as they are", result.clientes.skipped);
        }

        Ok(result)
    }

    async fn import_sales(
        &self,
        sales: &[SaleRecord],
        customer_ids: &HashMap<String, Uuid>,
    ) -> Result<ImportStats> {
        // Sales may point at customers that existed before this run
        let missing: Vec<String> = sales
            .iter()
            .filter_map(|s| s.cpf.clone())
            .filter(|cpf| !customer_ids.contains_key(cpf))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let mut ids = customer_ids.clone();
        ids.extend(self.customer_ids(&missing).await?);

        let mut stats = ImportStats::default();
        for (batch_index, batch) in sales.chunks(self.batch_size).enumerate() {
            let mut tx = self.pool.begin().await.context("Failed to start transaction")?;

            for sale in batch {
                let (Some(loja_id), Some(numero), Some(data)) =
                    (sale.loja_id, sale.numero.as_deref(), sale.data)
                else {
                    stats.skipped += 1;
                    continue;
                };
                let cliente_id = sale.cpf.as_ref().and_then(|cpf| ids.get(cpf)).copied();

                let affected = sqlx::query(
                    r#"
                    INSERT INTO vendas.vendas (
                        id, cliente_id, loja_id, numero_documento, tipo,
                        data_venda, valor_total, vendedor
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, CAST($7 AS NUMERIC(12, 2)), $8)
                    ON CONFLICT (loja_id, tipo, numero_documento) DO NOTHING
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(cliente_id)
                .bind(loja_id)
                .bind(numero)
                .bind(sale.kind.as_str())
                .bind(data)
                .bind(sale.valor_total)
                .bind(sale.vendedor.as_deref())
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to insert {} {}", sale.kind, numero))?
                .rows_affected();

                if affected > 0 {
                    stats.inserted += 1;
                } else {
                    stats.skipped += 1;
                }
            }

            tx.commit().await.context("Failed to commit sales batch")?;
            info!("Sales batch {} committed ({} rows)", batch_index + 1, batch.len());
        }

        Ok(stats)
    }
}
