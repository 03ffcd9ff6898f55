use std::collections::{HashMap, HashSet};
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::columns::{CANAL_ID, CPF, DATA, EMAIL, LOJA_ID, NOME, NUMERO, VALOR_TOTAL, VENDEDOR};
use crate::models::{CustomerRecord, SaleKind, SaleRecord};
use crate::report::{DiagnosticLog, IssueKind};

/// varchar limits of the target tables, keyed `table.column`.
const DEFAULT_LIMITS: &[(&str, usize)] = &[
    ("clientes.cpf", 11),
    ("clientes.nome", 150),
    ("clientes.email", 150),
    ("vendas.numero_documento", 30),
    ("vendas.vendedor", 100),
];

/// `vendas.valor_total` is numeric(12,2).
const MAX_VALOR_TOTAL: f64 = 1e10;

#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationOutcome {
    pub accepted: usize,
    pub rejected: usize,
}

/// Checks records against the constraints of `core.clientes` and
/// `vendas.vendas` before anything reaches the database. Rows that would
/// violate a NOT NULL, length, foreign key or unique constraint on a required
/// column are rejected; optional columns are nulled instead.
pub struct ConstraintValidator {
    store_ids: HashSet<Uuid>,
    channel_ids: HashSet<Uuid>,
    limits: HashMap<String, usize>,
}

impl ConstraintValidator {
    pub fn new(store_ids: HashSet<Uuid>, channel_ids: HashSet<Uuid>) -> Self {
        let limits = DEFAULT_LIMITS
            .iter()
            .map(|(column, limit)| (column.to_string(), *limit))
            .collect();

        Self {
            store_ids,
            channel_ids,
            limits,
        }
    }

    /// Overrides limits with the ones read from `information_schema`.
    pub fn with_limits(mut self, limits: &HashMap<String, usize>) -> Self {
        for (column, limit) in limits {
            self.limits.insert(column.clone(), *limit);
        }
        self
    }

    pub fn limit(&self, column: &str) -> Option<usize> {
        self.limits.get(column).copied()
    }

    fn exceeds(&self, column: &str, value: &str) -> Option<usize> {
        self.limit(column)
            .filter(|limit| value.chars().count() > *limit)
    }

    pub fn validate_customers(
        &self,
        records: Vec<CustomerRecord>,
        log: &mut DiagnosticLog,
    ) -> (Vec<CustomerRecord>, ValidationOutcome) {
        let mut outcome = ValidationOutcome::default();
        let mut seen_cpfs: HashSet<String> = HashSet::new();
        let mut accepted = Vec::with_capacity(records.len());

        for mut record in records {
            if let Err((campo, valor, detalhe)) = self.check_customer(&record, &seen_cpfs) {
                log.record(&record.origem, campo, &valor, IssueKind::ConstraintViolation, detalhe);
                outcome.rejected += 1;
                continue;
            }
            self.clean_customer(&mut record, log);

            if let Some(cpf) = &record.cpf {
                seen_cpfs.insert(cpf.clone());
            }
            accepted.push(record);
            outcome.accepted += 1;
        }

        if outcome.rejected > 0 {
            warn!("{} customers rejected by schema constraints", outcome.rejected);
        }
        info!("{} customers ready for import", outcome.accepted);

        (accepted, outcome)
    }

    fn check_customer(
        &self,
        record: &CustomerRecord,
        seen_cpfs: &HashSet<String>,
    ) -> Result<(), (&'static str, String, String)> {
        let Some(cpf) = record.cpf.as_deref() else {
            return Err((CPF, String::new(), "clientes.cpf is NOT NULL".to_string()));
        };
        if let Some(limit) = self.exceeds("clientes.cpf", cpf) {
            return Err((CPF, cpf.to_string(), format!("clientes.cpf is varchar({})", limit)));
        }
        if seen_cpfs.contains(cpf) {
            return Err((CPF, cpf.to_string(), "clientes_cpf_key".to_string()));
        }

        let Some(nome) = record.nome.as_deref() else {
            return Err((NOME, String::new(), "clientes.nome is NOT NULL".to_string()));
        };
        if let Some(limit) = self.exceeds("clientes.nome", nome) {
            return Err((NOME, nome.to_string(), format!("clientes.nome is varchar({})", limit)));
        }

        Ok(())
    }

    fn clean_customer(&self, record: &mut CustomerRecord, log: &mut DiagnosticLog) {
        if let Some(email) = record.email.as_deref() {
            if let Some(limit) = self.exceeds("clientes.email", email) {
                log.record(
                    &record.origem,
                    EMAIL,
                    email,
                    IssueKind::ConstraintViolation,
                    format!("clientes.email is varchar({}); value dropped", limit),
                );
                record.email = None;
            }
        }

        if let Some(id) = record.loja_id {
            if !self.store_ids.contains(&id) {
                log.record(
                    &record.origem,
                    LOJA_ID,
                    &id.to_string(),
                    IssueKind::ConstraintViolation,
                    "clientes_loja_id_fkey; value dropped",
                );
                record.loja_id = None;
            }
        }

        if let Some(id) = record.canal_id {
            if !self.channel_ids.contains(&id) {
                log.record(
                    &record.origem,
                    CANAL_ID,
                    &id.to_string(),
                    IssueKind::ConstraintViolation,
                    "clientes_canal_aquisicao_id_fkey; value dropped",
                );
                record.canal_id = None;
            }
        }
    }

    /// `known_cpfs` holds the CPFs that will exist in `core.clientes` after
    /// the customer import. A sale whose CPF is not among them is kept
    /// without a customer link.
    pub fn validate_sales(
        &self,
        records: Vec<SaleRecord>,
        known_cpfs: &HashSet<String>,
        log: &mut DiagnosticLog,
    ) -> (Vec<SaleRecord>, ValidationOutcome) {
        let mut outcome = ValidationOutcome::default();
        let mut seen: HashSet<(Uuid, SaleKind, String)> = HashSet::new();
        let mut accepted = Vec::with_capacity(records.len());

        for mut record in records {
            let key = match self.check_sale(&record) {
                Ok(key) => key,
                Err((campo, valor, detalhe)) => {
                    log.record(&record.origem, campo, &valor, IssueKind::ConstraintViolation, detalhe);
                    outcome.rejected += 1;
                    continue;
                }
            };

            if !seen.insert(key) {
                log.record(
                    &record.origem,
                    NUMERO,
                    record.numero.as_deref().unwrap_or_default(),
                    IssueKind::ConstraintViolation,
                    "vendas_loja_id_tipo_numero_documento_key",
                );
                outcome.rejected += 1;
                continue;
            }

            self.clean_sale(&mut record, known_cpfs, log);
            accepted.push(record);
            outcome.accepted += 1;
        }

        if outcome.rejected > 0 {
            warn!("{} sales rejected by schema constraints", outcome.rejected);
        }
        info!("{} sales ready for import", outcome.accepted);

        (accepted, outcome)
    }

    fn check_sale(
        &self,
        record: &SaleRecord,
    ) -> Result<(Uuid, SaleKind, String), (&'static str, String, String)> {
        let Some(numero) = record.numero.as_deref() else {
            return Err((NUMERO, String::new(), "vendas.numero_documento is required".to_string()));
        };
        if let Some(limit) = self.exceeds("vendas.numero_documento", numero) {
            return Err((
                NUMERO,
                numero.to_string(),
                format!("vendas.numero_documento is varchar({})", limit),
            ));
        }

        let Some(loja_id) = record.loja_id else {
            return Err((LOJA_ID, String::new(), "vendas.loja_id is NOT NULL".to_string()));
        };
        if !self.store_ids.contains(&loja_id) {
            return Err((LOJA_ID, loja_id.to_string(), "vendas_loja_id_fkey".to_string()));
        }

        if record.data.is_none() {
            return Err((DATA, String::new(), "vendas.data_venda is NOT NULL".to_string()));
        }

        match record.valor_total {
            None => {
                return Err((
                    VALOR_TOTAL,
                    String::new(),
                    "vendas.valor_total is required".to_string(),
                ));
            }
            Some(valor) if valor < 0.0 => {
                return Err((
                    VALOR_TOTAL,
                    valor.to_string(),
                    "vendas_valor_total_check (valor_total >= 0)".to_string(),
                ));
            }
            Some(valor) if valor.abs() >= MAX_VALOR_TOTAL => {
                return Err((
                    VALOR_TOTAL,
                    valor.to_string(),
                    "vendas.valor_total is numeric(12,2)".to_string(),
                ));
            }
            Some(_) => {}
        }

        Ok((loja_id, record.kind, numero.to_string()))
    }

    fn clean_sale(&self, record: &mut SaleRecord, known_cpfs: &HashSet<String>, log: &mut DiagnosticLog) {
        if let Some(vendedor) = record.vendedor.as_deref() {
            if let Some(limit) = self.exceeds("vendas.vendedor", vendedor) {
                log.record(
                    &record.origem,
                    VENDEDOR,
                    vendedor,
                    IssueKind::ConstraintViolation,
                    format!("vendas.vendedor is varchar({}); value dropped", limit),
                );
                record.vendedor = None;
            }
        }

        if let Some(cpf) = record.cpf.as_deref() {
            if !known_cpfs.contains(cpf) {
                log.record(
                    &record.origem,
                    CPF,
                    cpf,
                    IssueKind::MissingCustomer,
                    "no customer with this CPF; sale kept without customer",
                );
                record.cpf = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::RowRef;
    use chrono::NaiveDate;

    const LOJA: u128 = 10;
    const CANAL: u128 = 20;

    fn validator() -> ConstraintValidator {
        ConstraintValidator::new(
            HashSet::from([Uuid::from_u128(LOJA)]),
            HashSet::from([Uuid::from_u128(CANAL)]),
        )
    }

    fn customer(linha: u32, cpf: Option<&str>, nome: Option<&str>) -> CustomerRecord {
        let mut record = CustomerRecord::new(RowRef::new("clientes.csv", Some(linha)));
        record.cpf = cpf.map(str::to_string);
        record.nome = nome.map(str::to_string);
        record.loja_id = Some(Uuid::from_u128(LOJA));
        record
    }

    fn sale(linha: u32, numero: &str, valor: Option<f64>) -> SaleRecord {
        SaleRecord {
            origem: RowRef::new("vendas.csv", Some(linha)),
            numero: Some(numero.to_string()),
            kind: SaleKind::Venda,
            cpf: None,
            loja_id: Some(Uuid::from_u128(LOJA)),
            data: NaiveDate::from_ymd_opt(2024, 1, 5),
            valor_total: valor,
            vendedor: None,
        }
    }

    #[test]
    fn test_customer_constraints() {
        let mut with_bad_refs = customer(5, Some("39053344705"), Some("Ana"));
        with_bad_refs.canal_id = Some(Uuid::from_u128(99));
        with_bad_refs.loja_id = Some(Uuid::from_u128(98));
        with_bad_refs.email = Some(format!("{}@gmail.com", "a".repeat(150)));

        let records = vec![
            customer(2, Some("52998224725"), Some("Maria")),
            customer(3, None, Some("Sem CPF")),
            customer(4, Some("11144477735"), None),
            with_bad_refs,
            customer(6, Some("52998224725"), Some("Maria de Novo")),
            customer(7, Some("01234567890"), Some(&"X".repeat(151))),
        ];

        let mut log = DiagnosticLog::new();
        let (accepted, outcome) = validator().validate_customers(records, &mut log);

        assert_eq!(outcome.accepted, 2);
        assert_eq!(outcome.rejected, 4);
        assert_eq!(accepted[1].canal_id, None);
        assert_eq!(accepted[1].loja_id, None);
        assert_eq!(accepted[1].email, None);
        assert_eq!(log.count(IssueKind::ConstraintViolation), 7);

        let duplicate = log.issues().iter().find(|i| i.linha == Some(6)).unwrap();
        assert_eq!(duplicate.detalhe, "clientes_cpf_key");
    }

    #[test]
    fn test_limits_from_database() {
        let limits = HashMap::from([("clientes.nome".to_string(), 5)]);
        let validator = validator().with_limits(&limits);
        assert_eq!(validator.limit("clientes.nome"), Some(5));
        assert_eq!(validator.limit("clientes.email"), Some(150));

        let mut log = DiagnosticLog::new();
        let (accepted, _) = validator
            .validate_customers(vec![customer(2, Some("52998224725"), Some("Mariana"))], &mut log);
        assert!(accepted.is_empty());
    }

    #[test]
    fn test_sale_constraints() {
        let mut os = sale(3, "1001", Some(80.0));
        os.kind = SaleKind::OrdemServico;

        let mut unknown_store = sale(6, "1003", Some(10.0));
        unknown_store.loja_id = Some(Uuid::from_u128(77));

        let mut undated = sale(7, "1004", Some(10.0));
        undated.data = None;

        let mut linked = sale(8, "1005", Some(0.0));
        linked.cpf = Some("52998224725".to_string());

        let mut orphan = sale(9, "1006", Some(5.0));
        orphan.cpf = Some("11144477735".to_string());
        orphan.vendedor = Some("V".repeat(101));

        let records = vec![
            sale(2, "1001", Some(150.0)),
            // Same number as a service order is a different document
            os,
            sale(4, "1001", Some(150.0)),
            sale(5, "1002", Some(-3.0)),
            unknown_store,
            undated,
            linked,
            orphan,
            sale(10, &"9".repeat(31), Some(1.0)),
            sale(11, "1007", None),
            sale(12, "1008", Some(12_345_678_901.0)),
            sale(13, "1009", Some(9_999_999_999.99)),
        ];

        let known = HashSet::from(["52998224725".to_string()]);
        let mut log = DiagnosticLog::new();
        let (accepted, outcome) = validator().validate_sales(records, &known, &mut log);

        assert_eq!(outcome.accepted, 5);
        assert_eq!(outcome.rejected, 7);
        assert_eq!(accepted[2].cpf.as_deref(), Some("52998224725"));
        assert_eq!(accepted[3].cpf, None);
        assert_eq!(accepted[3].vendedor, None);
        assert_eq!(log.count(IssueKind::MissingCustomer), 1);

        let duplicate = log.issues().iter().find(|i| i.linha == Some(4)).unwrap();
        assert_eq!(duplicate.detalhe, "vendas_loja_id_tipo_numero_documento_key");

        let overflow = log.issues().iter().find(|i| i.linha == Some(12)).unwrap();
        assert_eq!(overflow.detalhe, "vendas.valor_total is numeric(12,2)");
        assert_eq!(accepted[4].valor_total, Some(9_999_999_999.99));
    }
}
