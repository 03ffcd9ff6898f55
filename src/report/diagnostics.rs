use anyhow::Result;
use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    UnreadableFile,
    InvalidCpf,
    InvalidPhone,
    InvalidEmail,
    InvalidName,
    InvalidDate,
    InvalidAmount,
    UnknownStore,
    UnmappedChannel,
    DuplicateCpf,
    Conflict,
    ConstraintViolation,
    MissingCustomer,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::UnreadableFile => "unreadable_file",
            IssueKind::InvalidCpf => "invalid_cpf",
            IssueKind::InvalidPhone => "invalid_phone",
            IssueKind::InvalidEmail => "invalid_email",
            IssueKind::InvalidName => "invalid_name",
            IssueKind::InvalidDate => "invalid_date",
            IssueKind::InvalidAmount => "invalid_amount",
            IssueKind::UnknownStore => "unknown_store",
            IssueKind::UnmappedChannel => "unmapped_channel",
            IssueKind::DuplicateCpf => "duplicate_cpf",
            IssueKind::Conflict => "conflict",
            IssueKind::ConstraintViolation => "constraint_violation",
            IssueKind::MissingCustomer => "missing_customer",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a row came from: source file and 1-based line (header is line 1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct RowRef {
    pub arquivo: String,
    pub linha: Option<u32>,
}

impl RowRef {
    pub fn new(arquivo: impl Into<String>, linha: Option<u32>) -> Self {
        Self {
            arquivo: arquivo.into(),
            linha,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Issue {
    pub arquivo: String,
    pub linha: Option<u32>,
    pub campo: String,
    pub valor: String,
    pub kind: IssueKind,
    pub detalhe: String,
}

/// Every problem found during a run, in discovery order.
#[derive(Debug, Default)]
pub struct DiagnosticLog {
    issues: Vec<Issue>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        row: &RowRef,
        campo: &str,
        valor: &str,
        kind: IssueKind,
        detalhe: impl Into<String>,
    ) {
        self.issues.push(Issue {
            arquivo: row.arquivo.clone(),
            linha: row.linha,
            campo: campo.to_string(),
            valor: valor.to_string(),
            kind,
            detalhe: detalhe.into(),
        });
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn count(&self, kind: IssueKind) -> usize {
        self.issues.iter().filter(|i| i.kind == kind).count()
    }

    pub fn by_kind(&self) -> BTreeMap<IssueKind, usize> {
        let mut counts = BTreeMap::new();
        for issue in &self.issues {
            *counts.entry(issue.kind).or_insert(0) += 1;
        }
        counts
    }

    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let arquivo: Vec<&str> = self.issues.iter().map(|i| i.arquivo.as_str()).collect();
        let linha: Vec<Option<u32>> = self.issues.iter().map(|i| i.linha).collect();
        let campo: Vec<&str> = self.issues.iter().map(|i| i.campo.as_str()).collect();
        let valor: Vec<&str> = self.issues.iter().map(|i| i.valor.as_str()).collect();
        let tipo: Vec<&str> = self.issues.iter().map(|i| i.kind.as_str()).collect();
        let detalhe: Vec<&str> = self.issues.iter().map(|i| i.detalhe.as_str()).collect();

        let df = DataFrame::new(vec![
            Series::new("arquivo".into(), arquivo).into(),
            Series::new("linha".into(), linha).into(),
            Series::new("campo".into(), campo).into(),
            Series::new("valor".into(), valor).into(),
            Series::new("tipo".into(), tipo).into(),
            Series::new("detalhe".into(), detalhe).into(),
        ])?;

        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_count() {
        let mut log = DiagnosticLog::new();
        let row = RowRef::new("centro/clientes.csv", Some(7));
        log.record(&row, "cpf", "123", IssueKind::InvalidCpf, "expected 11 digits, found 3");
        log.record(&row, "email", "x", IssueKind::InvalidEmail, "placeholder e-mail");
        log.record(&row, "cpf", "000", IssueKind::InvalidCpf, "all digits are equal");

        assert_eq!(log.len(), 3);
        assert_eq!(log.count(IssueKind::InvalidCpf), 2);
        assert_eq!(log.by_kind().get(&IssueKind::InvalidEmail), Some(&1));
        assert_eq!(log.issues()[0].linha, Some(7));
    }

    #[test]
    fn test_to_dataframe() {
        let mut log = DiagnosticLog::new();
        log.record(&RowRef::new("a.csv", None), "arquivo", "", IssueKind::UnreadableFile, "missing");
        log.record(&RowRef::new("b.csv", Some(2)), "loja", "Filial X", IssueKind::UnknownStore, "");

        let df = log.to_dataframe().unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(
            df.get_column_names().iter().map(|c| c.as_str()).collect::<Vec<_>>(),
            vec!["arquivo", "linha", "campo", "valor", "tipo", "detalhe"]
        );
        let tipo = df.column("tipo").unwrap().str().unwrap();
        assert_eq!(tipo.get(1), Some("unknown_store"));
    }
}
