use anyhow::Result;
use chrono::{Local, NaiveDate};
use polars::prelude::*;
use tracing::{debug, warn};

use super::validators::{
    Cpf, EmailError, Phone, normalize_email, normalize_name, parse_amount, parse_birth_date_with,
    parse_date_with,
};
use crate::models::columns::*;
use crate::models::frame::{clean_text, has_column, row_refs, set_string_column, string_values};
use crate::report::{DiagnosticLog, IssueKind, RowRef};

const ISO_DATE: &str = "%Y-%m-%d";

/// Rewrites canonical columns into the form the target schema stores.
/// Invalid values become null and are reported; blank cells become null
/// silently.
pub struct RuleNormalizer {
    pad_cpf_zeros: bool,
    today: NaiveDate,
}

impl RuleNormalizer {
    pub fn new(pad_cpf_zeros: bool) -> Self {
        Self {
            pad_cpf_zeros,
            today: Local::now().date_naive(),
        }
    }

    /// Fixes the reference date used for birth date and two-digit year checks.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn normalize_dataframe(&self, df: &mut DataFrame, log: &mut DiagnosticLog) -> Result<()> {
        let rows = row_refs(df)?;

        self.normalize_cpf_column(df, &rows, log)?;
        self.normalize_name_column(df, &rows, log)?;
        self.normalize_email_column(df, &rows, log)?;
        self.normalize_phone_column(df, TELEFONE, &rows, log)?;
        self.normalize_phone_column(df, CELULAR, &rows, log)?;
        self.normalize_date_column(df, DATA_NASCIMENTO, true, &rows, log)?;
        self.normalize_date_column(df, DATA_CADASTRO, false, &rows, log)?;
        self.normalize_date_column(df, DATA, false, &rows, log)?;
        self.normalize_amount_column(df, VALOR_TOTAL, &rows, log)?;

        for col_name in [COMO_CONHECEU, LOJA, LOJA_ID, NUMERO, VENDEDOR] {
            self.normalize_string_column(df, col_name)?;
        }

        Ok(())
    }

    fn normalize_cpf_column(
        &self,
        df: &mut DataFrame,
        rows: &[RowRef],
        log: &mut DiagnosticLog,
    ) -> Result<()> {
        apply_rule(df, CPF, rows, log, IssueKind::InvalidCpf, |_, raw| {
            Cpf::parse(raw, self.pad_cpf_zeros)
                .map(|cpf| Some(cpf.as_str().to_string()))
                .map_err(|e| e.to_string())
        })
    }

    fn normalize_name_column(
        &self,
        df: &mut DataFrame,
        rows: &[RowRef],
        log: &mut DiagnosticLog,
    ) -> Result<()> {
        apply_rule(df, NOME, rows, log, IssueKind::InvalidName, |_, raw| {
            normalize_name(raw)
                .map(Some)
                .ok_or_else(|| "name has no letters".to_string())
        })
    }

    fn normalize_email_column(
        &self,
        df: &mut DataFrame,
        rows: &[RowRef],
        log: &mut DiagnosticLog,
    ) -> Result<()> {
        apply_rule(df, EMAIL, rows, log, IssueKind::InvalidEmail, |_, raw| {
            match normalize_email(raw) {
                Ok(email) => Ok(Some(email)),
                // "nao tem" and the like mean the customer has no e-mail
                Err(EmailError::Placeholder | EmailError::Empty) => Ok(None),
                Err(e) => Err(e.to_string()),
            }
        })
    }

    /// Phones are stored as digits (area code + number); the row's store
    /// area code completes local numbers.
    fn normalize_phone_column(
        &self,
        df: &mut DataFrame,
        col_name: &str,
        rows: &[RowRef],
        log: &mut DiagnosticLog,
    ) -> Result<()> {
        let ddds = string_values(df, DDD_PADRAO)?;
        apply_rule(df, col_name, rows, log, IssueKind::InvalidPhone, |i, raw| {
            Phone::parse(raw, ddds[i].as_deref())
                .map(|phone| Some(phone.digits()))
                .map_err(|e| e.to_string())
        })
    }

    fn normalize_date_column(
        &self,
        df: &mut DataFrame,
        col_name: &str,
        birth_date: bool,
        rows: &[RowRef],
        log: &mut DiagnosticLog,
    ) -> Result<()> {
        apply_rule(df, col_name, rows, log, IssueKind::InvalidDate, |_, raw| {
            let parsed = if birth_date {
                parse_birth_date_with(raw, self.today)
            } else {
                parse_date_with(raw, self.today)
            };
            parsed
                .map(|date| Some(date.format(ISO_DATE).to_string()))
                .map_err(|e| e.to_string())
        })
    }

    fn normalize_amount_column(
        &self,
        df: &mut DataFrame,
        col_name: &str,
        rows: &[RowRef],
        log: &mut DiagnosticLog,
    ) -> Result<()> {
        if !has_column(df, col_name) {
            return Ok(());
        }

        let values = string_values(df, col_name)?;
        let mut rejected = 0;
        let normalized: Vec<Option<f64>> = values
            .iter()
            .enumerate()
            .map(|(i, raw)| {
                let raw = raw.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
                match parse_amount(raw) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        log.record(&rows[i], col_name, raw, IssueKind::InvalidAmount, e.to_string());
                        rejected += 1;
                        None
                    }
                }
            })
            .collect();

        if rejected > 0 {
            warn!("{}: {} values rejected", col_name, rejected);
        }

        df.with_column(Series::new(col_name.into(), normalized))?;
        Ok(())
    }

    fn normalize_string_column(&self, df: &mut DataFrame, col_name: &str) -> Result<()> {
        if !has_column(df, col_name) {
            return Ok(());
        }

        let normalized = string_values(df, col_name)?
            .iter()
            .map(|value| clean_text(value.as_deref()))
            .collect();
        set_string_column(df, col_name, normalized)
    }
}

/// Runs `rule` over every non-blank value of a text column. `Ok(None)` nulls
/// the value without an issue; `Err(reason)` nulls it and records one.
fn apply_rule<F>(
    df: &mut DataFrame,
    col_name: &str,
    rows: &[RowRef],
    log: &mut DiagnosticLog,
    kind: IssueKind,
    mut rule: F,
) -> Result<()>
where
    F: FnMut(usize, &str) -> std::result::Result<Option<String>, String>,
{
    if !has_column(df, col_name) {
        return Ok(());
    }

    let values = string_values(df, col_name)?;
    let mut normalized = Vec::with_capacity(values.len());
    let mut rejected = 0;

    for (i, raw) in values.iter().enumerate() {
        let value = match raw.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            None => None,
            Some(raw) => match rule(i, raw) {
                Ok(value) => value,
                Err(reason) => {
                    log.record(&rows[i], col_name, raw, kind, reason);
                    rejected += 1;
                    None
                }
            },
        };
        normalized.push(value);
    }

    if rejected > 0 {
        warn!("{}: {} values rejected", col_name, rejected);
    } else {
        debug!("{}: all values accepted", col_name);
    }

    set_string_column(df, col_name, normalized)
}
