use anyhow::Result;
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::columns::*;
use super::frame::{f64_values, row_refs, string_values};
use crate::processor::validators::Phone;
use crate::report::RowRef;

const ISO_DATE: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SaleKind {
    #[serde(rename = "VENDA")]
    Venda,
    /// Service order.
    #[serde(rename = "OS")]
    OrdemServico,
}

impl SaleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleKind::Venda => "VENDA",
            SaleKind::OrdemServico => "OS",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "VENDA" => Some(SaleKind::Venda),
            "OS" => Some(SaleKind::OrdemServico),
            _ => None,
        }
    }
}

impl fmt::Display for SaleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row destined for `core.clientes` plus its phones for `core.telefones`.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerRecord {
    pub origem: RowRef,
    pub cpf: Option<String>,
    pub nome: Option<String>,
    pub email: Option<String>,
    pub telefones: Vec<Phone>,
    pub data_nascimento: Option<NaiveDate>,
    pub data_cadastro: Option<NaiveDate>,
    pub loja_id: Option<Uuid>,
    pub canal_id: Option<Uuid>,
    pub como_conheceu: Option<String>,
}

impl CustomerRecord {
    pub fn new(origem: RowRef) -> Self {
        Self {
            origem,
            cpf: None,
            nome: None,
            email: None,
            telefones: Vec::new(),
            data_nascimento: None,
            data_cadastro: None,
            loja_id: None,
            canal_id: None,
            como_conheceu: None,
        }
    }

    /// Reads records from a normalized frame. Phones are expected in digit
    /// form (`DDD` + number) as the normalizer leaves them.
    pub fn from_dataframe(df: &DataFrame) -> Result<Vec<Self>> {
        let rows = row_refs(df)?;
        let cpfs = string_values(df, CPF)?;
        let nomes = string_values(df, NOME)?;
        let emails = string_values(df, EMAIL)?;
        let telefones = string_values(df, TELEFONE)?;
        let celulares = string_values(df, CELULAR)?;
        let nascimentos = string_values(df, DATA_NASCIMENTO)?;
        let cadastros = string_values(df, DATA_CADASTRO)?;
        let lojas = string_values(df, LOJA_ID)?;
        let canais = string_values(df, CANAL_ID)?;
        let origens = string_values(df, COMO_CONHECEU)?;

        let mut records = Vec::with_capacity(df.height());
        for (i, origem) in rows.into_iter().enumerate() {
            let mut phones: Vec<Phone> = Vec::new();
            for digits in [&celulares[i], &telefones[i]].into_iter().flatten() {
                if let Ok(phone) = Phone::parse(digits, None) {
                    if !phones.contains(&phone) {
                        phones.push(phone);
                    }
                }
            }

            records.push(CustomerRecord {
                origem,
                cpf: cpfs[i].clone(),
                nome: nomes[i].clone(),
                email: emails[i].clone(),
                telefones: phones,
                data_nascimento: parse_iso(&nascimentos[i]),
                data_cadastro: parse_iso(&cadastros[i]),
                loja_id: parse_uuid(&lojas[i]),
                canal_id: parse_uuid(&canais[i]),
                como_conheceu: origens[i].clone(),
            });
        }

        Ok(records)
    }

    pub fn to_dataframe(records: &[Self]) -> Result<DataFrame> {
        let df = DataFrame::new(vec![
            text_series(CPF, records.iter().map(|r| r.cpf.clone())),
            text_series(NOME, records.iter().map(|r| r.nome.clone())),
            text_series(EMAIL, records.iter().map(|r| r.email.clone())),
            text_series(
                "telefones",
                records.iter().map(|r| {
                    (!r.telefones.is_empty()).then(|| {
                        r.telefones
                            .iter()
                            .map(Phone::formatted)
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                }),
            ),
            text_series(DATA_NASCIMENTO, records.iter().map(|r| format_iso(r.data_nascimento))),
            text_series(DATA_CADASTRO, records.iter().map(|r| format_iso(r.data_cadastro))),
            text_series(LOJA_ID, records.iter().map(|r| r.loja_id.map(|id| id.to_string()))),
            text_series(
                "canal_aquisicao_id",
                records.iter().map(|r| r.canal_id.map(|id| id.to_string())),
            ),
            text_series(COMO_CONHECEU, records.iter().map(|r| r.como_conheceu.clone())),
            text_series(ARQUIVO, records.iter().map(|r| Some(r.origem.arquivo.clone()))),
            text_series(LINHA, records.iter().map(|r| r.origem.linha.map(|l| l.to_string()))),
        ])?;

        Ok(df)
    }
}

/// One row destined for `vendas.vendas`; service orders share the table
/// and are told apart by `tipo`.
#[derive(Debug, Clone, PartialEq)]
pub struct SaleRecord {
    pub origem: RowRef,
    pub numero: Option<String>,
    pub kind: SaleKind,
    pub cpf: Option<String>,
    pub loja_id: Option<Uuid>,
    pub data: Option<NaiveDate>,
    pub valor_total: Option<f64>,
    pub vendedor: Option<String>,
}

impl SaleRecord {
    pub fn from_dataframe(df: &DataFrame) -> Result<Vec<Self>> {
        let rows = row_refs(df)?;
        let numeros = string_values(df, NUMERO)?;
        let tipos = string_values(df, TIPO)?;
        let cpfs = string_values(df, CPF)?;
        let lojas = string_values(df, LOJA_ID)?;
        let datas = string_values(df, DATA)?;
        let valores = f64_values(df, VALOR_TOTAL)?;
        let vendedores = string_values(df, VENDEDOR)?;

        Ok(rows
            .into_iter()
            .enumerate()
            .map(|(i, origem)| SaleRecord {
                origem,
                numero: numeros[i].clone(),
                kind: tipos[i]
                    .as_deref()
                    .and_then(SaleKind::parse)
                    .unwrap_or(SaleKind::Venda),
                cpf: cpfs[i].clone(),
                loja_id: parse_uuid(&lojas[i]),
                data: parse_iso(&datas[i]),
                valor_total: valores[i],
                vendedor: vendedores[i].clone(),
            })
            .collect())
    }

    pub fn to_dataframe(records: &[Self]) -> Result<DataFrame> {
        let df = DataFrame::new(vec![
            text_series("numero_documento", records.iter().map(|r| r.numero.clone())),
            text_series(TIPO, records.iter().map(|r| Some(r.kind.as_str().to_string()))),
            text_series(CPF, records.iter().map(|r| r.cpf.clone())),
            text_series(LOJA_ID, records.iter().map(|r| r.loja_id.map(|id| id.to_string()))),
            text_series("data_venda", records.iter().map(|r| format_iso(r.data))),
            Series::new(
                VALOR_TOTAL.into(),
                records.iter().map(|r| r.valor_total).collect::<Vec<_>>(),
            )
            .into(),
            text_series(VENDEDOR, records.iter().map(|r| r.vendedor.clone())),
            text_series(ARQUIVO, records.iter().map(|r| Some(r.origem.arquivo.clone()))),
            text_series(LINHA, records.iter().map(|r| r.origem.linha.map(|l| l.to_string()))),
        ])?;

        Ok(df)
    }
}

fn text_series(name: &str, values: impl Iterator<Item = Option<String>>) -> Column {
    Series::new(name.into(), values.collect::<Vec<_>>()).into()
}

fn parse_iso(value: &Option<String>) -> Option<NaiveDate> {
    value
        .as_deref()
        .and_then(|v| NaiveDate::parse_from_str(v, ISO_DATE).ok())
}

fn format_iso(value: Option<NaiveDate>) -> Option<String> {
    value.map(|d| d.format(ISO_DATE).to_string())
}

fn parse_uuid(value: &Option<String>) -> Option<Uuid> {
    value.as_deref().and_then(|v| Uuid::parse_str(v.trim()).ok())
}
