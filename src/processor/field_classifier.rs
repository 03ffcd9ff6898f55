use anyhow::Result;
use polars::prelude::*;
use std::collections::HashSet;
use tracing::{debug, warn};

use super::text::compact_key;
use super::validators::{Cpf, Phone, normalize_email};
use crate::models::columns::{self, CANONICAL, is_provenance};
use crate::models::frame::string_values;

const SAMPLE_SIZE: usize = 20;
const CONTENT_MATCH_RATIO: f64 = 0.6;
/// Shorter patterns only match exactly.
const MIN_CONTAINED_PATTERN: usize = 4;

/// Headers that must never be mapped even when they contain a known word.
const IGNORED_HEADERS: &[&str] = &[
    "codigo",
    "cod",
    "id",
    "codigocliente",
    "codcliente",
    "idcliente",
    "clienteid",
];

const IGNORED_FRAGMENTS: &[&str] = &[
    "desconto",
    "frete",
    "conjuge",
    "mae",
    "cpfvendedor",
    "cpfdovendedor",
];

pub struct FieldClassifier {
    /// (compact header pattern, canonical column) in priority order.
    field_mappings: Vec<(String, String)>,
}

impl FieldClassifier {
    pub fn new() -> Self {
        let mut classifier = FieldClassifier {
            field_mappings: Vec::new(),
        };

        classifier.add(columns::CPF, &["cpf", "cpfcliente", "nrcpf", "numcpf", "cpfcnpj"]);
        classifier.add(
            columns::NOME,
            &["nome", "nomecliente", "cliente", "nomecompleto", "razaosocial"],
        );
        classifier.add(
            columns::EMAIL,
            &["email", "emailcliente", "correioeletronico", "mail"],
        );
        classifier.add(
            columns::TELEFONE,
            &[
                "telefone",
                "fone",
                "tel",
                "telefonefixo",
                "telresidencial",
                "foneresidencial",
                "telefoneresidencial",
                "telefone1",
                "contato",
            ],
        );
        classifier.add(
            columns::CELULAR,
            &[
                "celular",
                "cel",
                "whatsapp",
                "zap",
                "telefonecelular",
                "fonecelular",
                "telefone2",
            ],
        );
        classifier.add(
            columns::DATA_NASCIMENTO,
            &[
                "datanascimento",
                "dtnascimento",
                "nascimento",
                "datanasc",
                "dtnasc",
                "aniversario",
            ],
        );
        classifier.add(
            columns::DATA_CADASTRO,
            &[
                "datacadastro",
                "dtcadastro",
                "cadastro",
                "datainclusao",
                "clientedesde",
            ],
        );
        classifier.add(
            columns::COMO_CONHECEU,
            &[
                "comoconheceu",
                "comonosconheceu",
                "comoconheceualoja",
                "comoficousabendo",
                "origem",
                "midia",
                "canal",
                "indicacao",
            ],
        );
        classifier.add(columns::LOJA, &["loja", "filial", "unidade", "nomeloja", "empresa"]);
        classifier.add(columns::LOJA_ID, &["lojaid", "idloja", "uuidloja"]);
        classifier.add(
            columns::NUMERO,
            &[
                "numero",
                "numerodocumento",
                "numerovenda",
                "numeroos",
                "numdoc",
                "nrvenda",
                "novenda",
                "noos",
                "nodocumento",
                "nopedido",
                "nordem",
                "os",
                "documento",
                "cupom",
                "pedido",
                "codigovenda",
                "codvenda",
                "codigoos",
            ],
        );
        classifier.add(
            columns::DATA,
            &[
                "data",
                "datavenda",
                "dataemissao",
                "dtvenda",
                "emissao",
                "dataos",
                "dataabertura",
            ],
        );
        classifier.add(
            columns::VALOR_TOTAL,
            &[
                "valortotal",
                "valor",
                "total",
                "vlrtotal",
                "vltotal",
                "valorvenda",
                "totalvenda",
                "valorliquido",
                "valoros",
            ],
        );
        classifier.add(
            columns::VENDEDOR,
            &["vendedor", "vendedora", "atendente", "consultor", "funcionario"],
        );

        classifier
    }

    fn add(&mut self, canonical: &str, patterns: &[&str]) {
        for pattern in patterns {
            self.field_mappings
                .push((pattern.to_string(), canonical.to_string()));
        }
    }

    pub fn add_field_mapping(&mut self, from: &str, to: &str) {
        self.field_mappings
            .insert(0, (self.normalize_field_name(from), to.to_string()));
    }

    pub fn classify_field(&self, field_name: &str, sample_values: &[String]) -> Result<String> {
        let normalized_field = self.normalize_field_name(field_name);
        if normalized_field.is_empty() || self.is_ignored(&normalized_field) {
            return Ok(field_name.to_string());
        }

        // Exact matches first
        for (pattern, canonical) in &self.field_mappings {
            if &normalized_field == pattern {
                return Ok(canonical.clone());
            }
        }

        // Longest contained pattern wins; ties keep registration order
        let mut best: Option<(&String, &String)> = None;
        for (pattern, canonical) in &self.field_mappings {
            if pattern.len() < MIN_CONTAINED_PATTERN || !normalized_field.contains(pattern.as_str()) {
                continue;
            }
            if best.is_none_or(|(current, _)| pattern.len() > current.len()) {
                best = Some((pattern, canonical));
            }
        }
        if let Some((_, canonical)) = best {
            return Ok(canonical.clone());
        }

        // Content-based classification as fallback
        if !sample_values.is_empty() {
            if let Some(classification) = self.classify_by_content(sample_values) {
                return Ok(classification.to_string());
            }
        }

        Ok(field_name.to_string())
    }

    fn normalize_field_name(&self, name: &str) -> String {
        compact_key(name)
    }

    fn is_ignored(&self, normalized: &str) -> bool {
        IGNORED_HEADERS.contains(&normalized)
            || IGNORED_FRAGMENTS
                .iter()
                .any(|fragment| normalized.contains(fragment))
    }

    fn classify_by_content(&self, sample_values: &[String]) -> Option<&'static str> {
        let samples: Vec<&str> = sample_values
            .iter()
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .collect();
        if samples.is_empty() {
            return None;
        }

        let ratio = |check: &dyn Fn(&str) -> bool| {
            samples.iter().filter(|v| check(v)).count() as f64 / samples.len() as f64
        };

        if ratio(&|v| self.looks_like_cpf(v)) >= CONTENT_MATCH_RATIO {
            return Some(columns::CPF);
        }
        if ratio(&|v| self.looks_like_email(v)) >= CONTENT_MATCH_RATIO {
            return Some(columns::EMAIL);
        }
        if ratio(&|v| self.looks_like_phone(v)) >= CONTENT_MATCH_RATIO {
            return Some(columns::TELEFONE);
        }

        None
    }

    fn looks_like_cpf(&self, value: &str) -> bool {
        // No zero padding here: padded numeric ids would pass the checksum by chance
        Cpf::parse(value, false).is_ok()
    }

    fn looks_like_email(&self, value: &str) -> bool {
        value.contains('@') && normalize_email(value).is_ok()
    }

    fn looks_like_phone(&self, value: &str) -> bool {
        let has_layout = value.contains('(') || value.contains('-') || value.contains(' ');
        let digits = value.chars().filter(char::is_ascii_digit).count();
        (has_layout || digits >= 10) && Phone::parse(value, Some("11")).is_ok()
    }

    /// Renames legacy columns to canonical names. Returns the applied
    /// `(original, canonical)` pairs. When two columns classify to the same
    /// canonical name the first keeps it and the other keeps its header.
    pub fn map_to_canonical_schema(&self, df: &mut DataFrame) -> Result<Vec<(String, String)>> {
        let column_names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        let mut taken: HashSet<String> = column_names
            .iter()
            .filter(|name| CANONICAL.contains(&name.as_str()))
            .cloned()
            .collect();
        let mut renamed = Vec::new();

        for col_name in column_names {
            if is_provenance(&col_name) || CANONICAL.contains(&col_name.as_str()) {
                continue;
            }

            let sample_values: Vec<String> = string_values(df, &col_name)?
                .into_iter()
                .flatten()
                .filter(|v| !v.trim().is_empty())
                .take(SAMPLE_SIZE)
                .collect();

            let canonical_name = self.classify_field(&col_name, &sample_values)?;
            if canonical_name == col_name {
                debug!("Column '{}' left unmapped", col_name);
                continue;
            }

            if !taken.insert(canonical_name.clone()) {
                warn!(
                    "Column '{}' also classifies as '{}', keeping the first one",
                    col_name, canonical_name
                );
                continue;
            }

            df.rename(&col_name, canonical_name.as_str().into())?;
            debug!("Column '{}' -> '{}'", col_name, canonical_name);
            renamed.push((col_name, canonical_name));
        }

        Ok(renamed)
    }

    pub fn get_canonical_fields(&self) -> Vec<String> {
        let mut canonical_fields: Vec<String> =
            self.field_mappings.iter().map(|(_, v)| v.clone()).collect();
        canonical_fields.sort();
        canonical_fields.dedup();
        canonical_fields
    }
}

impl Default for FieldClassifier {
    fn default() -> Self {
        Self::new()
    }
}
