use anyhow::Result;
use polars::prelude::*;
use std::collections::HashMap;
use strsim::jaro_winkler;
use tracing::{info, warn};
use uuid::Uuid;

use super::text::{contains_words, normalize_text};
use crate::config::ChannelCatalog;
use crate::models::columns::{CANAL_ID, COMO_CONHECEU};
use crate::models::frame::{clean_text, row_refs, set_string_column, string_values};
use crate::report::{DiagnosticLog, IssueKind, UnmappedChannel};

/// Answers that mean "no answer".
const PLACEHOLDERS: &[&str] = &[
    "nao",
    "nao sei",
    "nao informado",
    "nao informou",
    "nao lembra",
    "sem informacao",
    "nenhum",
    "n a",
    "na",
    "x",
    "xx",
    "xxx",
    "0",
    "null",
];

/// How a free-text answer was matched to a channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChannelMatch {
    Exact(Uuid),
    Contained(Uuid),
    Similar(Uuid, f64),
    /// Nothing matched; carries the catalog fallback channel, if any.
    Fallback(Option<Uuid>),
    Blank,
}

impl ChannelMatch {
    pub fn channel_id(&self) -> Option<Uuid> {
        match self {
            ChannelMatch::Exact(id) | ChannelMatch::Contained(id) | ChannelMatch::Similar(id, _) => {
                Some(*id)
            }
            ChannelMatch::Fallback(id) => *id,
            ChannelMatch::Blank => None,
        }
    }

    pub fn is_unmapped(&self) -> bool {
        matches!(self, ChannelMatch::Fallback(_))
    }
}

pub struct ChannelMapper {
    /// (normalized name or alias, channel id), catalog order.
    keys: Vec<(String, Uuid)>,
    fallback: Option<Uuid>,
    similarity_threshold: f64,
}

impl ChannelMapper {
    pub fn new(catalog: &ChannelCatalog, similarity_threshold: f64) -> Self {
        let mut keys = Vec::new();
        for canal in &catalog.canais {
            for name in std::iter::once(&canal.nome).chain(canal.aliases.iter()) {
                let key = normalize_text(name);
                if !key.is_empty() && !keys.iter().any(|(k, _)| *k == key) {
                    keys.push((key, canal.id));
                }
            }
        }

        Self {
            keys,
            fallback: catalog.fallback_id(),
            similarity_threshold,
        }
    }

    pub fn classify(&self, raw: &str) -> ChannelMatch {
        let normalized = normalize_text(raw);
        if normalized.is_empty() || PLACEHOLDERS.contains(&normalized.as_str()) {
            return ChannelMatch::Blank;
        }

        if let Some((_, id)) = self.keys.iter().find(|(key, _)| *key == normalized) {
            return ChannelMatch::Exact(*id);
        }

        // "indicacao de um amigo" contains the alias "amigo"
        let mut contained: Option<(&String, Uuid)> = None;
        for (key, id) in &self.keys {
            if contains_words(&normalized, key)
                && contained.is_none_or(|(best, _)| key.len() > best.len())
            {
                contained = Some((key, *id));
            }
        }
        if let Some((_, id)) = contained {
            return ChannelMatch::Contained(id);
        }

        // Typos such as "instagran" or "facebok"
        let mut similar: Option<(f64, Uuid)> = None;
        for (key, id) in &self.keys {
            let score = jaro_winkler(&normalized, key);
            if score >= self.similarity_threshold && similar.is_none_or(|(best, _)| score > best) {
                similar = Some((score, *id));
            }
        }
        if let Some((score, id)) = similar {
            return ChannelMatch::Similar(id, score);
        }

        ChannelMatch::Fallback(self.fallback)
    }

    /// Fills `canal_id` from `como_conheceu`. Returns how many rows fell back.
    pub fn map_dataframe(&self, df: &mut DataFrame, log: &mut DiagnosticLog) -> Result<usize> {
        let rows = row_refs(df)?;
        let answers = string_values(df, COMO_CONHECEU)?;

        let mut unmapped = 0;
        let mut similar = 0;
        let ids: Vec<Option<String>> = answers
            .iter()
            .enumerate()
            .map(|(i, answer)| {
                let Some(answer) = clean_text(answer.as_deref()) else {
                    return None;
                };
                let matched = self.classify(&answer);
                match matched {
                    ChannelMatch::Similar(..) => similar += 1,
                    ChannelMatch::Fallback(fallback) => {
                        unmapped += 1;
                        let detalhe = if fallback.is_some() {
                            "no channel matched; fallback channel assigned"
                        } else {
                            "no channel matched"
                        };
                        log.record(&rows[i], COMO_CONHECEU, &answer, IssueKind::UnmappedChannel, detalhe);
                    }
                    _ => {}
                }
                matched.channel_id().map(|id| id.to_string())
            })
            .collect();

        set_string_column(df, CANAL_ID, ids)?;

        if unmapped > 0 {
            warn!("{} channel answers did not match the catalog", unmapped);
        }
        info!(
            "Channels mapped for {} rows ({} by similarity)",
            answers.iter().filter(|a| a.is_some()).count() - unmapped,
            similar
        );

        Ok(unmapped)
    }

    /// Distinct answers that no channel matched, most frequent first.
    pub fn unmapped_values(&self, df: &DataFrame) -> Result<Vec<UnmappedChannel>> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for answer in string_values(df, COMO_CONHECEU)?.iter() {
            let Some(answer) = clean_text(answer.as_deref()) else {
                continue;
            };
            if self.classify(&answer).is_unmapped() {
                *counts.entry(answer).or_insert(0) += 1;
            }
        }

        let mut unmapped: Vec<UnmappedChannel> = counts
            .into_iter()
            .map(|(valor, ocorrencias)| UnmappedChannel { valor, ocorrencias })
            .collect();
        unmapped.sort_by(|a, b| {
            b.ocorrencias
                .cmp(&a.ocorrencias)
                .then_with(|| a.valor.cmp(&b.valor))
        });

        Ok(unmapped)
    }
}
