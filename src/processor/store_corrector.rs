use anyhow::Result;
use polars::prelude::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};
use uuid::Uuid;

use super::text::{contains_words, normalize_text};
use crate::config::MigrationConfig;
use crate::models::columns::{LOJA, LOJA_ID, LOJA_ORIGEM};
use crate::models::frame::{row_refs, set_string_column, string_values};
use crate::report::{DiagnosticLog, IssueKind};

#[derive(Debug, Clone)]
struct StoreEntry {
    id: Uuid,
    code: String,
    /// Normalized code, name and aliases.
    keys: Vec<String>,
}

/// Known stores and the id substitutions to apply to them.
#[derive(Debug, Clone)]
pub struct StoreDirectory {
    entries: Vec<StoreEntry>,
    known_ids: HashSet<Uuid>,
    corrections: HashMap<Uuid, Uuid>,
}

impl StoreDirectory {
    pub fn from_config(config: &MigrationConfig) -> Result<Self> {
        let entries: Vec<StoreEntry> = config
            .stores
            .iter()
            .map(|store| {
                let mut keys: Vec<String> = std::iter::once(&store.code)
                    .chain(std::iter::once(&store.name))
                    .chain(store.aliases.iter())
                    .map(|k| normalize_text(k))
                    .filter(|k| !k.is_empty())
                    .collect();
                keys.dedup();
                StoreEntry {
                    id: store.id,
                    code: store.code.clone(),
                    keys,
                }
            })
            .collect();

        let corrections = config.correction_map()?;
        let mut known_ids: HashSet<Uuid> = entries.iter().map(|e| e.id).collect();
        known_ids.extend(corrections.values().copied());

        Ok(Self {
            entries,
            known_ids,
            corrections,
        })
    }

    /// Ids present in `core.lojas` but absent from the configuration.
    pub fn add_known_ids(&mut self, ids: impl IntoIterator<Item = Uuid>) {
        self.known_ids.extend(ids);
    }

    pub fn known_ids(&self) -> &HashSet<Uuid> {
        &self.known_ids
    }

    pub fn by_code(&self, code: &str) -> Option<Uuid> {
        self.entries.iter().find(|e| e.code == code).map(|e| e.id)
    }

    /// Matches free text such as "Loja Centro" or "FILIAL NORTE - SP" against
    /// store codes, names and aliases. Exact first, then the longest key
    /// found as whole words.
    pub fn resolve_text(&self, text: &str) -> Option<Uuid> {
        let normalized = normalize_text(text);
        if normalized.is_empty() {
            return None;
        }

        if let Some(entry) = self
            .entries
            .iter()
            .find(|e| e.keys.iter().any(|k| *k == normalized))
        {
            return Some(entry.id);
        }

        let mut best: Option<(usize, Uuid)> = None;
        for entry in &self.entries {
            for key in &entry.keys {
                if contains_words(&normalized, key)
                    && best.is_none_or(|(len, _)| key.len() > len)
                {
                    best = Some((key.len(), entry.id));
                }
            }
        }
        best.map(|(_, id)| id)
    }

    /// Applies the configured substitution, if any.
    pub fn correct(&self, id: Uuid) -> Uuid {
        self.corrections.get(&id).copied().unwrap_or(id)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CorrectionStats {
    pub resolved: usize,
    pub corrected: usize,
    pub unknown: usize,
}

/// Writes the final `loja_id` of every row.
pub struct StoreCorrector<'a> {
    directory: &'a StoreDirectory,
}

impl<'a> StoreCorrector<'a> {
    pub fn new(directory: &'a StoreDirectory) -> Self {
        Self { directory }
    }

    /// Resolution order: an explicit `loja_id` (a UUID, or text naming a
    /// store), then the free-text `loja` column, then the store the file
    /// belongs to. An explicit value that names no store is reported and the
    /// row is left without a store.
    pub fn apply(&self, df: &mut DataFrame, log: &mut DiagnosticLog) -> Result<CorrectionStats> {
        let rows = row_refs(df)?;
        let explicit_ids = string_values(df, LOJA_ID)?;
        let store_names = string_values(df, LOJA)?;
        let file_stores = string_values(df, LOJA_ORIGEM)?;

        let mut stats = CorrectionStats::default();
        let mut resolved: Vec<Option<String>> = Vec::with_capacity(df.height());

        for i in 0..df.height() {
            let candidate = if let Some(raw) = explicit_ids[i].as_deref() {
                let found = Uuid::parse_str(raw.trim())
                    .ok()
                    .or_else(|| self.directory.resolve_text(raw));
                if found.is_none() {
                    log.record(&rows[i], LOJA_ID, raw, IssueKind::UnknownStore, "no store matches this id");
                }
                found
            } else if let Some(raw) = store_names[i].as_deref() {
                let found = self.directory.resolve_text(raw);
                if found.is_none() {
                    log.record(
                        &rows[i],
                        LOJA,
                        raw,
                        IssueKind::UnknownStore,
                        "no store code, name or alias matches",
                    );
                }
                found
            } else {
                file_stores[i]
                    .as_deref()
                    .and_then(|code| self.directory.by_code(code))
            };

            let id = candidate.map(|id| {
                let corrected = self.directory.correct(id);
                if corrected != id {
                    stats.corrected += 1;
                }
                corrected
            });

            match id {
                Some(id) if !self.directory.known_ids().contains(&id) => {
                    log.record(
                        &rows[i],
                        LOJA_ID,
                        &id.to_string(),
                        IssueKind::UnknownStore,
                        "id not present in core.lojas",
                    );
                    stats.unknown += 1;
                    resolved.push(None);
                }
                Some(id) => {
                    stats.resolved += 1;
                    resolved.push(Some(id.to_string()));
                }
                None => {
                    stats.unknown += 1;
                    resolved.push(None);
                }
            }
        }

        set_string_column(df, LOJA_ID, resolved)?;

        if stats.unknown > 0 {
            warn!("{} rows without a known store", stats.unknown);
        }
        info!(
            "Stores resolved for {} rows ({} ids corrected)",
            stats.resolved, stats.corrected
        );

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::columns::{ARQUIVO, LINHA};

    const CENTRO: &str = "6f1c2a52-0d7e-4a43-9f7e-2b1d3c4e5f60";
    const NORTE: &str = "a3b4c5d6-1e2f-4a5b-8c9d-0e1f2a3b4c5d";
    const NORTE_NOVA: &str = "c0ffee00-1234-4abc-9def-0123456789ab";
    const ANTIGA: &str = "deadbeef-0000-4000-8000-000000000001";

    fn config() -> MigrationConfig {
        let toml = format!(
            r#"
            [channels]
            catalog = "canais.toml"

            [[stores]]
            code = "centro"
            name = "Loja Centro"
            id = "{CENTRO}"
            aliases = ["matriz"]

            [[stores]]
            code = "norte"
            name = "Loja Zona Norte"
            id = "{NORTE}"

            [[store_corrections]]
            from = "{NORTE}"
            to = "{NORTE_NOVA}"
            reason = "store re-registered after failed import"

            [[store_corrections]]
            from = "{ANTIGA}"
            to = "{CENTRO}"
            "#
        );
        MigrationConfig::from_toml_str(&toml, ".").unwrap()
    }

    fn uuid(s: &str) -> Uuid {
        Uuid::parse_str(s).unwrap()
    }

    #[test]
    fn test_resolve_text() {
        let directory = StoreDirectory::from_config(&config()).unwrap();

        assert_eq!(directory.resolve_text("CENTRO"), Some(uuid(CENTRO)));
        assert_eq!(directory.resolve_text("Matriz"), Some(uuid(CENTRO)));
        assert_eq!(directory.resolve_text("loja zona norte - SP"), Some(uuid(NORTE)));
        assert_eq!(directory.resolve_text("Loja Sul"), None);
        assert_eq!(directory.resolve_text(""), None);
    }

    #[test]
    fn test_corrections_and_known_ids() {
        let directory = StoreDirectory::from_config(&config()).unwrap();

        assert_eq!(directory.correct(uuid(NORTE)), uuid(NORTE_NOVA));
        assert_eq!(directory.correct(uuid(CENTRO)), uuid(CENTRO));
        assert!(directory.known_ids().contains(&uuid(NORTE_NOVA)));
    }

    #[test]
    fn test_apply() {
        let directory = StoreDirectory::from_config(&config()).unwrap();
        let mut df = DataFrame::new(vec![
            Series::new(ARQUIVO.into(), vec!["a.csv"; 5]).into(),
            Series::new(LINHA.into(), vec!["2", "3", "4", "5", "6"]).into(),
            Series::new(LOJA_ORIGEM.into(), vec!["centro"; 5]).into(),
            Series::new(
                LOJA_ID.into(),
                vec![None, Some(ANTIGA), None, None, Some("999")],
            )
            .into(),
            Series::new(
                LOJA.into(),
                vec![None, None, Some("Loja Zona Norte"), Some("Loja Sul"), None],
            )
            .into(),
        ])
        .unwrap();
        let mut log = DiagnosticLog::new();

        let stats = StoreCorrector::new(&directory).apply(&mut df, &mut log).unwrap();

        let ids = string_values(&df, LOJA_ID).unwrap();
        assert_eq!(ids[0].as_deref(), Some(CENTRO));
        // ANTIGA is substituted by CENTRO
        assert_eq!(ids[1].as_deref(), Some(CENTRO));
        assert_eq!(ids[2].as_deref(), Some(NORTE_NOVA));
        assert_eq!(ids[3], None);
        assert_eq!(ids[4], None);

        assert_eq!(stats.resolved, 3);
        assert_eq!(stats.corrected, 2);
        assert_eq!(stats.unknown, 2);
        assert_eq!(log.count(IssueKind::UnknownStore), 2);
    }

    #[test]
    fn test_database_ids_are_known() {
        let mut directory = StoreDirectory::from_config(&config()).unwrap();
        let extra = Uuid::new_v4();
        assert!(!directory.known_ids().contains(&extra));
        directory.add_known_ids([extra]);
        assert!(directory.known_ids().contains(&extra));
    }
}
