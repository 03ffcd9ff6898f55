use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use uuid::Uuid;

/// Acquisition channels from `marketing.canais_aquisicao` plus the free-text
/// aliases legacy systems used for them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelCatalog {
    /// Name of the channel that absorbs unrecognized answers.
    pub fallback: Option<String>,
    #[serde(default)]
    pub canais: Vec<ChannelEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelEntry {
    pub id: Uuid,
    pub nome: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl ChannelCatalog {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read channel catalog: {}", path.display()))?;
        let catalog: ChannelCatalog = toml::from_str(&content)
            .with_context(|| format!("Failed to parse channel catalog: {}", path.display()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn validate(&self) -> Result<()> {
        let mut ids = HashSet::new();
        for canal in &self.canais {
            if !ids.insert(canal.id) {
                return Err(anyhow!("Duplicate channel id in catalog: {}", canal.id));
            }
        }

        if let Some(fallback) = &self.fallback {
            if self.find_by_name(fallback).is_none() {
                return Err(anyhow!("Fallback channel '{}' is not in the catalog", fallback));
            }
        }

        Ok(())
    }

    pub fn find_by_name(&self, name: &str) -> Option<&ChannelEntry> {
        self.canais
            .iter()
            .find(|c| c.nome.eq_ignore_ascii_case(name.trim()))
    }

    pub fn fallback_id(&self) -> Option<Uuid> {
        self.fallback
            .as_deref()
            .and_then(|name| self.find_by_name(name))
            .map(|c| c.id)
    }

    pub fn ids(&self) -> HashSet<Uuid> {
        self.canais.iter().map(|c| c.id).collect()
    }

    /// Adds channels that exist in the database but not in the catalog file.
    /// Known ids keep their configured aliases.
    pub fn merge_database_channels(&mut self, channels: &[(Uuid, String)]) {
        for (id, nome) in channels {
            if self.canais.iter().any(|c| c.id == *id) {
                continue;
            }
            self.canais.push(ChannelEntry {
                id: *id,
                nome: nome.clone(),
                aliases: Vec::new(),
            });
        }
    }
}
