use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::info;

use crate::models::CustomerRecord;
use crate::models::columns::{DATA_NASCIMENTO, EMAIL, NOME};
use crate::report::{DiagnosticLog, IssueKind};

#[derive(Debug, Clone, Default, Serialize)]
pub struct DedupStats {
    pub input: usize,
    pub output: usize,
    /// Rows folded into another row with the same CPF.
    pub merged_rows: usize,
    pub groups_with_duplicates: usize,
    pub conflicts: usize,
    pub without_cpf: usize,
}

/// Collapses customers that share a CPF into one record.
///
/// Within a group the most recent `data_cadastro` wins; undated rows and
/// ties keep source order. Every field takes the first non-null value in
/// that order and phones from all rows are kept.
#[derive(Debug, Default)]
pub struct Deduplicator;

impl Deduplicator {
    pub fn new() -> Self {
        Self
    }

    pub fn dedupe(
        &self,
        records: Vec<CustomerRecord>,
        log: &mut DiagnosticLog,
    ) -> (Vec<CustomerRecord>, DedupStats) {
        let mut stats = DedupStats {
            input: records.len(),
            ..Default::default()
        };

        // Slots keep the position of the first occurrence of each CPF
        let mut slots: Vec<Vec<CustomerRecord>> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for record in records {
            match record.cpf.clone() {
                Some(cpf) => match index.get(&cpf) {
                    Some(&slot) => slots[slot].push(record),
                    None => {
                        index.insert(cpf, slots.len());
                        slots.push(vec![record]);
                    }
                },
                None => {
                    stats.without_cpf += 1;
                    slots.push(vec![record]);
                }
            }
        }

        let mut output = Vec::with_capacity(slots.len());
        for group in slots {
            if group.len() == 1 {
                output.extend(group);
                continue;
            }
            stats.groups_with_duplicates += 1;
            stats.merged_rows += group.len() - 1;
            output.push(self.merge_group(group, log, &mut stats));
        }

        stats.output = output.len();
        info!(
            "Dedup: {} rows -> {} customers ({} duplicate rows merged, {} conflicts)",
            stats.input, stats.output, stats.merged_rows, stats.conflicts
        );

        (output, stats)
    }

    fn merge_group(
        &self,
        mut group: Vec<CustomerRecord>,
        log: &mut DiagnosticLog,
        stats: &mut DedupStats,
    ) -> CustomerRecord {
        // Stable: equal dates keep source order, undated rows go last
        group.sort_by(|a, b| match (a.data_cadastro, b.data_cadastro) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });

        let cpf = group[0].cpf.clone().unwrap_or_default();
        self.report_conflict(&group, NOME, |r| r.nome.clone(), &cpf, log, stats);
        self.report_conflict(&group, EMAIL, |r| r.email.clone(), &cpf, log, stats);
        self.report_conflict(
            &group,
            DATA_NASCIMENTO,
            |r| r.data_nascimento.map(|d| d.to_string()),
            &cpf,
            log,
            stats,
        );

        let mut winner = group.remove(0);
        for other in group {
            log.record(
                &other.origem,
                "cpf",
                &cpf,
                IssueKind::DuplicateCpf,
                format!(
                    "merged into {}:{}",
                    winner.origem.arquivo,
                    winner.origem.linha.map(|l| l.to_string()).unwrap_or_default()
                ),
            );

            winner.nome = winner.nome.or(other.nome);
            winner.email = winner.email.or(other.email);
            winner.data_nascimento = winner.data_nascimento.or(other.data_nascimento);
            winner.data_cadastro = winner.data_cadastro.or(other.data_cadastro);
            winner.loja_id = winner.loja_id.or(other.loja_id);
            winner.canal_id = winner.canal_id.or(other.canal_id);
            winner.como_conheceu = winner.como_conheceu.or(other.como_conheceu);
            for phone in other.telefones {
                if !winner.telefones.contains(&phone) {
                    winner.telefones.push(phone);
                }
            }
        }

        winner
    }

    fn report_conflict<F>(
        &self,
        group: &[CustomerRecord],
        campo: &str,
        value: F,
        cpf: &str,
        log: &mut DiagnosticLog,
        stats: &mut DedupStats,
    ) where
        F: Fn(&CustomerRecord) -> Option<String>,
    {
        let distinct: BTreeSet<String> = group
            .iter()
            .filter_map(&value)
            .map(|v| v.to_lowercase())
            .collect();
        if distinct.len() < 2 {
            return;
        }

        stats.conflicts += 1;
        let kept = group.iter().find_map(&value).unwrap_or_default();
        log.record(
            &group[0].origem,
            campo,
            &distinct.into_iter().collect::<Vec<_>>().join(" | "),
            IssueKind::Conflict,
            format!("CPF {} has different values; kept '{}'", cpf, kept),
        );
    }
}
