//! The project's record set, persisted as the canonical interchange file.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Issue, Result};
use crate::model::unit::{TextUnit, UnitKind};
use crate::services::fsio;

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct TranslationStore {
    units: Vec<TextUnit>,
}

#[derive(Debug, Serialize, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub updated: usize,
    pub unchanged: usize,
    pub skipped_empty: usize,
    /// Imported ids with no unit in the store.
    pub orphaned: Vec<String>,
    pub issues: Vec<Issue>,
}

#[derive(Debug, Serialize, Clone, Default, PartialEq, Eq)]
pub struct AdoptReport {
    /// Carried over by id.
    pub adopted: usize,
    /// Carried over by file and text after the id moved.
    pub rematched: usize,
    /// Previously translated ids that no current unit took over.
    pub lost: Vec<String>,
    pub issues: Vec<Issue>,
}

#[derive(Debug, Serialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub total: usize,
    pub translated: usize,
}

#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct Statistics {
    pub total: usize,
    pub translated: usize,
    pub untranslated: usize,
    pub percent: f64,
    pub by_kind: BTreeMap<UnitKind, Progress>,
    pub by_file: BTreeMap<String, Progress>,
}

impl TranslationStore {
    pub fn new(units: Vec<TextUnit>) -> Self {
        TranslationStore { units }
    }

    pub fn units(&self) -> &[TextUnit] {
        &self.units
    }

    pub fn into_units(self) -> Vec<TextUnit> {
        self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&TextUnit> {
        self.units.iter().find(|u| u.id == id)
    }

    /// Units grouped by source file, each group in ascending line order.
    pub fn by_file(&self) -> BTreeMap<&str, Vec<&TextUnit>> {
        let mut out: BTreeMap<&str, Vec<&TextUnit>> = BTreeMap::new();
        for u in &self.units {
            out.entry(u.source_file.as_str()).or_default().push(u);
        }
        for group in out.values_mut() {
            group.sort_by_key(|u| u.line);
        }
        out
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fsio::write_atomic(path, json.as_bytes())
    }

    /// Sparse update by id. Records without a translation never erase one,
    /// units missing from `imported` keep their value, and ids the store
    /// does not know are reported.
    pub fn apply_import(&mut self, imported: Vec<TextUnit>) -> ImportReport {
        let index: HashMap<String, usize> = self
            .units
            .iter()
            .enumerate()
            .map(|(i, u)| (u.id.clone(), i))
            .collect();

        let mut report = ImportReport::default();

        for record in imported {
            let Some(&i) = index.get(&record.id) else {
                let err = Error::OrphanedTranslationId {
                    id: record.id.clone(),
                    file: record.source_file.clone(),
                };
                warn!("{err}");
                report.issues.push(err.to_issue(&record.source_file, Some(record.line)));
                report.orphaned.push(record.id);
                continue;
            };

            let Some(text) = record.translation() else {
                report.skipped_empty += 1;
                continue;
            };

            let unit = &mut self.units[i];
            if unit.translated.as_deref() == Some(text) {
                report.unchanged += 1;
            } else {
                unit.translated = Some(text.to_string());
                report.updated += 1;
            }
        }

        info!(
            "import: {} updated, {} unchanged, {} empty, {} orphaned",
            report.updated,
            report.unchanged,
            report.skipped_empty,
            report.orphaned.len()
        );
        report
    }

    /// Carries translations from a previous extraction into this one.
    ///
    /// Units are matched by id first. A unit whose id changed only because
    /// its line moved is matched by (file, kind, original) when exactly one
    /// unclaimed previous translation has that key.
    pub fn adopt_translations(&mut self, previous: &TranslationStore) -> AdoptReport {
        let mut report = AdoptReport::default();

        let translated: Vec<&TextUnit> =
            previous.units.iter().filter(|u| u.is_translated()).collect();
        let by_id: HashMap<&str, &TextUnit> =
            translated.iter().map(|&u| (u.id.as_str(), u)).collect();
        let mut claimed: HashMap<&str, bool> =
            translated.iter().map(|&u| (u.id.as_str(), false)).collect();

        for unit in self.units.iter_mut() {
            if let Some(prev) = by_id.get(unit.id.as_str()) {
                if !unit.is_translated() {
                    unit.translated = prev.translated.clone();
                }
                claimed.insert(prev.id.as_str(), true);
                report.adopted += 1;
            }
        }

        let current_ids: HashSet<&str> = self.units.iter().map(|u| u.id.as_str()).collect();
        let mut by_content: HashMap<(&str, UnitKind, &str), Vec<usize>> = HashMap::new();
        for (i, prev) in translated.iter().enumerate() {
            if !current_ids.contains(prev.id.as_str()) {
                by_content
                    .entry((prev.source_file.as_str(), prev.kind, prev.original.as_str()))
                    .or_default()
                    .push(i);
            }
        }

        for unit in self.units.iter_mut().filter(|u| !u.is_translated()) {
            let key = (unit.source_file.as_str(), unit.kind, unit.original.as_str());
            let Some(&[i]) = by_content.get(&key).map(Vec::as_slice) else {
                continue;
            };
            let prev = translated[i];
            if claimed.get(prev.id.as_str()) == Some(&false) {
                unit.translated = prev.translated.clone();
                claimed.insert(prev.id.as_str(), true);
                report.rematched += 1;
            }
        }

        for prev in translated {
            if claimed.get(prev.id.as_str()) == Some(&false) {
                let err = Error::OrphanedTranslationId {
                    id: prev.id.clone(),
                    file: prev.source_file.clone(),
                };
                warn!("{err}");
                report.issues.push(err.to_issue(&prev.source_file, Some(prev.line)));
                report.lost.push(prev.id.clone());
            }
        }

        report
    }

    pub fn stats(&self) -> Statistics {
        let mut s = Statistics::default();

        for u in &self.units {
            let done = usize::from(u.is_translated());
            for p in [
                s.by_kind.entry(u.kind).or_default(),
                s.by_file.entry(u.source_file.clone()).or_default(),
            ] {
                p.total += 1;
                p.translated += done;
            }
            s.translated += done;
        }

        s.total = self.units.len();
        s.untranslated = s.total - s.translated;
        s.percent = if s.total == 0 {
            0.0
        } else {
            (s.translated as f64 * 10000.0 / s.total as f64).round() / 100.0
        };
        s
    }
}
