//! Project-level operations: scan, extract, export, import, inject, prune,
//! validate. Everything past extraction works on one target language.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::{Error, Issue, Result};
use crate::model::project::{ProjectInfo, ProjectPaths};
use crate::model::unit::TextUnit;
use crate::parsers::renpy;
use crate::services::encoding;
use crate::services::filter::{self, DropReason, FilterPolicy, Verdict};
use crate::services::formats;
use crate::services::fsio;
use crate::services::ident::IdAssigner;
use crate::services::inject::{self, InjectReport, PruneReport, ValidationReport};
use crate::services::store::{AdoptReport, ImportReport, TranslationStore};

const SCRIPT_EXT: &str = "rpy";

#[derive(Debug, Serialize, Clone, Default)]
pub struct FileExtraction {
    pub units: Vec<TextUnit>,
    pub dropped: BTreeMap<DropReason, usize>,
    pub issues: Vec<Issue>,
}

#[derive(Debug, Serialize, Clone, Default)]
pub struct ExtractReport {
    pub files_scanned: usize,
    pub files_skipped: usize,
    pub units: usize,
    pub dropped: BTreeMap<DropReason, usize>,
    pub issues: Vec<Issue>,
}

#[derive(Debug, Serialize, Clone, Default)]
pub struct ExtractSummary {
    pub language: String,
    pub work_file: String,
    pub extract: ExtractReport,
    pub adopt: AdoptReport,
    /// Copy of the previous work file, made when translations were lost.
    pub backup: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct ExportReport {
    pub language: String,
    pub path: String,
    pub format: String,
    pub units: usize,
}

/// Classifies, filters and identifies the text of one decoded script.
/// `source_file` is the path relative to the game root.
pub fn extract_text(
    source_file: &str,
    text: &str,
    policy: &FilterPolicy,
    ids: &mut IdAssigner,
) -> FileExtraction {
    let parsed = renpy::parse(source_file, text);
    let mut out = FileExtraction {
        issues: parsed.issues,
        ..Default::default()
    };

    for c in parsed.candidates {
        if let Verdict::Drop(reason) = filter::judge(&c.text, policy) {
            debug!("{source_file}:{}: dropped ({reason:?}) {:?}", c.line, c.text);
            *out.dropped.entry(reason).or_default() += 1;
            continue;
        }

        let assigned = ids.assign(source_file, c.line, &c.text);
        if let Some(base) = assigned.collided_with {
            let err = Error::DuplicateId {
                id: base,
                resolved: assigned.id.clone(),
            };
            out.issues.push(err.to_issue(source_file, Some(c.line)));
        }

        out.units.push(TextUnit {
            id: assigned.id,
            source_file: source_file.to_string(),
            line: c.line,
            kind: c.kind,
            original: c.text,
            translated: None,
            context: c.context,
        });
    }

    out
}

/// Script files under the source directory, in path order. Excluded
/// directory names, excluded file-name prefixes and the translations
/// directory are skipped.
pub fn scan_files(project: &ProjectInfo, paths: &ProjectPaths) -> Vec<PathBuf> {
    let skip_dir = |e: &DirEntry| {
        e.depth() > 0
            && e.file_type().is_dir()
            && (e.path() == paths.tl_dir
                || e.file_name()
                    .to_str()
                    .is_some_and(|n| project.exclude_dirs.iter().any(|d| d == n)))
    };

    let mut files = Vec::new();
    for entry in WalkDir::new(&paths.source_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !skip_dir(e))
    {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("scan: {e}");
                continue;
            }
        };

        if !entry.file_type().is_file()
            || entry.path().extension().map_or(true, |x| x != SCRIPT_EXT)
        {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if project.exclude_prefixes.iter().any(|p| !p.is_empty() && name.starts_with(p.as_str())) {
            debug!("scan: excluded {}", entry.path().display());
            continue;
        }

        files.push(entry.into_path());
    }

    files
}

/// Path of a script relative to the game root, `/`-separated.
pub fn source_key(paths: &ProjectPaths, path: &Path) -> String {
    path.strip_prefix(&paths.game_root)
        .or_else(|_| path.strip_prefix(&paths.source_dir))
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Extracts every script of the project into a fresh store. Unreadable
/// files are reported and skipped; a missing game or source directory
/// fails the whole project.
pub fn extract_project(project: &ProjectInfo) -> Result<(TranslationStore, ExtractReport)> {
    let paths = project.paths()?;
    let files = scan_files(project, &paths);
    info!("extract: {} script files under {}", files.len(), paths.source_dir.display());

    let mut ids = IdAssigner::new(project.id_scheme);
    let mut report = ExtractReport::default();
    let mut units = Vec::new();

    for path in files {
        let key = source_key(&paths, &path);
        report.files_scanned += 1;

        let decoded = match encoding::read_text(&path, &project.encodings) {
            Ok(d) => d,
            Err(e) => {
                warn!("{key}: {e}");
                report.files_skipped += 1;
                report.issues.push(e.to_issue(&key, None));
                continue;
            }
        };
        debug!("{key}: decoded as {}", decoded.encoding);

        let mut file = extract_text(&key, &decoded.text, &project.filter, &mut ids);
        for (reason, n) in file.dropped {
            *report.dropped.entry(reason).or_default() += n;
        }
        report.issues.append(&mut file.issues);
        units.append(&mut file.units);
    }

    report.units = units.len();
    info!(
        "extract: {} units from {} files ({} skipped, {} issues)",
        report.units,
        report.files_scanned,
        report.files_skipped,
        report.issues.len()
    );

    Ok((TranslationStore::new(units), report))
}

/// Re-extracts the project, carries previous translations of `language`
/// over and saves its work file.
pub fn extract_and_save(project: &ProjectInfo, language: &str) -> Result<ExtractSummary> {
    let (store, extract) = extract_project(project)?;
    save_extraction(project, language, store, extract)
}

/// Extracts once and refreshes the work file of every given language.
pub fn extract_languages(project: &ProjectInfo, languages: &[String]) -> Result<Vec<ExtractSummary>> {
    let (store, extract) = extract_project(project)?;
    languages
        .iter()
        .map(|language| save_extraction(project, language, store.clone(), extract.clone()))
        .collect()
}

/// The previous work file is backed up first when some of its
/// translations have no current unit.
fn save_extraction(
    project: &ProjectInfo,
    language: &str,
    mut store: TranslationStore,
    extract: ExtractReport,
) -> Result<ExtractSummary> {
    let work = project.work_file(language)?;

    let mut summary = ExtractSummary {
        language: language.trim().to_string(),
        work_file: work.to_string_lossy().to_string(),
        extract,
        ..Default::default()
    };

    if work.exists() {
        let previous = TranslationStore::load(&work)?;
        summary.adopt = store.adopt_translations(&previous);

        if !summary.adopt.lost.is_empty() {
            let backup = backup_path(&work);
            fs::copy(&work, &backup)?;
            warn!(
                "{}: {} translations have no current source line; previous work file kept at {}",
                summary.language,
                summary.adopt.lost.len(),
                backup.display()
            );
            summary.backup = Some(backup.to_string_lossy().to_string());
        }
    }

    store.save(&work)?;
    Ok(summary)
}

pub fn load_store(project: &ProjectInfo, language: &str) -> Result<TranslationStore> {
    let work = project.work_file(language)?;
    if !work.exists() {
        return Err(Error::InvalidRequest(format!(
            "no work file at {}; run extract first",
            work.display()
        )));
    }
    TranslationStore::load(&work)
}

pub fn export(
    project: &ProjectInfo,
    language: &str,
    format: &str,
    output: Option<&Path>,
) -> Result<ExportReport> {
    let format = formats::format_for(format)?;
    let store = load_store(project, language)?;
    let language = language.trim();

    let path = match output {
        Some(p) => p.to_path_buf(),
        None => Path::new(&project.project_path)
            .join(format!("translation_export.{language}.{}", format.extension())),
    };

    let text = format.export(store.units())?;
    fsio::write_atomic(&path, text.as_bytes())?;
    info!("export {language}: {} units to {}", store.len(), path.display());

    Ok(ExportReport {
        language: language.to_string(),
        path: path.to_string_lossy().to_string(),
        format: format.name().to_string(),
        units: store.len(),
    })
}

/// Applies an edited export back onto the work file of `language`.
pub fn import(project: &ProjectInfo, language: &str, format: &str, input: &Path) -> Result<ImportReport> {
    let format = formats::format_for(format)?;
    let mut store = load_store(project, language)?;

    let decoded = encoding::read_text(input, &project.encodings)?;
    let records = format.import(&decoded.text)?;

    let report = store.apply_import(records);
    store.save(&project.work_file(language)?)?;
    Ok(report)
}

pub fn inject(project: &ProjectInfo, language: &str) -> Result<InjectReport> {
    let paths = project.paths()?;
    let store = load_store(project, language)?;
    inject::inject(&paths, &store, language)
}

pub fn prune_orphans(project: &ProjectInfo, language: &str) -> Result<PruneReport> {
    let paths = project.paths()?;
    inject::prune_orphans(&paths, language)
}

pub fn validate(project: &ProjectInfo, language: &str) -> Result<ValidationReport> {
    let paths = project.paths()?;
    inject::validate(&paths, language)
}

/// First free name of `<work>.bak`, `<work>.bak.2`, `<work>.bak.3`, ...
fn backup_path(path: &Path) -> PathBuf {
    let numbered = |n: usize| {
        let mut p = path.as_os_str().to_owned();
        if n == 1 {
            p.push(".bak");
        } else {
            p.push(format!(".bak.{n}"));
        }
        PathBuf::from(p)
    };

    (1..)
        .map(&numbered)
        .find(|p| !p.exists())
        .unwrap_or_else(|| numbered(1))
}
