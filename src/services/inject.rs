use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Error, Issue, Result};
use crate::model::project::{check_language, ProjectPaths};
use crate::model::unit::TextUnit;
use crate::services::fsio;
use crate::services::merge::{self, MergeReport, TranslationFile};
use crate::services::store::TranslationStore;

#[derive(Debug, Serialize, Clone, Default)]
pub struct FileOutcome {
    /// Translation file, relative to the language directory.
    pub file: String,
    pub written: bool,
    pub report: MergeReport,
}

#[derive(Debug, Serialize, Clone, Default)]
pub struct InjectReport {
    pub language: String,
    pub files: Vec<FileOutcome>,
    pub written: usize,
    pub added: usize,
    pub replaced: usize,
    pub orphaned: usize,
    pub issues: Vec<Issue>,
}

#[derive(Debug, Serialize, Clone, Default)]
pub struct PruneReport {
    pub language: String,
    /// (file, removed block count) for every file that lost blocks.
    pub files: Vec<(String, usize)>,
    pub removed: usize,
    pub issues: Vec<Issue>,
}

#[derive(Debug, Serialize, Clone, Default)]
pub struct FileCheck {
    pub file: String,
    pub blocks: usize,
    pub orphaned: usize,
    pub reserved: usize,
    /// Ids of blocks with no translated statement line.
    pub empty: Vec<String>,
}

#[derive(Debug, Serialize, Clone, Default)]
pub struct ValidationReport {
    pub language: String,
    pub files: Vec<FileCheck>,
    pub blocks: usize,
    pub orphaned: usize,
    pub unreadable: usize,
    pub issues: Vec<Issue>,
}

/// Where the translation file for `source_file` (relative to the game
/// root) lives: `<tl_dir>/<language>/<path relative to source_dir>`.
pub fn translation_path(paths: &ProjectPaths, language: &str, source_file: &str) -> PathBuf {
    let absolute = paths.game_root.join(source_file);
    let relative = absolute
        .strip_prefix(&paths.source_dir)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| PathBuf::from(source_file));

    paths.tl_dir.join(language).join(relative)
}

/// Merges the store's translations into the translation files of
/// `language`, one source file at a time. Translation files whose source
/// has no units left are merged against nothing, so their blocks are
/// flagged as orphans.
pub fn inject(paths: &ProjectPaths, store: &TranslationStore, language: &str) -> Result<InjectReport> {
    let language = check_language(language)?;
    let lang_dir = paths.tl_dir.join(language);
    let mut report = InjectReport {
        language: language.to_string(),
        ..Default::default()
    };

    let mut visited: HashSet<PathBuf> = HashSet::new();
    for (source_file, units) in store.by_file() {
        let target = translation_path(paths, language, source_file);
        merge_file(&lang_dir, &target, &units, language, &mut report)?;
        visited.insert(target);
    }

    for target in language_files(&lang_dir) {
        if !visited.contains(&target) {
            merge_file(&lang_dir, &target, &[], language, &mut report)?;
        }
    }

    info!(
        "inject {language}: {} files written, {} added, {} replaced, {} orphaned",
        report.written, report.added, report.replaced, report.orphaned
    );
    Ok(report)
}

fn merge_file(
    lang_dir: &Path,
    target: &Path,
    units: &[&TextUnit],
    language: &str,
    report: &mut InjectReport,
) -> Result<()> {
    let label = display_path(lang_dir, target);

    let mut file = match read_existing(target) {
        Ok(file) => file,
        Err(e) => {
            warn!("skipping {label}: {e}");
            report.issues.push(e.to_issue(&label, None));
            return Ok(());
        }
    };

    let flagged_before = file.blocks.iter().filter(|b| b.orphaned).count();
    let outcome = merge::merge(std::mem::take(&mut file.blocks), units, language);
    file.blocks = outcome.blocks;
    let flagged_after = file.blocks.iter().filter(|b| b.orphaned).count();

    // A file with no current units is only rewritten to add orphan flags.
    let written = if file.blocks.is_empty() && !target.exists() {
        false
    } else if units.is_empty() && flagged_before == flagged_after {
        false
    } else {
        fsio::write_if_changed(target, file.render(language).as_bytes())?
    };

    let r = &outcome.report;
    debug!(
        "{label}: +{} ~{} ={} kept {} orphaned {}",
        r.added,
        r.replaced,
        r.unchanged,
        r.kept,
        r.orphaned.len()
    );

    report.written += usize::from(written);
    report.added += r.added;
    report.replaced += r.replaced;
    report.orphaned += r.orphaned.len();
    report.files.push(FileOutcome {
        file: label,
        written,
        report: outcome.report,
    });
    Ok(())
}

/// Removes orphan-flagged blocks from every translation file of `language`.
/// This is the only operation that deletes translated text.
pub fn prune_orphans(paths: &ProjectPaths, language: &str) -> Result<PruneReport> {
    let language = check_language(language)?;
    let lang_dir = paths.tl_dir.join(language);
    let mut report = PruneReport {
        language: language.to_string(),
        ..Default::default()
    };

    for path in language_files(&lang_dir) {
        let path = path.as_path();
        let label = display_path(&lang_dir, path);

        let mut file = match read_existing(path) {
            Ok(file) => file,
            Err(e) => {
                warn!("skipping {label}: {e}");
                report.issues.push(e.to_issue(&label, None));
                continue;
            }
        };

        let (kept, removed) = merge::prune(std::mem::take(&mut file.blocks));
        if removed.is_empty() {
            continue;
        }
        file.blocks = kept;
        fsio::write_atomic(path, file.render(&report.language).as_bytes())?;

        info!("{label}: pruned {} orphaned blocks", removed.len());
        report.removed += removed.len();
        report.files.push((label, removed.len()));
    }

    Ok(report)
}

/// Counts the blocks of every translation file of `language` and reports
/// files that cannot be read. Nothing is written.
pub fn validate(paths: &ProjectPaths, language: &str) -> Result<ValidationReport> {
    let language = check_language(language)?;
    let lang_dir = paths.tl_dir.join(language);
    let mut report = ValidationReport {
        language: language.to_string(),
        ..Default::default()
    };

    for path in language_files(&lang_dir) {
        let label = display_path(&lang_dir, &path);

        let file = match read_existing(&path) {
            Ok(file) => file,
            Err(e) => {
                warn!("{label}: {e}");
                report.unreadable += 1;
                report.issues.push(e.to_issue(&label, None));
                continue;
            }
        };

        let mut check = FileCheck {
            file: label,
            blocks: file.blocks.len(),
            ..Default::default()
        };
        for block in &file.blocks {
            if block.is_reserved() {
                check.reserved += 1;
            } else if block.translated_text().is_none() {
                check.empty.push(block.id.clone());
            }
            if block.orphaned {
                check.orphaned += 1;
            }
        }

        report.blocks += check.blocks;
        report.orphaned += check.orphaned;
        report.files.push(check);
    }

    info!(
        "validate {language}: {} files, {} blocks, {} orphaned, {} unreadable",
        report.files.len(),
        report.blocks,
        report.orphaned,
        report.unreadable
    );
    Ok(report)
}

/// Translation files under a language directory, in path order.
fn language_files(lang_dir: &Path) -> Vec<PathBuf> {
    if !lang_dir.is_dir() {
        return Vec::new();
    }

    WalkDir::new(lang_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|x| x == "rpy"))
        .map(|e| e.into_path())
        .collect()
}

/// Parses an existing translation file, or an empty one when absent.
/// Content that is not UTF-8 is refused so it is never overwritten.
fn read_existing(path: &Path) -> Result<TranslationFile> {
    if !path.exists() {
        return Ok(TranslationFile::default());
    }

    let bytes = fs::read(path)?;
    let text = String::from_utf8(bytes).map_err(|_| Error::UnreadableFile {
        path: path.to_path_buf(),
    })?;

    Ok(TranslationFile::parse(&text))
}

fn display_path(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(root: &Path) -> ProjectPaths {
        ProjectPaths {
            game_root: root.to_path_buf(),
            source_dir: root.join("game"),
            tl_dir: root.join("game/tl"),
        }
    }

    #[test]
    fn translation_files_mirror_the_source_tree() {
        let p = paths(Path::new("/g"));
        assert_eq!(
            translation_path(&p, "french", "game/chapters/one.rpy"),
            PathBuf::from("/g/game/tl/french/chapters/one.rpy")
        );
    }

    #[test]
    fn non_utf8_files_are_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let p = paths(dir.path());
        let target = translation_path(&p, "french", "game/script.rpy");
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, b"translate french x:\n    e \"\xff\xfe\"\n").unwrap();

        let store = TranslationStore::new(vec![crate::model::unit::TextUnit {
            id: "script_1_00000000".into(),
            source_file: "game/script.rpy".into(),
            line: 1,
            kind: crate::model::unit::UnitKind::Dialogue,
            original: "Hi".into(),
            translated: Some("Salut".into()),
            context: None,
        }]);

        let report = inject(&p, &store, "french").unwrap();
        assert_eq!(report.written, 0);
        assert_eq!(report.issues[0].kind, crate::error::IssueKind::UnreadableFile);
        assert_eq!(fs::read(&target).unwrap(), b"translate french x:\n    e \"\xff\xfe\"\n");
    }

    #[test]
    fn files_without_current_units_get_their_blocks_orphaned() {
        let dir = tempfile::tempdir().unwrap();
        let p = paths(dir.path());
        let side = translation_path(&p, "french", "game/side.rpy");
        let common = translation_path(&p, "french", "game/common.rpy");
        fs::create_dir_all(side.parent().unwrap()).unwrap();
        fs::write(&side, "# game/side.rpy:2\ntranslate french side_2_00000000:\n\n    e \"Salut\"\n").unwrap();
        let engine = "translate french strings:\n\n    old \"Yes\"\n    new \"Oui\"\n";
        fs::write(&common, engine).unwrap();

        let report = inject(&p, &TranslationStore::default(), "french").unwrap();
        assert_eq!(report.orphaned, 1);
        assert_eq!(report.written, 1);

        let text = fs::read_to_string(&side).unwrap();
        assert!(text.contains("# orphaned: no current source line\n# game/side.rpy:2\n"));
        assert_eq!(fs::read_to_string(&common).unwrap(), engine);

        let again = inject(&p, &TranslationStore::default(), "french").unwrap();
        assert_eq!(again.written, 0);
    }

    #[test]
    fn validation_counts_blocks_and_unreadable_files() {
        let dir = tempfile::tempdir().unwrap();
        let p = paths(dir.path());
        let good = translation_path(&p, "french", "game/script.rpy");
        let bad = translation_path(&p, "french", "game/broken.rpy");
        fs::create_dir_all(good.parent().unwrap()).unwrap();
        fs::write(
            &good,
            "\
# game/script.rpy:2
translate french script_2_00000000:

    e \"Salut\"

# orphaned: no current source line
# game/script.rpy:5
translate french script_5_00000000:

    e \"Adieu\"

translate french script_9_00000000:

    # e \"Untranslated\"

translate french strings:

    old \"Yes\"
    new \"Oui\"
",
        )
        .unwrap();
        fs::write(&bad, b"translate french x:\n    e \"\xff\"\n").unwrap();

        let report = validate(&p, "french").unwrap();
        assert_eq!(report.blocks, 4);
        assert_eq!(report.orphaned, 1);
        assert_eq!(report.unreadable, 1);
        assert_eq!(report.issues[0].file, "broken.rpy");

        let check = &report.files[0];
        assert_eq!(check.file, "script.rpy");
        assert_eq!(check.reserved, 1);
        assert_eq!(check.empty, vec!["script_9_00000000".to_string()]);
    }

    #[test]
    fn language_names_cannot_escape_the_tl_dir() {
        let p = paths(Path::new("/g"));
        assert!(matches!(
            inject(&p, &TranslationStore::default(), "../french"),
            Err(Error::InvalidRequest(_))
        ));
    }
}
