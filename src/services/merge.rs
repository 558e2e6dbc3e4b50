//! Engine-native translation files and the incremental merge over them.
//!
//! A translation file is a sequence of blocks:
//!
//! ```text
//! # game/script.rpy:12
//! translate french script_12_1a2b3c4d:
//!
//!     # eileen "Hello, world!"
//!     eileen "Bonjour !"
//! ```
//!
//! [`merge`] is pure. Reading and writing files lives in `inject`.

use std::collections::{HashMap, HashSet};

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::model::unit::{TextUnit, UnitKind};
use crate::parsers::renpy::{self, LineScope};

pub const BANNER: &str = "# TranslationFile generated by renpy-tl-core";
pub const ORPHAN_MARK: &str = "# orphaned: no current source line";

const INDENT: &str = "    ";
const REPLACED_PREFIX: &str = "# replaced: ";

/// Block names the engine uses for non-dialogue translation; they never
/// correspond to a unit and are never flagged.
const RESERVED_IDS: &[&str] = &["strings", "python", "style"];

lazy_static! {
    static ref HEADER_RE: Regex = Regex::new(r"^translate\s+(\S+)\s+(\S+(?:\s+\S+)*?)\s*:\s*$").unwrap();
    static ref SOURCE_RE: Regex = Regex::new(r"^#\s*(\S(?:.*\S)?\.rpym?):(\d+)\s*$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    pub file: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationBlock {
    pub language: String,
    pub id: String,
    pub source: Option<SourceRef>,
    pub orphaned: bool,
    /// Column-0 lines above the block that are not ours, kept as found.
    pub leading: Vec<String>,
    /// Body lines exactly as in the file, without surrounding blank lines.
    pub body: Vec<String>,
}

impl TranslationBlock {
    pub fn is_reserved(&self) -> bool {
        let head = self.id.split_whitespace().next().unwrap_or("");
        RESERVED_IDS.contains(&head)
    }

    /// The translated text carried by the block's statement line.
    pub fn translated_text(&self) -> Option<String> {
        let statement = self
            .body
            .iter()
            .rev()
            .map(|l| l.trim())
            .find(|l| !l.is_empty() && !l.starts_with('#'))?;

        renpy::classify_line(statement, LineScope::default())
            .ok()?
            .text()
            .map(str::to_string)
    }

    fn for_unit(unit: &TextUnit, text: &str, language: &str, replaced: Option<&str>) -> Self {
        let speaker = match (unit.kind, unit.context.as_deref()) {
            (UnitKind::Dialogue, Some(s)) if renpy::is_speaker(s) => format!("{s} "),
            _ => String::new(),
        };

        let mut body = vec![format!(
            "{INDENT}# {speaker}{}",
            renpy::quote(&unit.original)
        )];
        if let Some(prev) = replaced {
            body.push(format!("{INDENT}{REPLACED_PREFIX}{}", renpy::quote(prev)));
        }
        body.push(format!("{INDENT}{speaker}{}", renpy::quote(text)));

        TranslationBlock {
            language: language.to_string(),
            id: unit.id.clone(),
            source: Some(SourceRef {
                file: unit.source_file.clone(),
                line: unit.line,
            }),
            orphaned: false,
            leading: Vec::new(),
            body,
        }
    }

    fn render_into(&self, out: &mut Vec<String>) {
        out.extend(self.leading.iter().cloned());
        if self.orphaned {
            out.push(ORPHAN_MARK.to_string());
        }
        if let Some(src) = &self.source {
            out.push(format!("# {}:{}", src.file, src.line));
        }
        out.push(format!("translate {} {}:", self.language, self.id));
        out.push(String::new());
        out.extend(self.body.iter().cloned());
        out.push(String::new());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationFile {
    /// Foreign header lines, such as an engine-generated timestamp.
    pub preamble: Vec<String>,
    pub blocks: Vec<TranslationBlock>,
    /// Column-0 lines after the last block.
    pub epilogue: Vec<String>,
}

impl TranslationFile {
    pub fn parse(text: &str) -> Self {
        let mut file = TranslationFile::default();
        let mut pending: Vec<String> = Vec::new();
        let mut current: Option<TranslationBlock> = None;

        for raw in text.trim_start_matches('\u{feff}').lines() {
            let line = raw.trim_end_matches('\r');

            if let Some(caps) = HEADER_RE.captures(line) {
                if let Some(block) = current.take() {
                    file.blocks.push(finish(block));
                }
                let mut block = TranslationBlock {
                    language: caps[1].to_string(),
                    id: caps[2].to_string(),
                    source: None,
                    orphaned: false,
                    leading: Vec::new(),
                    body: Vec::new(),
                };
                let leading = take_markers(&mut pending, &mut block);
                if file.blocks.is_empty() {
                    file.preamble = leading.into_iter().filter(|l| !is_own_header(l)).collect();
                    trim_blank_edges(&mut file.preamble);
                } else {
                    block.leading = leading;
                    trim_blank_edges(&mut block.leading);
                }
                current = Some(block);
                continue;
            }

            let in_body = line.is_empty() || line.starts_with(char::is_whitespace);
            if in_body {
                if let Some(block) = current.as_mut() {
                    block.body.push(line.to_string());
                    continue;
                }
            }
            if let Some(block) = current.take() {
                file.blocks.push(finish(block));
            }
            pending.push(line.to_string());
        }

        if let Some(block) = current.take() {
            file.blocks.push(finish(block));
        }
        if file.blocks.is_empty() {
            file.preamble = pending.into_iter().filter(|l| !is_own_header(l)).collect();
            trim_blank_edges(&mut file.preamble);
        } else {
            file.epilogue = pending;
            trim_blank_edges(&mut file.epilogue);
        }

        file
    }

    pub fn render(&self, language: &str) -> String {
        let mut lines = vec![BANNER.to_string(), format!("# language: {language}"), String::new()];

        if !self.preamble.is_empty() {
            lines.extend(self.preamble.iter().cloned());
            lines.push(String::new());
        }
        for block in &self.blocks {
            block.render_into(&mut lines);
        }
        lines.extend(self.epilogue.iter().cloned());

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.preamble.is_empty() && self.epilogue.is_empty()
    }
}

/// Splits the trailing source/orphan markers off `pending` into `block` and
/// returns the lines above them.
fn take_markers(pending: &mut Vec<String>, block: &mut TranslationBlock) -> Vec<String> {
    while let Some(last) = pending.last() {
        if last == ORPHAN_MARK {
            block.orphaned = true;
        } else if let Some(caps) = SOURCE_RE.captures(last) {
            if block.source.is_some() {
                break;
            }
            let Ok(line) = caps[2].parse() else {
                break;
            };
            block.source = Some(SourceRef {
                file: caps[1].to_string(),
                line,
            });
        } else {
            break;
        }
        pending.pop();
    }
    std::mem::take(pending)
}

fn finish(mut block: TranslationBlock) -> TranslationBlock {
    trim_blank_edges(&mut block.body);
    block
}

fn trim_blank_edges(lines: &mut Vec<String>) {
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    let lead = lines.iter().take_while(|l| l.trim().is_empty()).count();
    lines.drain(..lead);
}

fn is_own_header(line: &str) -> bool {
    line == BANNER || line.starts_with("# language: ")
}

#[derive(Debug, Serialize, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// New blocks for newly translated units.
    pub added: usize,
    /// Blocks rewritten because the translation changed.
    pub replaced: usize,
    /// Blocks whose translation already matched.
    pub unchanged: usize,
    /// Blocks kept for units that currently have no translation.
    pub kept: usize,
    /// Ids of blocks with no current unit, flagged orphaned.
    pub orphaned: Vec<String>,
    /// Previously orphaned blocks whose unit came back.
    pub restored: Vec<String>,
}

impl MergeReport {
    pub fn touched(&self) -> bool {
        self.added > 0 || self.replaced > 0
    }
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub blocks: Vec<TranslationBlock>,
    pub report: MergeReport,
}

/// Combines the blocks of an existing translation file with the current
/// units of its source file.
///
/// Blocks are never dropped. Live blocks follow the units' line order;
/// engine-reserved and orphaned blocks follow in their previous order.
pub fn merge(existing: Vec<TranslationBlock>, units: &[&TextUnit], language: &str) -> MergeOutcome {
    let mut report = MergeReport::default();

    let mut by_id: HashMap<String, TranslationBlock> = HashMap::new();
    let mut leftovers: Vec<TranslationBlock> = Vec::new();
    let mut order: Vec<String> = Vec::new();
    for block in existing {
        if by_id.contains_key(&block.id) {
            leftovers.push(block);
        } else {
            order.push(block.id.clone());
            by_id.insert(block.id.clone(), block);
        }
    }

    let mut units: Vec<&TextUnit> = units.to_vec();
    units.sort_by_key(|u| u.line);

    let mut live = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for unit in units {
        if !seen.insert(unit.id.as_str()) {
            continue;
        }

        match (by_id.remove(&unit.id), unit.translation()) {
            (Some(mut block), Some(text)) => {
                let previous = block.translated_text();
                if previous.as_deref() == Some(text) {
                    report.unchanged += 1;
                } else {
                    let leading = std::mem::take(&mut block.leading);
                    block = TranslationBlock {
                        leading,
                        ..TranslationBlock::for_unit(unit, text, &block.language, previous.as_deref())
                    };
                    report.replaced += 1;
                }
                if block.orphaned {
                    block.orphaned = false;
                    report.restored.push(unit.id.clone());
                }
                live.push(block);
            }
            (Some(mut block), None) => {
                if block.orphaned {
                    block.orphaned = false;
                    report.restored.push(unit.id.clone());
                }
                report.kept += 1;
                live.push(block);
            }
            (None, Some(text)) => {
                live.push(TranslationBlock::for_unit(unit, text, language, None));
                report.added += 1;
            }
            (None, None) => {}
        }
    }

    let mut rest: Vec<TranslationBlock> = order
        .into_iter()
        .filter_map(|id| by_id.remove(&id))
        .chain(leftovers)
        .collect();

    for block in rest.iter_mut().filter(|b| !b.is_reserved()) {
        block.orphaned = true;
        report.orphaned.push(block.id.clone());
    }

    live.append(&mut rest);

    MergeOutcome {
        blocks: live,
        report,
    }
}

/// Drops orphan-flagged blocks. Returns the kept blocks and the removed ids.
pub fn prune(blocks: Vec<TranslationBlock>) -> (Vec<TranslationBlock>, Vec<String>) {
    let (removed, kept): (Vec<_>, Vec<_>) = blocks.into_iter().partition(|b| b.orphaned);
    (kept, removed.into_iter().map(|b| b.id).collect())
}
