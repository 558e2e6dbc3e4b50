//! Line classifier for Ren'Py scripts.
//!
//! Each physical line is classified on its own as dialogue, a string-literal
//! assignment, a menu choice or non-text. Only menu and python block
//! boundaries are tracked across lines, by indentation.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{trace, warn};

use crate::error::{Error, Issue};
use crate::model::unit::UnitKind;

/// Statement keywords that never name a speaker.
pub const STATEMENT_KEYWORDS: &[&str] = &[
    "action", "add", "call", "camera", "default", "define", "elif", "else", "for", "hide",
    "hotspot", "if", "image", "imagebutton", "init", "jump", "key", "label", "menu", "nvl",
    "on", "pass", "pause", "play", "python", "queue", "return", "scene", "screen", "show",
    "stop", "style", "timer", "transform", "translate", "use", "voice", "while", "window", "with",
];

/// Screen-language displayables whose quoted argument is display text.
const DISPLAY_TEXT_KEYWORDS: &[&str] = &["text", "textbutton"];

lazy_static! {
    static ref MENU_RE: Regex =
        Regex::new(r"^menu(?:\s+[A-Za-z_]\w*)?\s*(?:\(.*\))?\s*:$").unwrap();
    static ref PYTHON_RE: Regex = Regex::new(r"^(?:init(?:\s+-?\d+)?\s+)?python\b[^:]*:$").unwrap();
    static ref ASSIGN_RE: Regex =
        Regex::new(r"^(?:(?:define|default)\s+|\$\s*)?([A-Za-z_][\w.]*)\s*=\s*(?:__?\(\s*)?").unwrap();
    static ref SPEAKER_RE: Regex =
        Regex::new(r"^[A-Za-z_]\w*(?:\s+(?:@|-?[A-Za-z_]\w*))*$").unwrap();
    static ref CHOICE_TAIL_RE: Regex = Regex::new(r"^(?:\(.*\)\s*)?(?:if\s+.+)?:$").unwrap();
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineScope {
    pub in_menu: bool,
    pub in_python: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Blank,
    Comment,
    NonText,
    /// Assignment to a variable that never holds display text.
    NonTextTarget,
    /// Quoted content is empty or whitespace after normalization.
    EmptyText,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Dialogue { speaker: Option<String>, text: String },
    StringLiteral { target: String, text: String },
    MenuChoice { text: String },
    Rejected(Rejection),
}

impl Classification {
    pub fn kind(&self) -> Option<UnitKind> {
        match self {
            Classification::Dialogue { .. } => Some(UnitKind::Dialogue),
            Classification::StringLiteral { .. } => Some(UnitKind::StringLiteral),
            Classification::MenuChoice { .. } => Some(UnitKind::MenuChoice),
            Classification::Rejected(_) => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Classification::Dialogue { text, .. }
            | Classification::StringLiteral { text, .. }
            | Classification::MenuChoice { text } => Some(text),
            Classification::Rejected(_) => None,
        }
    }

    fn into_candidate(self, line: usize) -> Option<Candidate> {
        let (kind, text, context) = match self {
            Classification::Dialogue { speaker, text } => (UnitKind::Dialogue, text, speaker),
            Classification::StringLiteral { target, text } => {
                (UnitKind::StringLiteral, text, Some(format!("var:{target}")))
            }
            Classification::MenuChoice { text } => {
                (UnitKind::MenuChoice, text, Some("menu".to_string()))
            }
            Classification::Rejected(_) => return None,
        };

        Some(Candidate {
            line,
            kind,
            text,
            context,
        })
    }
}

/// An opening quote with no matching close; `offset` is the byte offset of
/// the quote within the trimmed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnclosedQuote {
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub line: usize,
    pub kind: UnitKind,
    pub text: String,
    pub context: Option<String>,
}

#[derive(Debug, Default)]
pub struct ParsedScript {
    pub candidates: Vec<Candidate>,
    pub issues: Vec<Issue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Menu,
    Python,
}

struct QuotedString<'a> {
    /// Content between the quotes, still escaped.
    raw: &'a str,
    /// Content including the quotes.
    literal: &'a str,
    /// Byte offset just past the closing quote.
    end: usize,
}

pub fn parse(file: &str, text: &str) -> ParsedScript {
    let mut out = ParsedScript::default();
    let mut blocks: Vec<(usize, Block)> = Vec::new();

    for (i, raw_line) in text.lines().enumerate() {
        let ln = i + 1;
        let line = raw_line.trim_end_matches('\r');
        let logical = line.trim();

        if logical.is_empty() || logical.starts_with('#') {
            continue;
        }

        let indent = line.len() - line.trim_start().len();
        while blocks.last().is_some_and(|(bi, _)| indent <= *bi) {
            blocks.pop();
        }

        if MENU_RE.is_match(logical) {
            blocks.push((indent, Block::Menu));
            continue;
        }
        if PYTHON_RE.is_match(logical) {
            blocks.push((indent, Block::Python));
            continue;
        }

        let scope = LineScope {
            in_menu: matches!(blocks.last(), Some((_, Block::Menu))),
            in_python: blocks.iter().any(|(_, b)| *b == Block::Python),
        };

        match classify_line(line, scope) {
            Ok(classification) => match classification.into_candidate(ln) {
                Some(candidate) => out.candidates.push(candidate),
                None => trace!("{file}:{ln}: non-text"),
            },
            Err(UnclosedQuote { offset }) => {
                let column = line[..indent + offset].chars().count() + 1;
                let err = Error::MalformedQuoting {
                    file: file.to_string(),
                    line: ln,
                    column,
                };
                warn!("{err}");
                out.issues.push(err.to_issue(file, Some(ln)));
            }
        }
    }

    out
}

pub fn classify_line(line: &str, scope: LineScope) -> Result<Classification, UnclosedQuote> {
    let logical = line.trim();

    if logical.is_empty() {
        return Ok(Classification::Rejected(Rejection::Blank));
    }
    if logical.starts_with('#') {
        return Ok(Classification::Rejected(Rejection::Comment));
    }

    if let Some(caps) = ASSIGN_RE.captures(logical) {
        let value_at = caps.get(0).map_or(0, |m| m.end());
        if is_quote_at(logical, value_at) {
            let value = read_string(logical, value_at)?;
            let target = caps.get(1).map_or("", |m| m.as_str()).to_string();

            if is_non_text_target(&target) {
                return Ok(Classification::Rejected(Rejection::NonTextTarget));
            }
            return Ok(text_or_empty(value.raw, |text| Classification::StringLiteral {
                target,
                text,
            }));
        }
    }

    if scope.in_python {
        return Ok(Classification::Rejected(Rejection::NonText));
    }

    if is_quote_at(logical, 0) {
        let first = read_string(logical, 0)?;
        let rest = logical[first.end..].trim_start();
        let rest_at = logical.len() - rest.len();

        if scope.in_menu && CHOICE_TAIL_RE.is_match(rest.trim_end()) {
            return Ok(text_or_empty(first.raw, |text| Classification::MenuChoice { text }));
        }

        // "Speaker Name" "Line of dialogue"
        if is_quote_at(logical, rest_at) {
            let said = read_string(logical, rest_at)?;
            if !trailing_ok(&logical[said.end..]) {
                return Ok(Classification::Rejected(Rejection::NonText));
            }
            let speaker = first.literal.to_string();
            return Ok(text_or_empty(said.raw, |text| Classification::Dialogue {
                speaker: Some(speaker),
                text,
            }));
        }

        if !trailing_ok(rest) {
            return Ok(Classification::Rejected(Rejection::NonText));
        }
        return Ok(text_or_empty(first.raw, |text| Classification::Dialogue {
            speaker: None,
            text,
        }));
    }

    let Some(open) = logical.find(['"', '\'']) else {
        return Ok(Classification::Rejected(Rejection::NonText));
    };

    let prefix = logical[..open].trim_end();
    let head = prefix.split_whitespace().next().unwrap_or("");

    if DISPLAY_TEXT_KEYWORDS.contains(&head) && prefix == head {
        let value = read_string(logical, open)?;
        let target = head.to_string();
        return Ok(text_or_empty(value.raw, |text| Classification::StringLiteral {
            target,
            text,
        }));
    }

    if !is_speaker(prefix) {
        return Ok(Classification::Rejected(Rejection::NonText));
    }

    let said = read_string(logical, open)?;
    if !trailing_ok(&logical[said.end..]) {
        return Ok(Classification::Rejected(Rejection::NonText));
    }

    let speaker = prefix.to_string();
    Ok(text_or_empty(said.raw, |text| Classification::Dialogue {
        speaker: Some(speaker),
        text,
    }))
}

/// Whether `s` can stand in front of a dialogue string: a character
/// identifier with optional attributes, or a quoted name.
pub fn is_speaker(s: &str) -> bool {
    let s = s.trim();

    if is_quote_at(s, 0) {
        return matches!(read_string(s, 0), Ok(q) if q.end == s.len());
    }

    let head = s.split_whitespace().next().unwrap_or("");
    SPEAKER_RE.is_match(s)
        && !STATEMENT_KEYWORDS.contains(&head)
        && !DISPLAY_TEXT_KEYWORDS.contains(&head)
}

/// Decodes the engine's two-character escapes for newline and quotes.
/// Other backslash pairs (including `\\`) are kept verbatim so that
/// [`escape`] reproduces the source form.
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }

    out
}

/// Inverse of [`unescape`] for a double-quoted engine string.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    // Backslashes emitted since the last other character. An odd run would
    // swallow the escape that follows it.
    let mut run = 0usize;

    for ch in text.chars() {
        match ch {
            '\n' | '"' => {
                if run % 2 == 1 {
                    out.push('\\');
                }
                out.push_str(if ch == '\n' { "\\n" } else { "\\\"" });
                run = 0;
            }
            '\\' => {
                out.push('\\');
                run += 1;
            }
            _ => {
                out.push(ch);
                run = 0;
            }
        }
    }

    if run % 2 == 1 {
        out.push('\\');
    }

    out
}

/// `text` as a double-quoted engine string literal.
pub fn quote(text: &str) -> String {
    format!("\"{}\"", escape(text))
}

fn text_or_empty(raw: &str, build: impl FnOnce(String) -> Classification) -> Classification {
    let text = unescape(raw);
    if text.trim().is_empty() {
        Classification::Rejected(Rejection::EmptyText)
    } else {
        build(text)
    }
}

fn is_quote_at(s: &str, at: usize) -> bool {
    matches!(s.as_bytes().get(at), Some(b'"') | Some(b'\''))
}

fn read_string(s: &str, open: usize) -> Result<QuotedString<'_>, UnclosedQuote> {
    let quote = s.as_bytes()[open] as char;
    let body = &s[open + 1..];
    let mut escaped = false;

    for (i, ch) in body.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if ch == '\\' {
            escaped = true;
        } else if ch == quote {
            let close = open + 1 + i;
            return Ok(QuotedString {
                raw: &s[open + 1..close],
                literal: &s[open..close + 1],
                end: close + 1,
            });
        }
    }

    Err(UnclosedQuote { offset: open })
}

fn trailing_ok(rest: &str) -> bool {
    let t = rest.trim();
    t.is_empty()
        || t.starts_with('#')
        || t.starts_with('(')
        || t.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
}

fn is_non_text_target(target: &str) -> bool {
    const EXACT: &[&str] = &[
        "config.version",
        "config.save_directory",
        "config.window_icon",
        "version",
        "save_name",
    ];
    const PREFIXES: &[&str] = &["build.", "gui.", "style."];
    const SUFFIXES: &[&str] = &["_path", "_file", "_dir", "_image", "_sound", "_music"];

    let t = target.to_ascii_lowercase();
    EXACT.contains(&t.as_str())
        || PREFIXES.iter().any(|p| t.starts_with(p))
        || SUFFIXES.iter().any(|s| t.ends_with(s))
}
