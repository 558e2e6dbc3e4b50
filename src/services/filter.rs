//! Retain/drop heuristics applied to classified candidates.
//!
//! Rules run in order and the first match wins. They lean towards retaining
//! borderline text: a missed line costs more than an extra entry.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

fn default_min_length() -> usize {
    2
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FilterPolicy {
    /// Text shorter than this (in characters) is dropped when it has no
    /// alphabetic character.
    #[serde(default = "default_min_length")]
    pub min_length: usize,

    #[serde(default)]
    pub extra_keywords: Vec<String>,

    /// Extra file extensions, with or without the leading dot.
    #[serde(default)]
    pub extra_asset_extensions: Vec<String>,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        FilterPolicy {
            min_length: default_min_length(),
            extra_keywords: Vec::new(),
            extra_asset_extensions: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    EngineKeyword,
    FileReference,
    StyleToken,
    TooShort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Retain,
    Drop(DropReason),
}

/// Control-flow and declaration keywords that show up as "text" when a
/// directive is mistaken for a string.
const ENGINE_KEYWORDS: &[&str] = &[
    "call", "define", "default", "elif", "else", "hide", "if", "image", "init", "jump", "label",
    "menu", "pass", "pause", "play", "python", "queue", "return", "scene", "screen", "show",
    "stop", "style", "transform", "translate", "voice", "while", "window", "with",
];

const ASSET_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "webp", "gif", "bmp", "svg", "avif", "ogg", "opus", "mp3", "wav",
    "flac", "m4a", "mp4", "webm", "ogv", "avi", "mkv", "ttf", "otf", "woff", "woff2", "rpy",
    "rpyc", "rpym", "rpa", "py", "pyc", "json", "txt", "xml", "zip", "rar", "7z",
];

lazy_static! {
    static ref DIRECTIVE_TOKEN_RE: Regex =
        Regex::new(r"^(?:[a-z_][a-z0-9_]*(?:\.[a-z_][a-z0-9_]*)*|\d+(?:\.\d+)?)$").unwrap();
    static ref HEX_COLOR_RE: Regex =
        Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{4}|[0-9a-fA-F]{6}|[0-9a-fA-F]{8})$").unwrap();
    static ref RGB_COLOR_RE: Regex =
        Regex::new(r"^rgba?\(\s*\d+\s*,\s*\d+\s*,\s*\d+\s*(?:,\s*[\d.]+\s*)?\)$").unwrap();
    static ref STYLE_ID_RE: Regex = Regex::new(r"^[A-Za-z0-9_]{1,32}$").unwrap();
}

type Rule = fn(&str, &FilterPolicy) -> bool;

const RULES: &[(DropReason, Rule)] = &[
    (DropReason::EngineKeyword, is_engine_keyword as Rule),
    (DropReason::FileReference, is_file_reference as Rule),
    (DropReason::StyleToken, is_style_token as Rule),
    (DropReason::TooShort, is_too_short as Rule),
];

pub fn judge(text: &str, policy: &FilterPolicy) -> Verdict {
    let text = text.trim();

    RULES
        .iter()
        .find(|(_, rule)| rule(text, policy))
        .map_or(Verdict::Retain, |(reason, _)| Verdict::Drop(*reason))
}

/// Exact keyword, or keyword followed only by lowercase identifier tokens
/// (`jump start`, `show eileen happy`). Capitalised or punctuated prose that
/// merely starts with a keyword is kept.
fn is_engine_keyword(text: &str, policy: &FilterPolicy) -> bool {
    let is_keyword =
        |w: &str| ENGINE_KEYWORDS.contains(&w) || policy.extra_keywords.iter().any(|k| k == w);

    let mut tokens = text.split_whitespace();
    let Some(head) = tokens.next() else {
        return false;
    };

    is_keyword(head) && tokens.all(|t| DIRECTIVE_TOKEN_RE.is_match(t))
}

fn is_file_reference(text: &str, policy: &FilterPolicy) -> bool {
    let lower = text.to_lowercase();

    let known_ext = ASSET_EXTENSIONS
        .iter()
        .map(|e| e.to_string())
        .chain(
            policy
                .extra_asset_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase()),
        )
        .any(|ext| {
            lower
                .strip_suffix(ext.as_str())
                .is_some_and(|stem| stem.len() > 1 && stem.ends_with('.'))
        });

    let path_like =
        (text.contains('/') || text.contains('\\')) && !text.chars().any(char::is_whitespace);

    known_ext || path_like
}

/// Hex/rgb colours and identifier-like style names (`say_window`, `BTN01`).
/// Plain words, capitalised or not, are never style tokens.
fn is_style_token(text: &str, _policy: &FilterPolicy) -> bool {
    if HEX_COLOR_RE.is_match(text) || RGB_COLOR_RE.is_match(text) {
        return true;
    }
    if !STYLE_ID_RE.is_match(text) {
        return false;
    }

    let has_digit = text.chars().any(|c| c.is_ascii_digit());
    let has_lower = text.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = text.chars().any(|c| c.is_ascii_uppercase());

    text.contains('_') || (has_upper && has_digit && !has_lower)
}

fn is_too_short(text: &str, policy: &FilterPolicy) -> bool {
    text.chars().count() < policy.min_length && !text.chars().any(char::is_alphabetic)
}
