use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum UnitKind {
    Dialogue,

    #[serde(alias = "string")]
    StringLiteral,

    #[serde(alias = "menu")]
    MenuChoice,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Dialogue => "dialogue",
            UnitKind::StringLiteral => "string-literal",
            UnitKind::MenuChoice => "menu-choice",
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dialogue" => Ok(UnitKind::Dialogue),
            "string-literal" | "string" => Ok(UnitKind::StringLiteral),
            "menu-choice" | "menu" => Ok(UnitKind::MenuChoice),
            other => Err(format!("unknown unit type: {other}")),
        }
    }
}

/// One extracted piece of translatable text.
///
/// Serialized field names are the interchange record names
/// (`id`, `file`, `line`, `type`, `original`, `translated`, `context`).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TextUnit {
    pub id: String,

    /// Path relative to the game root, `/`-separated.
    #[serde(rename = "file")]
    pub source_file: String,

    /// 1-based line number at extraction time.
    pub line: usize,

    #[serde(rename = "type")]
    pub kind: UnitKind,

    /// Source text with `\n` and escaped quotes already decoded.
    pub original: String,

    #[serde(default)]
    pub translated: Option<String>,

    /// Speaker tag for dialogue, `var:<name>` for assignments, `menu` for choices.
    #[serde(default)]
    pub context: Option<String>,
}

impl TextUnit {
    /// The translation, if one with visible content is present.
    pub fn translation(&self) -> Option<&str> {
        self.translated
            .as_deref()
            .filter(|t| !t.trim().is_empty())
    }

    pub fn is_translated(&self) -> bool {
        self.translation().is_some()
    }
}
