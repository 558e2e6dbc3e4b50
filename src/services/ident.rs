use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::Error;

const HASH_WIDTH: usize = 8;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum IdScheme {
    /// `<stem>_<line>_<hash>`
    #[default]
    Line,
    /// `<stem>_<ordinal>_<hash>`, ordinal counted per file from 1. The hash
    /// covers the ordinal too, so inserted non-text lines keep ids stable.
    Ordinal,
}

/// First eight hex digits of SHA-256 over file, position and text.
pub fn content_hash(source_file: &str, position: usize, original: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_file.as_bytes());
    hasher.update(b"\n");
    hasher.update(position.to_string().as_bytes());
    hasher.update(b"\n");
    hasher.update(original.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..HASH_WIDTH].to_string()
}

/// File stem reduced to identifier characters, so the id is a valid engine
/// label.
pub fn file_stem(source_file: &str) -> String {
    let stem = Path::new(source_file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("");

    let mut out: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    if out.is_empty() {
        out.push_str("script");
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub id: String,
    /// Set when the computed id was already taken and a suffix was added.
    pub collided_with: Option<String>,
}

/// Hands out project-unique ids. One assigner must see every unit of a
/// project so collisions across files are caught.
#[derive(Debug, Default)]
pub struct IdAssigner {
    scheme: IdScheme,
    taken: HashSet<String>,
    ordinals: HashMap<String, usize>,
}

impl IdAssigner {
    pub fn new(scheme: IdScheme) -> Self {
        IdAssigner {
            scheme,
            ..Default::default()
        }
    }

    pub fn assign(&mut self, source_file: &str, line: usize, original: &str) -> Assignment {
        let position = match self.scheme {
            IdScheme::Line => line,
            IdScheme::Ordinal => {
                let n = self.ordinals.entry(source_file.to_string()).or_insert(0);
                *n += 1;
                *n
            }
        };

        let base = format!(
            "{}_{}_{}",
            file_stem(source_file),
            position,
            content_hash(source_file, position, original)
        );

        if self.taken.insert(base.clone()) {
            return Assignment {
                id: base,
                collided_with: None,
            };
        }

        let mut n = 2usize;
        let resolved = loop {
            let candidate = format!("{base}_{n}");
            if self.taken.insert(candidate.clone()) {
                break candidate;
            }
            n += 1;
        };

        let err = Error::DuplicateId {
            id: base.clone(),
            resolved: resolved.clone(),
        };
        warn!("{source_file}:{line}: {err}");

        Assignment {
            id: resolved,
            collided_with: Some(base),
        }
    }
}
