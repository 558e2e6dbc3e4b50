use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::unit::TextUnit;

lazy_static! {
    // `[name]` interpolation; `[[` is a literal bracket.
    static ref INTERPOLATION_RE: Regex = Regex::new(r"\[\[|\[([^\[\]]+)\]").unwrap();
    // `{b}`, `{/i}`, `{color=#fff}`; `{{` is a literal brace.
    static ref TEXT_TAG_RE: Regex = Regex::new(r"\{\{|\{(/?[a-z_]+)(?:=[^}]*)?\}").unwrap();
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QaIssue {
    pub unit_id: String,
    pub code: String,
    pub message: String,
}

/// Checks translated units for mistakes that break or silently change the
/// game at runtime. Untranslated units are skipped.
pub fn run(units: &[TextUnit]) -> Vec<QaIssue> {
    let mut issues: Vec<QaIssue> = Vec::new();

    for u in units {
        let Some(translation) = u.translation() else {
            continue;
        };

        let mut push = |code: &str, message: String| {
            issues.push(QaIssue {
                unit_id: u.id.clone(),
                code: code.to_string(),
                message,
            })
        };

        if translation.trim() == u.original.trim() {
            push("SAME_AS_ORIGINAL", "translation is identical to the original".into());
        }

        let (want, got) = (captures(&INTERPOLATION_RE, &u.original), captures(&INTERPOLATION_RE, translation));
        if want != got {
            push(
                "INTERPOLATION_MISMATCH",
                format!("variables differ: original {:?}, translation {:?}", keys(&want), keys(&got)),
            );
        }

        let (want, got) = (captures(&TEXT_TAG_RE, &u.original), captures(&TEXT_TAG_RE, translation));
        if want != got {
            push(
                "TEXT_TAG_MISMATCH",
                format!("text tags differ: original {:?}, translation {:?}", keys(&want), keys(&got)),
            );
        }

        let (want, got) = (u.original.matches('\n').count(), translation.matches('\n').count());
        if want != got {
            push(
                "LINE_BREAK_MISMATCH",
                format!("original has {want} line breaks, translation has {got}"),
            );
        }
    }

    issues
}

/// Multiset of the first capture group of every match.
fn captures<'a>(re: &Regex, text: &'a str) -> BTreeMap<&'a str, usize> {
    let mut out = BTreeMap::new();
    for c in re.captures_iter(text) {
        if let Some(m) = c.get(1) {
            *out.entry(m.as_str()).or_default() += 1;
        }
    }
    out
}

fn keys<'a>(m: &BTreeMap<&'a str, usize>) -> Vec<&'a str> {
    m.keys().copied().collect()
}
