use std::fs;
use std::path::Path;

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, GBK, SHIFT_JIS};
use serde::Serialize;

use crate::error::{Error, Result};

/// Default decoding priority: UTF-8 with and without BOM, a Chinese
/// double-byte encoding, a Japanese double-byte encoding, then the Latin-1
/// family as last resort.
pub const DEFAULT_CANDIDATES: &[&str] = &["utf-8-sig", "utf-8", "gbk", "shift_jis", "windows-1252"];

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

#[derive(Debug, Serialize)]
pub struct EncodingCandidate {
    pub name: String,
    pub confidence: f32,
}

#[derive(Debug, Serialize)]
pub struct EncodingDetectionResult {
    pub best: String,
    pub confidence: f32,
    pub candidates: Vec<EncodingCandidate>,
}

#[derive(Debug)]
pub struct Decoded {
    pub encoding: String,
    pub text: String,
}

pub fn detect_from_file(path: &Path, candidates: &[String]) -> Result<EncodingDetectionResult> {
    let bytes = fs::read(path)?;

    let mut found = Vec::new();
    for name in ordered_candidates(&bytes, candidates) {
        if let Some(text) = decode_strict(&bytes, &name) {
            found.push(EncodingCandidate {
                confidence: estimate_confidence(&text),
                name,
            });
        }
    }

    // Candidates after the first only matter as alternatives.
    for (i, c) in found.iter_mut().enumerate().skip(1) {
        c.confidence = (c.confidence - 0.05 * i as f32).max(0.0);
    }

    let best = found.first().ok_or_else(|| Error::UnreadableFile {
        path: path.to_path_buf(),
    })?;

    Ok(EncodingDetectionResult {
        best: best.name.clone(),
        confidence: best.confidence,
        candidates: found,
    })
}

/// Decodes `bytes` with the first candidate that accepts the whole stream.
/// Never substitutes replacement characters.
pub fn decode(bytes: &[u8], candidates: &[String]) -> Option<Decoded> {
    ordered_candidates(bytes, candidates)
        .into_iter()
        .find_map(|name| decode_strict(bytes, &name).map(|text| Decoded { encoding: name, text }))
}

/// Reads and decodes a file. The handle is released before decoding starts,
/// so a decode failure never leaks it.
pub fn read_text(path: &Path, candidates: &[String]) -> Result<Decoded> {
    let bytes = fs::read(path)?;
    decode(&bytes, candidates).ok_or_else(|| Error::UnreadableFile {
        path: path.to_path_buf(),
    })
}

fn decode_strict(bytes: &[u8], name: &str) -> Option<String> {
    match name {
        "utf-8-sig" => {
            let rest = bytes.strip_prefix(UTF8_BOM)?;
            std::str::from_utf8(rest).ok().map(str::to_string)
        }
        "utf-8" | "utf8" => std::str::from_utf8(bytes).ok().map(str::to_string),
        label => {
            let encoding = Encoding::for_label(label.as_bytes())?;
            encoding
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(|text| text.into_owned())
        }
    }
}

/// Applies the configured priority, except that when chardetng recognises
/// Japanese the Shift_JIS candidate is moved ahead of GBK: most Shift_JIS
/// text also decodes cleanly as GBK.
fn ordered_candidates(bytes: &[u8], candidates: &[String]) -> Vec<String> {
    let mut ordered: Vec<String> = candidates.iter().map(|c| c.trim().to_lowercase()).collect();

    let pos_of = |list: &[String], enc: &'static Encoding| {
        list.iter().position(|c| {
            !c.starts_with("utf") && Encoding::for_label(c.as_bytes()) == Some(enc)
        })
    };

    if let (Some(gbk), Some(sjis)) = (pos_of(&ordered, GBK), pos_of(&ordered, SHIFT_JIS)) {
        if gbk < sjis && std::str::from_utf8(bytes).is_err() {
            let mut detector = EncodingDetector::new();
            detector.feed(bytes, true);

            if detector.guess(None, true) == SHIFT_JIS {
                let name = ordered.remove(sjis);
                ordered.insert(gbk, name);
            }
        }
    }

    ordered
}

fn estimate_confidence(text: &str) -> f32 {
    let len = text.len();
    if len < 64 {
        0.55
    } else if len < 512 {
        0.70
    } else if len < 4096 {
        0.82
    } else {
        0.90
    }
}
