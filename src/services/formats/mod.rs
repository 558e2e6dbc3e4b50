//! Export/import adapters over the interchange record set.
//!
//! Every format carries the same seven fields per record: `id`, `file`,
//! `line`, `type`, `original`, `translated`, `context`.

use crate::error::{Error, Result};
use crate::model::unit::TextUnit;

mod csv;
mod html;
mod json;

pub use self::csv::CsvFormat;
pub use self::html::HtmlFormat;
pub use self::json::JsonFormat;

pub const FIELDS: [&str; 7] = ["id", "file", "line", "type", "original", "translated", "context"];

pub trait RecordFormat: Sync {
    fn name(&self) -> &'static str;

    fn extension(&self) -> &'static str;

    fn export(&self, units: &[TextUnit]) -> Result<String>;

    fn import(&self, text: &str) -> Result<Vec<TextUnit>>;
}

static JSON: JsonFormat = JsonFormat;
static CSV: CsvFormat = CsvFormat;
static HTML: HtmlFormat = HtmlFormat;

/// Looks a format up by name or file extension.
pub fn format_for(name: &str) -> Result<&'static dyn RecordFormat> {
    match name.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
        "json" => Ok(&JSON),
        "csv" | "spreadsheet" => Ok(&CSV),
        "html" | "htm" | "xhtml" => Ok(&HTML),
        other => Err(Error::InvalidRequest(format!("unknown format: {other}"))),
    }
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Builds a record from named cells, for formats that read fields as text.
fn record_from_cells<'a>(
    row: usize,
    cell: impl Fn(&str) -> Option<&'a str>,
) -> Result<TextUnit> {
    let required = |field: &str| {
        cell(field).ok_or_else(|| Error::Format(format!("record {row}: missing field `{field}`")))
    };

    let id = required("id")?.trim();
    if id.is_empty() {
        return Err(Error::Format(format!("record {row}: empty id")));
    }

    let line = required("line")?
        .trim()
        .parse::<usize>()
        .map_err(|e| Error::Format(format!("record {row}: bad line: {e}")))?;

    let kind = required("type")?
        .parse()
        .map_err(|e: String| Error::Format(format!("record {row}: {e}")))?;

    Ok(TextUnit {
        id: id.to_string(),
        source_file: required("file")?.to_string(),
        line,
        kind,
        original: required("original")?.to_string(),
        translated: cell("translated").and_then(optional),
        context: cell("context").and_then(optional),
    })
}
