use std::collections::HashMap;
use std::fmt::{Display, Write as _};

use lazy_static::lazy_static;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::{Captures, Regex};

use super::{record_from_cells, RecordFormat, FIELDS};
use crate::error::{Error, Result};
use crate::model::unit::TextUnit;

/// Human editing view: an XHTML table, one `tr.record` per unit and one
/// `td` per field, classed with the field name.
pub struct HtmlFormat;

const RECORD_CLASS: &str = "record";

const HEAD: &str = r#"<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml">
<head>
<meta charset="utf-8" />
<title>Translation records</title>
<style>
table { border-collapse: collapse; }
td, th { border: 1px solid #999; padding: 4px; vertical-align: top; white-space: pre-wrap; }
td.translated { background: #ffffe0; min-width: 20em; }
</style>
</head>
<body>
<table>
"#;

lazy_static! {
    static ref ENTITY_RE: Regex = Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[A-Za-z][A-Za-z0-9]*);").unwrap();
}

/// Named references a browser writes when saving an edited page, beyond
/// the five XML ones.
const HTML_ENTITIES: &[(&str, &str)] = &[
    ("amp", "&"),
    ("lt", "<"),
    ("gt", ">"),
    ("quot", "\""),
    ("apos", "'"),
    ("nbsp", "\u{a0}"),
    ("ensp", "\u{2002}"),
    ("emsp", "\u{2003}"),
    ("thinsp", "\u{2009}"),
    ("ndash", "\u{2013}"),
    ("mdash", "\u{2014}"),
    ("lsquo", "\u{2018}"),
    ("rsquo", "\u{2019}"),
    ("ldquo", "\u{201c}"),
    ("rdquo", "\u{201d}"),
    ("laquo", "\u{ab}"),
    ("raquo", "\u{bb}"),
    ("hellip", "\u{2026}"),
    ("middot", "\u{b7}"),
    ("copy", "\u{a9}"),
    ("reg", "\u{ae}"),
    ("trade", "\u{2122}"),
];

const TAIL: &str = "</tbody>\n</table>\n</body>\n</html>\n";

impl RecordFormat for HtmlFormat {
    fn name(&self) -> &'static str {
        "html"
    }

    fn extension(&self) -> &'static str {
        "html"
    }

    fn export(&self, units: &[TextUnit]) -> Result<String> {
        let mut out = String::from(HEAD);

        out.push_str("<thead><tr>");
        for field in FIELDS {
            let _ = write!(out, "<th>{field}</th>");
        }
        out.push_str("</tr></thead>\n<tbody>\n");

        for u in units {
            let line = u.line.to_string();
            let cells = [
                u.id.as_str(),
                u.source_file.as_str(),
                line.as_str(),
                u.kind.as_str(),
                u.original.as_str(),
                u.translated.as_deref().unwrap_or(""),
                u.context.as_deref().unwrap_or(""),
            ];

            let _ = write!(out, "<tr class=\"{RECORD_CLASS}\">");
            for (field, value) in FIELDS.iter().zip(cells) {
                let editable = if *field == "translated" {
                    " contenteditable=\"true\""
                } else {
                    ""
                };
                let _ = write!(
                    out,
                    "<td class=\"{field}\"{editable}>{}</td>",
                    escape(value)
                );
            }
            out.push_str("</tr>\n");
        }

        out.push_str(TAIL);
        Ok(out)
    }

    /// Reads every `tr.record` row; other rows and markup are ignored.
    /// Accepts pages saved back by a browser: unclosed void elements,
    /// HTML entities and `<br>` line breaks inside edited cells.
    fn import(&self, text: &str) -> Result<Vec<TextUnit>> {
        let mut reader = Reader::from_str(text.trim_start_matches('\u{feff}'));
        reader.check_end_names(false);

        let mut out = Vec::new();
        let mut row: Option<HashMap<String, String>> = None;
        let mut cell: Option<(String, String)> = None;

        loop {
            match reader.read_event().map_err(xml_error)? {
                Event::Start(e) if e.name().as_ref() == b"tr" => {
                    if class_of(&e)?.as_deref() == Some(RECORD_CLASS) {
                        row = Some(HashMap::new());
                    }
                }
                Event::Start(e) if e.name().as_ref() == b"td" && row.is_some() => {
                    cell = class_of(&e)?.map(|field| (field, String::new()));
                }
                Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"br" => {
                    if let Some((_, value)) = cell.as_mut() {
                        value.push('\n');
                    }
                }
                Event::Empty(e) if e.name().as_ref() == b"td" => {
                    if let (Some(fields), Some(field)) = (row.as_mut(), class_of(&e)?) {
                        fields.insert(field, String::new());
                    }
                }
                Event::Text(e) => {
                    if let Some((_, value)) = cell.as_mut() {
                        value.push_str(&unescape_html(&String::from_utf8_lossy(&e)));
                    }
                }
                Event::CData(e) => {
                    if let Some((_, value)) = cell.as_mut() {
                        value.push_str(&String::from_utf8_lossy(&e));
                    }
                }
                Event::End(e) if e.name().as_ref() == b"td" => {
                    if let (Some(fields), Some((field, value))) = (row.as_mut(), cell.take()) {
                        fields.insert(field, value);
                    }
                }
                Event::End(e) if e.name().as_ref() == b"tr" => {
                    if let Some(fields) = row.take() {
                        let unit =
                            record_from_cells(out.len() + 1, |f| fields.get(f).map(String::as_str))?;
                        out.push(unit);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(out)
    }
}

/// Resolves character references. Unknown names stay as literal text.
fn unescape_html(raw: &str) -> String {
    ENTITY_RE
        .replace_all(raw, |caps: &Captures| {
            let name = &caps[1];
            let resolved = match name.strip_prefix('#') {
                Some(num) => {
                    let code = match num.strip_prefix(['x', 'X']) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => num.parse::<u32>().ok(),
                    };
                    code.and_then(char::from_u32).map(String::from)
                }
                None => HTML_ENTITIES
                    .iter()
                    .find(|(n, _)| *n == name)
                    .map(|(_, v)| v.to_string()),
            };
            resolved.unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// First class name of an element.
fn class_of(e: &BytesStart) -> Result<Option<String>> {
    let Some(attr) = e.try_get_attribute("class").map_err(xml_error)? else {
        return Ok(None);
    };
    let value = attr.unescape_value().map_err(xml_error)?;
    Ok(value.split_whitespace().next().map(str::to_string))
}

fn xml_error(e: impl Display) -> Error {
    Error::Format(format!("html: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::unit::UnitKind;

    fn unit() -> TextUnit {
        TextUnit {
            id: "script_5_abcdef01".into(),
            source_file: "game/script.rpy".into(),
            line: 5,
            kind: UnitKind::Dialogue,
            original: "Tom & Jerry <3".into(),
            translated: None,
            context: Some("narrator".into()),
        }
    }

    #[test]
    fn markup_in_text_is_escaped() {
        let html = HtmlFormat.export(&[unit()]).unwrap();

        assert!(html.contains("<td class=\"original\">Tom &amp; Jerry &lt;3</td>"));
        assert!(html.contains("<td class=\"translated\" contenteditable=\"true\"></td>"));
    }

    #[test]
    fn edited_rows_are_read_back_and_header_rows_skipped() {
        let html = HtmlFormat
            .export(&[unit()])
            .unwrap()
            .replace(
                "<td class=\"translated\" contenteditable=\"true\"></td>",
                "<td class=\"translated\" contenteditable=\"true\">Tom &amp; Jerry <![CDATA[<3]]></td>",
            );

        let units = HtmlFormat.import(&html).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].translated.as_deref(), Some("Tom & Jerry <3"));
        assert_eq!(units[0].context.as_deref(), Some("narrator"));
    }

    #[test]
    fn browser_saved_pages_import() {
        let html = "<!DOCTYPE html>
<html><head><meta charset=\"utf-8\"><title>Translation records</title></head>
<body><table><tbody>
<tr class=\"record\"><td class=\"id\">script_5_abcdef01</td><td class=\"file\">game/script.rpy</td>\
<td class=\"line\">5</td><td class=\"type\">dialogue</td><td class=\"original\">Tom &amp; Jerry &lt;3</td>\
<td class=\"translated\" contenteditable=\"true\">Salut&nbsp;! &hearts;<br>Ligne&#160;2 &#x2764;</td>\
<td class=\"context\"></td></tr>
</tbody></table></body></html>
";

        let units = HtmlFormat.import(html).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].original, "Tom & Jerry <3");
        assert_eq!(
            units[0].translated.as_deref(),
            Some("Salut\u{a0}! &hearts;\nLigne\u{a0}2 \u{2764}")
        );
        assert_eq!(units[0].context, None);
    }

    #[test]
    fn rows_without_an_id_are_rejected() {
        let html = "<table><tr class=\"record\"><td class=\"file\">a.rpy</td></tr></table>";
        assert!(matches!(HtmlFormat.import(html), Err(Error::Format(_))));
    }
}
