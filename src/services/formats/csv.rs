use super::RecordFormat;
use crate::error::{Error, Result};
use crate::model::unit::TextUnit;

/// Spreadsheet view. Written with a byte-order mark so spreadsheet tools
/// pick UTF-8; the mark is optional on import.
pub struct CsvFormat;

const BOM: char = '\u{feff}';

impl RecordFormat for CsvFormat {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn extension(&self) -> &'static str {
        "csv"
    }

    fn export(&self, units: &[TextUnit]) -> Result<String> {
        let mut writer = ::csv::Writer::from_writer(Vec::new());
        for unit in units {
            writer.serialize(unit)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| Error::Csv(e.into_error().into()))?;
        let body = String::from_utf8(bytes).map_err(|e| Error::Format(e.to_string()))?;

        Ok(format!("{BOM}{body}"))
    }

    fn import(&self, text: &str) -> Result<Vec<TextUnit>> {
        let mut reader = ::csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(text.trim_start_matches(BOM).as_bytes());

        let mut out = Vec::new();
        for record in reader.deserialize() {
            let unit: TextUnit = record?;
            out.push(unit);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::unit::UnitKind;

    #[test]
    fn header_and_empty_cells() {
        let unit = TextUnit {
            id: "script_1_00000000".into(),
            source_file: "game/script.rpy".into(),
            line: 1,
            kind: UnitKind::Dialogue,
            original: "Hello, world!".into(),
            translated: None,
            context: None,
        };

        let text = CsvFormat.export(&[unit]).unwrap();
        let mut lines = text.trim_start_matches(BOM).lines();
        assert_eq!(lines.next(), Some("id,file,line,type,original,translated,context"));
        assert_eq!(
            lines.next(),
            Some("script_1_00000000,game/script.rpy,1,dialogue,\"Hello, world!\",,")
        );
    }

    #[test]
    fn hand_edited_sheets_import() {
        let sheet = "id,file,line,type,original,translated,context\r\n\
                     a_1_00000000,game/a.rpy,1,menu,Go,Aller,menu\r\n";
        let units = CsvFormat.import(sheet).unwrap();

        assert_eq!(units[0].kind, UnitKind::MenuChoice);
        assert_eq!(units[0].translated.as_deref(), Some("Aller"));
    }
}
