use super::RecordFormat;
use crate::error::Result;
use crate::model::unit::TextUnit;

/// The canonical interchange file: a pretty-printed array of records.
pub struct JsonFormat;

impl RecordFormat for JsonFormat {
    fn name(&self) -> &'static str {
        "json"
    }

    fn extension(&self) -> &'static str {
        "json"
    }

    fn export(&self, units: &[TextUnit]) -> Result<String> {
        Ok(serde_json::to_string_pretty(units)?)
    }

    fn import(&self, text: &str) -> Result<Vec<TextUnit>> {
        Ok(serde_json::from_str(text.trim_start_matches('\u{feff}'))?)
    }
}
