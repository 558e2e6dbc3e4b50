//! JSON-lines request handling: one `{id, cmd, payload}` object in, one
//! `{id, status, payload | message}` object out.

use std::path::Path;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::project::ProjectInfo;
use crate::model::unit::TextUnit;
use crate::services::encoding::{self, DEFAULT_CANDIDATES};
use crate::services::filter::FilterPolicy;
use crate::services::ident::IdAssigner;
use crate::services::project as projects;
use crate::services::{pipeline, qa};

mod command;
mod project;

pub use command::Command;

fn get_cmd(req: &Value) -> &str {
    req.get("cmd").and_then(|v| v.as_str()).unwrap_or("")
}

fn get_id(req: &Value) -> Value {
    req.get("id").cloned().unwrap_or(Value::Null)
}

fn get_payload<'a>(req: &'a Value) -> &'a Value {
    static EMPTY: Value = Value::Null;
    req.get("payload").unwrap_or(&EMPTY)
}

fn ok(id: Value, payload: Value) -> String {
    json!({
        "id": id,
        "status": "ok",
        "payload": payload
    })
    .to_string()
}

fn err(id: Value, message: impl Into<String>) -> String {
    json!({
        "id": id,
        "status": "error",
        "message": message.into()
    })
    .to_string()
}

pub(crate) fn opt_str<'a>(payload: &'a Value, key: &str) -> Option<&'a str> {
    payload
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub(crate) fn req_str<'a>(payload: &'a Value, key: &str) -> Result<&'a str> {
    opt_str(payload, key).ok_or_else(|| Error::InvalidRequest(format!("payload.{key} is required")))
}

fn load_project(payload: &Value) -> Result<ProjectInfo> {
    projects::open_project(req_str(payload, "project_path")?)
}

fn encodings_from(payload: &Value) -> Result<Vec<String>> {
    match payload.get("encodings") {
        Some(v) if !v.is_null() => serde_json::from_value(v.clone())
            .map_err(|e| Error::InvalidRequest(format!("payload.encodings: {e}"))),
        _ => Ok(DEFAULT_CANDIDATES.iter().map(|s| s.to_string()).collect()),
    }
}

fn units_from(payload: &Value) -> Result<Vec<TextUnit>> {
    let arr = payload
        .get("units")
        .and_then(|v| v.as_array())
        .ok_or_else(|| Error::InvalidRequest("payload.units must be an array".into()))?;

    let mut units: Vec<TextUnit> = Vec::with_capacity(arr.len());
    for (i, v) in arr.iter().cloned().enumerate() {
        match serde_json::from_value::<TextUnit>(v) {
            Ok(u) => units.push(u),
            Err(e) => return Err(Error::InvalidRequest(format!("invalid unit at index {i}: {e}"))),
        }
    }

    Ok(units)
}

/// Languages named by the request, or every language of the project.
fn languages_for(project: &ProjectInfo, payload: &Value) -> Result<Vec<String>> {
    if let Some(lang) = opt_str(payload, "language") {
        return Ok(vec![lang.to_string()]);
    }
    if project.languages.is_empty() {
        return Err(Error::InvalidRequest(
            "payload.language is required when the project has no languages".into(),
        ));
    }
    Ok(project.languages.clone())
}

/// The one language a request works on: named, or the project's only one.
fn language_for(project: &ProjectInfo, payload: &Value) -> Result<String> {
    if let Some(lang) = opt_str(payload, "language") {
        return Ok(lang.to_string());
    }
    match project.languages.as_slice() {
        [only] => Ok(only.clone()),
        _ => Err(Error::InvalidRequest(
            "payload.language is required unless the project has exactly one language".into(),
        )),
    }
}

fn dispatch(cmd: Command, payload: &Value) -> Result<Value> {
    if cmd.is_project() {
        return project::handle(cmd, payload);
    }

    match cmd {
        Command::Ping => Ok(json!({
            "message": "renpy-tl-core alive",
            "version": env!("CARGO_PKG_VERSION")
        })),

        Command::DetectEncoding => {
            let path = req_str(payload, "path")?;
            let result = encoding::detect_from_file(Path::new(path), &encodings_from(payload)?)?;
            Ok(serde_json::to_value(result)?)
        }

        Command::ParseText => {
            let text = payload.get("text").and_then(|v| v.as_str()).unwrap_or("");
            let file = opt_str(payload, "file").unwrap_or("game/script.rpy");
            let policy: FilterPolicy = match payload.get("filter") {
                Some(v) if !v.is_null() => serde_json::from_value(v.clone())
                    .map_err(|e| Error::InvalidRequest(format!("payload.filter: {e}")))?,
                _ => FilterPolicy::default(),
            };

            let mut ids = IdAssigner::new(Default::default());
            let extraction = pipeline::extract_text(file, text, &policy, &mut ids);
            Ok(serde_json::to_value(extraction)?)
        }

        Command::Extract => {
            let project = load_project(payload)?;
            let languages = languages_for(&project, payload)?;
            let summaries = pipeline::extract_languages(&project, &languages)?;
            Ok(json!({ "summaries": summaries }))
        }

        Command::Export => {
            let project = load_project(payload)?;
            let format = opt_str(payload, "format").unwrap_or("json");
            let output = opt_str(payload, "output").map(Path::new);
            let language = language_for(&project, payload)?;
            let report = pipeline::export(&project, &language, format, output)?;
            Ok(serde_json::to_value(report)?)
        }

        Command::Import => {
            let project = load_project(payload)?;
            let format = opt_str(payload, "format").unwrap_or("json");
            let input = req_str(payload, "path")?;
            let language = language_for(&project, payload)?;
            let report = pipeline::import(&project, &language, format, Path::new(input))?;
            Ok(serde_json::to_value(report)?)
        }

        Command::Inject => {
            let project = load_project(payload)?;
            let mut reports = Vec::new();
            for language in languages_for(&project, payload)? {
                reports.push(pipeline::inject(&project, &language)?);
            }
            Ok(json!({ "reports": reports }))
        }

        Command::PruneOrphans => {
            let project = load_project(payload)?;
            let mut reports = Vec::new();
            for language in languages_for(&project, payload)? {
                reports.push(pipeline::prune_orphans(&project, &language)?);
            }
            Ok(json!({ "reports": reports }))
        }

        Command::Validate => {
            let project = load_project(payload)?;
            let mut reports = Vec::new();
            for language in languages_for(&project, payload)? {
                reports.push(pipeline::validate(&project, &language)?);
            }
            Ok(json!({ "reports": reports }))
        }

        Command::Stats => {
            let project = load_project(payload)?;
            let store = pipeline::load_store(&project, &language_for(&project, payload)?)?;
            Ok(serde_json::to_value(store.stats())?)
        }

        Command::RunQa => {
            let units = if payload.get("units").is_some() {
                units_from(payload)?
            } else {
                let project = load_project(payload)?;
                pipeline::load_store(&project, &language_for(&project, payload)?)?.into_units()
            };
            Ok(json!({ "issues": qa::run(&units) }))
        }

        _ => Err(Error::InvalidRequest("unknown command".into())),
    }
}

pub fn handle(input: &str) -> String {
    let req: Value = match serde_json::from_str(input) {
        Ok(v) => v,
        Err(_) => {
            return json!({
                "status": "error",
                "message": "invalid json"
            })
            .to_string();
        }
    };

    let id = get_id(&req);
    let cmd_str = get_cmd(&req);
    let payload = get_payload(&req);

    debug!("request {id}: {cmd_str}");

    match dispatch(Command::from(cmd_str), payload) {
        Ok(payload) => ok(id, payload),
        Err(e) => {
            warn!("{cmd_str}: {e}");
            err(id, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(req: Value) -> Value {
        serde_json::from_str(&handle(&req.to_string())).unwrap()
    }

    #[test]
    fn ping_echoes_the_id() {
        let resp = call(json!({ "id": 7, "cmd": "ping" }));
        assert_eq!(resp["id"], 7);
        assert_eq!(resp["status"], "ok");
    }

    #[test]
    fn bad_input_is_an_error_response() {
        let resp: Value = serde_json::from_str(&handle("{not json")).unwrap();
        assert_eq!(resp["status"], "error");

        let resp = call(json!({ "id": "a", "cmd": "nope" }));
        assert_eq!(resp["status"], "error");
        assert_eq!(resp["message"], "invalid request: unknown command");

        let resp = call(json!({ "id": "b", "cmd": "extract", "payload": {} }));
        assert_eq!(resp["message"], "invalid request: payload.project_path is required");
    }

    #[test]
    fn parse_text_returns_filtered_units() {
        let resp = call(json!({
            "id": 1,
            "cmd": "parse_text",
            "payload": { "text": "label a:\n    e \"Good morning.\"\n    e \"bg.png\"\n" }
        }));

        assert_eq!(resp["status"], "ok");
        let units = resp["payload"]["units"].as_array().unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0]["original"], "Good morning.");
        assert_eq!(units[0]["type"], "dialogue");
        assert_eq!(resp["payload"]["dropped"]["file_reference"], 1);
    }

    #[test]
    fn run_qa_accepts_inline_units() {
        let resp = call(json!({
            "id": 2,
            "cmd": "run_qa",
            "payload": { "units": [{
                "id": "script_2_00000000",
                "file": "game/script.rpy",
                "line": 2,
                "type": "dialogue",
                "original": "Hi [name]",
                "translated": "Salut"
            }]}
        }));

        assert_eq!(resp["payload"]["issues"][0]["code"], "INTERPOLATION_MISMATCH");
    }
}
