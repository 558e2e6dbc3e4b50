use serde_json::{json, Value};

use super::{opt_str, req_str, Command};
use crate::error::{Error, Result};
use crate::model::project::ProjectInfo;
use crate::services::project as service;

pub fn handle(cmd: Command, payload: &Value) -> Result<Value> {
    match cmd {
        Command::ProjectList => {
            let projects = service::list_projects()?;
            Ok(json!({ "projects": projects }))
        }

        Command::ProjectCreate => {
            let name = req_str(payload, "name")?;
            let game_root = req_str(payload, "game_root")?;
            let languages = match payload.get("languages") {
                Some(v) => serde_json::from_value::<Vec<String>>(v.clone())
                    .map_err(|e| Error::InvalidRequest(format!("payload.languages: {e}")))?,
                None => opt_str(payload, "language")
                    .map(|l| vec![l.to_string()])
                    .unwrap_or_default(),
            };

            let project = service::create_project(name, game_root, languages)?;
            Ok(json!({
                "project_path": project.project_path,
                "project": project
            }))
        }

        Command::ProjectOpen => {
            let path = req_str(payload, "project_path")?;
            let project = service::open_project(path)?;
            Ok(json!({ "project": project }))
        }

        Command::ProjectSave => {
            let value = payload
                .get("project")
                .filter(|v| !v.is_null())
                .cloned()
                .ok_or_else(|| Error::InvalidRequest("payload.project is required".into()))?;

            let project: ProjectInfo = serde_json::from_value(value)
                .map_err(|e| Error::InvalidRequest(format!("invalid payload.project: {e}")))?;

            let saved = service::save_project(project)?;
            Ok(json!({ "project": saved }))
        }

        other => Err(Error::InvalidRequest(format!("not a project command: {other:?}"))),
    }
}
