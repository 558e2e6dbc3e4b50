use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::model::project::ProjectInfo;
use crate::services::fsio;

const PROJECT_FILE: &str = "project.json";

/// `$RENPY_TL_HOME/projects`, or `./Projects`.
pub fn projects_base_dir() -> PathBuf {
    if let Ok(home) = std::env::var("RENPY_TL_HOME") {
        if !home.trim().is_empty() {
            return PathBuf::from(home).join("projects");
        }
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("Projects")
}

/// Turns a display name, possibly pasted as a path, into a directory name.
fn safe_project_dir_name(name: &str) -> String {
    let mut n = name.trim();

    if n.contains(['/', '\\']) {
        n = n.rsplit(['/', '\\']).find(|s| !s.is_empty()).unwrap_or("");
    }

    let out: String = n
        .chars()
        .map(|ch| {
            let ok = ch.is_ascii_alphanumeric() || matches!(ch, ' ' | '_' | '-' | '.');
            if ok {
                ch
            } else {
                '_'
            }
        })
        .collect();

    let out = out.trim().trim_matches('.').to_string();
    if out.is_empty() {
        "Project".to_string()
    } else {
        out
    }
}

pub fn list_projects() -> Result<Vec<ProjectInfo>> {
    list_projects_in(&projects_base_dir())
}

/// Projects under `base`, sorted by name. Directories without a readable
/// `project.json` are skipped.
pub fn list_projects_in(base: &Path) -> Result<Vec<ProjectInfo>> {
    if !base.exists() {
        return Ok(Vec::new());
    }

    let mut projects = Vec::new();
    for entry in fs::read_dir(base)?.flatten() {
        let dir = entry.path();
        if !dir.join(PROJECT_FILE).exists() {
            continue;
        }
        match open_project(&dir) {
            Ok(p) => projects.push(p),
            Err(e) => warn!("skipping {}: {e}", dir.display()),
        }
    }

    projects.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(projects)
}

pub fn create_project(name: &str, game_root: &str, languages: Vec<String>) -> Result<ProjectInfo> {
    create_project_in(&projects_base_dir(), name, game_root, languages)
}

pub fn create_project_in(
    base: &Path,
    name: &str,
    game_root: &str,
    languages: Vec<String>,
) -> Result<ProjectInfo> {
    let project_dir = base.join(safe_project_dir_name(name));
    if project_dir.exists() {
        return Err(Error::ProjectExists { path: project_dir });
    }

    let project = ProjectInfo {
        name: name.trim().to_string(),
        project_path: project_dir.to_string_lossy().to_string(),
        root_path: game_root.trim().to_string(),
        languages,
        ..Default::default()
    };

    // A project must point at a real game before anything is written.
    project.paths()?;

    fs::create_dir_all(&project_dir)?;
    write_project_file(&project_dir, &project)?;

    info!("created project {} at {}", project.name, project_dir.display());
    Ok(project)
}

pub fn open_project(project_path: impl AsRef<Path>) -> Result<ProjectInfo> {
    let dir = project_path.as_ref();
    let path = dir.join(PROJECT_FILE);

    if !path.exists() {
        return Err(Error::MissingProjectPaths { path });
    }

    let data = fs::read_to_string(&path)?;
    let mut project: ProjectInfo = serde_json::from_str(&data)?;

    // The directory it was opened from wins over a stale stored value.
    project.project_path = dir.to_string_lossy().to_string();
    Ok(project)
}

pub fn save_project(project: ProjectInfo) -> Result<ProjectInfo> {
    save_project_in(&projects_base_dir(), project)
}

pub fn save_project_in(base: &Path, mut project: ProjectInfo) -> Result<ProjectInfo> {
    let project_dir = match project.project_path.trim() {
        "" => base.join(safe_project_dir_name(&project.name)),
        pp => PathBuf::from(pp),
    };

    fs::create_dir_all(&project_dir)?;
    project.project_path = project_dir.to_string_lossy().to_string();

    write_project_file(&project_dir, &project)?;
    Ok(project)
}

fn write_project_file(dir: &Path, project: &ProjectInfo) -> Result<()> {
    let json = serde_json::to_string_pretty(project)?;
    fsio::write_atomic(&dir.join(PROJECT_FILE), json.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_become_directory_names() {
        assert_eq!(safe_project_dir_name("My Game: Part 2"), "My Game_ Part 2");
        assert_eq!(safe_project_dir_name("C:\\games\\Demo\\"), "Demo");
        assert_eq!(safe_project_dir_name("../.."), "Project");
    }

    #[test]
    fn create_open_list_save() {
        let home = tempfile::tempdir().unwrap();
        let game = tempfile::tempdir().unwrap();
        fs::create_dir(game.path().join("game")).unwrap();
        let base = home.path().join("projects");
        let root = game.path().to_string_lossy().to_string();

        let created = create_project_in(&base, "Demo", &root, vec!["french".into()]).unwrap();
        assert!(matches!(
            create_project_in(&base, "Demo", &root, vec![]),
            Err(Error::ProjectExists { .. })
        ));

        let mut opened = open_project(&created.project_path).unwrap();
        assert_eq!(opened.languages, vec!["french".to_string()]);

        opened.languages.push("german".into());
        save_project_in(&base, opened).unwrap();

        let listed = list_projects_in(&base).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].languages.len(), 2);
    }

    #[test]
    fn projects_need_an_existing_game() {
        let home = tempfile::tempdir().unwrap();
        let result = create_project_in(home.path(), "Ghost", "/no/such/game", vec![]);

        assert!(matches!(result, Err(Error::MissingProjectPaths { .. })));
        assert!(!home.path().join("Ghost").exists());
    }
}
