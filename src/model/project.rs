use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::services::encoding::DEFAULT_CANDIDATES;
use crate::services::filter::FilterPolicy;
use crate::services::ident::IdScheme;

fn default_encodings() -> Vec<String> {
    DEFAULT_CANDIDATES.iter().map(|s| s.to_string()).collect()
}

fn default_exclude_dirs() -> Vec<String> {
    ["tl", "renpy", "cache", "saved"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_exclude_prefixes() -> Vec<String> {
    vec!["00".to_string()]
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProjectInfo {
    #[serde(default)]
    pub name: String,

    /// Directory holding `project.json` and the interchange work file.
    #[serde(default)]
    pub project_path: String,

    #[serde(default, alias = "game_root")]
    pub root_path: String,

    /// Script directory; `<root_path>/game` when empty.
    #[serde(default)]
    pub source_dir: String,

    /// Translations directory; `<source_dir>/tl` when empty.
    #[serde(default)]
    pub tl_dir: String,

    #[serde(default)]
    pub languages: Vec<String>,

    #[serde(default = "default_encodings")]
    pub encodings: Vec<String>,

    #[serde(default)]
    pub filter: FilterPolicy,

    #[serde(default)]
    pub id_scheme: IdScheme,

    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,

    #[serde(default = "default_exclude_prefixes")]
    pub exclude_prefixes: Vec<String>,
}

impl Default for ProjectInfo {
    fn default() -> Self {
        ProjectInfo {
            name: String::new(),
            project_path: String::new(),
            root_path: String::new(),
            source_dir: String::new(),
            tl_dir: String::new(),
            languages: Vec::new(),
            encodings: default_encodings(),
            filter: FilterPolicy::default(),
            id_scheme: IdScheme::default(),
            exclude_dirs: default_exclude_dirs(),
            exclude_prefixes: default_exclude_prefixes(),
        }
    }
}

/// Resolved, existence-checked directories of one project.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    pub game_root: PathBuf,
    pub source_dir: PathBuf,
    pub tl_dir: PathBuf,
}

impl ProjectInfo {
    /// Resolves the project directories. A missing game root or source
    /// directory is fatal for this project; the translations directory is
    /// created on demand by injection and may be absent.
    pub fn paths(&self) -> Result<ProjectPaths> {
        let game_root = PathBuf::from(self.root_path.trim());
        if self.root_path.trim().is_empty() || !game_root.is_dir() {
            return Err(Error::MissingProjectPaths { path: game_root });
        }

        let source_dir = if self.source_dir.trim().is_empty() {
            game_root.join("game")
        } else {
            resolve(&game_root, &self.source_dir)
        };
        if !source_dir.is_dir() {
            return Err(Error::MissingProjectPaths { path: source_dir });
        }

        let tl_dir = if self.tl_dir.trim().is_empty() {
            source_dir.join("tl")
        } else {
            resolve(&game_root, &self.tl_dir)
        };

        Ok(ProjectPaths {
            game_root,
            source_dir,
            tl_dir,
        })
    }

    /// The work file of one target language. Every language keeps its own
    /// translations, so injecting one never touches another's text.
    pub fn work_file(&self, language: &str) -> Result<PathBuf> {
        let language = check_language(language)?;
        Ok(Path::new(&self.project_path).join(format!("translation_work.{language}.json")))
    }
}

/// A language name is a single directory under the translations directory.
pub fn check_language(language: &str) -> Result<&str> {
    let language = language.trim();
    if language.is_empty() || language.contains(['/', '\\']) || language.starts_with('.') {
        return Err(Error::InvalidRequest(format!("bad language name: {language:?}")));
    }
    Ok(language)
}

fn resolve(base: &Path, p: &str) -> PathBuf {
    let p = Path::new(p.trim());
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_project_json_gets_defaults() {
        let p: ProjectInfo =
            serde_json::from_str(r#"{ "name": "demo", "game_root": "/tmp/demo" }"#).unwrap();

        assert_eq!(p.root_path, "/tmp/demo");
        assert_eq!(p.filter.min_length, 2);
        assert_eq!(p.encodings[0], "utf-8-sig");
        assert!(p.exclude_dirs.iter().any(|d| d == "tl"));
    }

    #[test]
    fn work_files_are_per_language() {
        let p = ProjectInfo {
            project_path: "/p/Demo".into(),
            ..Default::default()
        };

        assert_eq!(
            p.work_file("french").unwrap(),
            PathBuf::from("/p/Demo/translation_work.french.json")
        );
        assert!(matches!(p.work_file("../x"), Err(Error::InvalidRequest(_))));
        assert!(matches!(p.work_file(" "), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn missing_game_root_is_reported() {
        let p = ProjectInfo {
            root_path: "/definitely/not/here".into(),
            ..Default::default()
        };

        match p.paths() {
            Err(Error::MissingProjectPaths { path }) => {
                assert_eq!(path, PathBuf::from("/definitely/not/here"))
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
