#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Ping,
    DetectEncoding,
    ParseText,
    ProjectList,
    ProjectCreate,
    ProjectOpen,
    ProjectSave,
    Extract,
    Export,
    Import,
    Inject,
    PruneOrphans,
    Validate,
    Stats,
    RunQa,
    Unknown,
}

impl Command {
    pub fn is_project(self) -> bool {
        matches!(
            self,
            Command::ProjectList | Command::ProjectCreate | Command::ProjectOpen | Command::ProjectSave
        )
    }
}

impl From<&str> for Command {
    fn from(s: &str) -> Self {
        match s {
            "ping" => Command::Ping,
            "encoding.detect" | "detect_encoding" => Command::DetectEncoding,
            "parse_text" => Command::ParseText,
            "project.list" => Command::ProjectList,
            "project.create" => Command::ProjectCreate,
            "project.open" => Command::ProjectOpen,
            "project.save" => Command::ProjectSave,
            "extract" => Command::Extract,
            "export" => Command::Export,
            "import" => Command::Import,
            "inject" => Command::Inject,
            "prune_orphans" => Command::PruneOrphans,
            "validate" => Command::Validate,
            "stats" => Command::Stats,
            "run_qa" => Command::RunQa,
            _ => Command::Unknown,
        }
    }
}
