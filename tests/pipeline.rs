use std::fs;
use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use renpy_tl_core::error::{Error, IssueKind};
use renpy_tl_core::model::project::ProjectInfo;
use renpy_tl_core::model::unit::{TextUnit, UnitKind};
use renpy_tl_core::services::merge::ORPHAN_MARK;
use renpy_tl_core::services::{pipeline, project};

const SCRIPT: &str = "\
label start:
    eileen \"Hello, world!\"
    $ title = \"My Game\"
    jump start
";

struct Fixture {
    _dirs: (TempDir, TempDir),
    game: PathBuf,
    project: ProjectInfo,
}

impl Fixture {
    fn new() -> Self {
        let game_dir = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let game = game_dir.path().to_path_buf();

        fs::create_dir_all(game.join("game")).unwrap();
        fs::write(game.join("game/script.rpy"), SCRIPT).unwrap();

        let project = project::create_project_in(
            &home.path().join("projects"),
            "Demo",
            &game.to_string_lossy(),
            vec!["french".into(), "german".into()],
        )
        .unwrap();

        Fixture {
            _dirs: (game_dir, home),
            game,
            project,
        }
    }

    fn script(&self) -> PathBuf {
        self.game.join("game/script.rpy")
    }

    fn tl_file(&self) -> PathBuf {
        self.game.join("game/tl/french/script.rpy")
    }

    fn extract(&self) -> pipeline::ExtractSummary {
        pipeline::extract_and_save(&self.project, "french").unwrap()
    }

    fn translate(&self, pairs: &[(&str, &str)]) {
        self.translate_into("french", pairs)
    }

    /// Round-trips a work file through a JSON export, filling in
    /// translations by original text.
    fn translate_into(&self, language: &str, pairs: &[(&str, &str)]) {
        let exported = pipeline::export(&self.project, language, "json", None).unwrap();
        let path = Path::new(&exported.path);

        let mut units: Vec<TextUnit> =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        for u in units.iter_mut() {
            if let Some((_, t)) = pairs.iter().find(|(o, _)| *o == u.original) {
                u.translated = Some(t.to_string());
            }
        }
        fs::write(path, serde_json::to_string(&units).unwrap()).unwrap();

        pipeline::import(&self.project, language, "json", path).unwrap();
    }
}

#[test]
fn extraction_keeps_only_player_visible_text() {
    let fx = Fixture::new();
    let (store, report) = pipeline::extract_project(&fx.project).unwrap();

    let got: Vec<_> = store
        .units()
        .iter()
        .map(|u| (u.source_file.as_str(), u.line, u.kind, u.original.as_str()))
        .collect();
    assert_eq!(
        got,
        vec![
            ("game/script.rpy", 2, UnitKind::Dialogue, "Hello, world!"),
            ("game/script.rpy", 3, UnitKind::StringLiteral, "My Game"),
        ]
    );
    assert_eq!(report.files_scanned, 1);
    assert!(report.issues.is_empty());
    assert!(store.units()[0].id.starts_with("script_2_"));
}

#[test]
fn ids_are_stable_across_extractions() {
    let fx = Fixture::new();
    let (first, _) = pipeline::extract_project(&fx.project).unwrap();
    let (second, _) = pipeline::extract_project(&fx.project).unwrap();

    let ids = |s: &renpy_tl_core::services::store::TranslationStore| {
        s.units().iter().map(|u| u.id.clone()).collect::<Vec<_>>()
    };
    assert_eq!(ids(&first), ids(&second));
}

#[test]
fn translate_inject_and_rerun() {
    let fx = Fixture::new();
    fx.extract();
    fx.translate(&[("Hello, world!", "Bonjour, le monde !"), ("My Game", "Mon jeu")]);

    let report = pipeline::inject(&fx.project, "french").unwrap();
    assert_eq!(report.added, 2);
    assert_eq!(report.written, 1);

    let text = fs::read_to_string(fx.tl_file()).unwrap();
    assert!(text.contains("# game/script.rpy:2\ntranslate french script_2_"));
    assert!(text.contains("    # eileen \"Hello, world!\"\n    eileen \"Bonjour, le monde !\"\n"));
    assert!(text.contains("    # \"My Game\"\n    \"Mon jeu\"\n"));

    // Nothing changed, so nothing is rewritten.
    let again = pipeline::inject(&fx.project, "french").unwrap();
    assert_eq!(again.written, 0);
    assert_eq!(again.files[0].report.unchanged, 2);
    assert_eq!(fs::read_to_string(fx.tl_file()).unwrap(), text);
}

#[test]
fn hand_written_blocks_survive_injection() {
    let fx = Fixture::new();
    fx.extract();
    fx.translate(&[("Hello, world!", "Bonjour !")]);
    pipeline::inject(&fx.project, "french").unwrap();

    let mut text = fs::read_to_string(fx.tl_file()).unwrap();
    text.push_str("translate french custom_note:\n\n    e \"Ajout manuel.\"\n");
    fs::write(fx.tl_file(), &text).unwrap();

    pipeline::inject(&fx.project, "french").unwrap();
    let after = fs::read_to_string(fx.tl_file()).unwrap();

    assert!(after.contains("translate french custom_note:\n\n    e \"Ajout manuel.\"\n"));
    assert!(after.contains("    eileen \"Bonjour !\"\n"));
}

#[test]
fn removed_lines_are_orphaned_then_pruned() {
    let fx = Fixture::new();
    fx.extract();
    fx.translate(&[("Hello, world!", "Bonjour !"), ("My Game", "Mon jeu")]);
    pipeline::inject(&fx.project, "french").unwrap();

    fs::write(fx.script(), SCRIPT.replace("Hello, world!", "Hello again!")).unwrap();
    let summary = fx.extract();
    assert_eq!(summary.adopt.lost.len(), 1);
    assert!(Path::new(summary.backup.as_deref().unwrap()).exists());

    let report = pipeline::inject(&fx.project, "french").unwrap();
    assert_eq!(report.orphaned, 1);

    let text = fs::read_to_string(fx.tl_file()).unwrap();
    assert!(text.contains(ORPHAN_MARK));
    assert!(text.contains("    eileen \"Bonjour !\"\n"));
    assert!(text.contains("    \"Mon jeu\"\n"));

    let pruned = pipeline::prune_orphans(&fx.project, "french").unwrap();
    assert_eq!(pruned.removed, 1);

    let text = fs::read_to_string(fx.tl_file()).unwrap();
    assert!(!text.contains(ORPHAN_MARK));
    assert!(!text.contains("Bonjour !"));
    assert!(text.contains("    \"Mon jeu\"\n"));
}

#[test]
fn moved_lines_keep_their_translation() {
    let fx = Fixture::new();
    fx.extract();
    fx.translate(&[("Hello, world!", "Bonjour !")]);

    fs::write(fx.script(), format!("# chapter one\n{SCRIPT}")).unwrap();
    let summary = fx.extract();
    assert_eq!(summary.adopt.rematched, 1);
    assert!(summary.adopt.lost.is_empty());

    let store = pipeline::load_store(&fx.project, "french").unwrap();
    let hello = store.units().iter().find(|u| u.original == "Hello, world!").unwrap();
    assert_eq!(hello.line, 3);
    assert_eq!(hello.translation(), Some("Bonjour !"));
}

#[test]
fn escaped_text_round_trips_into_the_translation_file() {
    let fx = Fixture::new();
    fs::write(fx.script(), "label start:\n    e \"She said \\\"hi\\\"\\nthen left.\"\n").unwrap();
    fx.extract();

    let store = pipeline::load_store(&fx.project, "french").unwrap();
    assert_eq!(store.units()[0].original, "She said \"hi\"\nthen left.");

    fx.translate(&[("She said \"hi\"\nthen left.", "Elle a dit \"salut\"\npuis est partie.")]);
    pipeline::inject(&fx.project, "french").unwrap();

    let text = fs::read_to_string(fx.tl_file()).unwrap();
    assert!(text.contains("    e \"Elle a dit \\\"salut\\\"\\npuis est partie.\"\n"));
}

#[test]
fn missing_game_directory_fails_the_project() {
    let project = ProjectInfo {
        root_path: "/no/such/game".into(),
        ..Default::default()
    };
    assert!(matches!(
        pipeline::extract_project(&project),
        Err(Error::MissingProjectPaths { .. })
    ));
}

#[test]
fn undecodable_scripts_are_skipped_and_reported() {
    let fx = Fixture::new();
    fs::write(fx.game.join("game/broken.rpy"), b"label x:\n    e \"\xff\xfe\xfd\"\n").unwrap();

    let project = ProjectInfo {
        encodings: vec!["utf-8".into()],
        ..fx.project.clone()
    };
    let (store, report) = pipeline::extract_project(&project).unwrap();

    assert_eq!(report.files_scanned, 2);
    assert_eq!(report.files_skipped, 1);
    assert_eq!(report.issues[0].kind, IssueKind::UnreadableFile);
    assert_eq!(store.len(), 2);
}

#[test]
fn engine_and_excluded_files_are_not_scanned() {
    let fx = Fixture::new();
    fs::write(fx.game.join("game/00console.rpy"), "label c:\n    e \"Console text\"\n").unwrap();
    fs::create_dir_all(fx.game.join("game/tl/french")).unwrap();
    fs::write(fx.game.join("game/tl/french/extra.rpy"), "label t:\n    e \"Bonjour\"\n").unwrap();

    let (store, report) = pipeline::extract_project(&fx.project).unwrap();
    assert_eq!(report.files_scanned, 1);
    assert_eq!(store.len(), 2);
}

#[test]
fn scripts_that_lose_every_line_orphan_their_translations() {
    let fx = Fixture::new();
    let side = fx.game.join("game/side.rpy");
    fs::write(&side, "label side:\n    e \"A side note.\"\n").unwrap();
    fx.extract();
    fx.translate(&[("A side note.", "Une remarque.")]);
    pipeline::inject(&fx.project, "french").unwrap();

    fs::write(&side, "label side:\n    return\n").unwrap();
    fx.extract();
    let report = pipeline::inject(&fx.project, "french").unwrap();
    assert_eq!(report.orphaned, 1);

    let tl_side = fx.game.join("game/tl/french/side.rpy");
    let text = fs::read_to_string(&tl_side).unwrap();
    assert!(text.contains(&format!("{ORPHAN_MARK}\n# game/side.rpy:2\ntranslate french side_2_")));

    let pruned = pipeline::prune_orphans(&fx.project, "french").unwrap();
    assert_eq!(pruned.removed, 1);
    assert!(!fs::read_to_string(&tl_side).unwrap().contains("Une remarque."));
}

#[test]
fn languages_keep_separate_translations() {
    let fx = Fixture::new();
    pipeline::extract_languages(&fx.project, &fx.project.languages).unwrap();

    fx.translate_into("german", &[("Hello, world!", "Hallo, Welt!")]);
    pipeline::inject(&fx.project, "german").unwrap();
    fx.translate_into("french", &[("Hello, world!", "Bonjour !")]);
    for language in &fx.project.languages {
        pipeline::inject(&fx.project, language).unwrap();
    }

    let german = fs::read_to_string(fx.game.join("game/tl/german/script.rpy")).unwrap();
    assert!(german.contains("translate german script_2_"));
    assert!(german.contains("    eileen \"Hallo, Welt!\"\n"));
    assert!(!german.contains("Bonjour"));
    assert!(!german.contains("# replaced:"));

    let french = fs::read_to_string(fx.tl_file()).unwrap();
    assert!(french.contains("    eileen \"Bonjour !\"\n"));
    assert!(!french.contains("Hallo"));

    let stats = pipeline::load_store(&fx.project, "german").unwrap().stats();
    assert_eq!(stats.translated, 1);
}

#[test]
fn validation_sees_injected_and_orphaned_blocks() {
    let fx = Fixture::new();
    fx.extract();
    fx.translate(&[("Hello, world!", "Bonjour !"), ("My Game", "Mon jeu")]);
    pipeline::inject(&fx.project, "french").unwrap();

    fs::write(fx.script(), SCRIPT.replace("Hello, world!", "Hello again!")).unwrap();
    fx.extract();
    pipeline::inject(&fx.project, "french").unwrap();

    let report = pipeline::validate(&fx.project, "french").unwrap();
    assert_eq!(report.files.len(), 1);
    assert_eq!(report.blocks, 2);
    assert_eq!(report.orphaned, 1);
    assert_eq!(report.unreadable, 0);
}
