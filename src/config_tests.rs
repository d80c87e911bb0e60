use super::*;
use tempfile::TempDir;

fn env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
    move |key: &str| {
        pairs
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| value.to_string())
    }
}

#[test]
fn minimal_file_fills_defaults() {
    let config: PipelineConfig =
        serde_json::from_str(r#"{ "schema_version": 1 }"#).expect("parse");
    assert_eq!(config, default_config());
    assert_eq!(config.recipe_command, vec!["esorex"]);
    assert_eq!(config.stage_mode, StageMode::Link);
    assert_eq!(config.restage, RestagePolicy::Overwrite);
}

#[test]
fn file_settings_parse_with_recipe_overrides() {
    let text = r#"{
        "schema_version": 1,
        "raw_dir": "/data/raw",
        "stage_mode": "copy",
        "restage": "skip_existing",
        "recipe_command": ["esorex", "--suppress-prefix=TRUE"],
        "recipes": { "dark_calibration": "hawki_dark_combine" }
    }"#;
    let config: PipelineConfig = serde_json::from_str(text).expect("parse");
    assert_eq!(config.raw_dir, Some(PathBuf::from("/data/raw")));
    assert_eq!(config.stage_mode, StageMode::Copy);
    assert_eq!(config.restage, RestagePolicy::SkipExisting);
    assert_eq!(
        config.recipes.get(&OperationKind::DarkCalibration).map(String::as_str),
        Some("hawki_dark_combine")
    );
    validate_config(&config).expect("valid");
}

#[test]
fn unknown_fields_are_rejected() {
    let err = serde_json::from_str::<PipelineConfig>(r#"{ "schema_version": 1, "rawdir": "/x" }"#)
        .expect_err("typo must fail");
    assert!(err.to_string().contains("rawdir"), "{err}");
}

#[test]
fn environment_overrides_file_values() {
    let mut config = default_config();
    config.work_root = Some(PathBuf::from("/from/file"));
    apply_env_overrides(
        &mut config,
        env(&[
            (ENV_WORK_ROOT, "/from/env"),
            (ENV_RAW_DIR, "  "),
            (ENV_RECIPE_COMMAND, "sh '/opt/my recipes/run.sh'"),
        ]),
    )
    .expect("apply env");
    assert_eq!(config.work_root, Some(PathBuf::from("/from/env")));
    assert_eq!(config.raw_dir, None);
    assert_eq!(config.recipe_command, vec!["sh", "/opt/my recipes/run.sh"]);
}

#[test]
fn unbalanced_recipe_command_is_an_error() {
    let mut config = default_config();
    let err = apply_env_overrides(&mut config, env(&[(ENV_RECIPE_COMMAND, "sh 'oops")]))
        .expect_err("unbalanced quote");
    assert!(format!("{err:#}").contains(ENV_RECIPE_COMMAND));
}

#[test]
fn validation_rejects_bad_schema_and_empty_command() {
    let mut config = default_config();
    config.schema_version = 7;
    assert!(validate_config(&config).is_err());

    let mut config = default_config();
    config.recipe_command.clear();
    assert!(validate_config(&config).is_err());

    let mut config = default_config();
    config.recipes.insert(OperationKind::Stitch, " ".into());
    assert!(validate_config(&config).is_err());
}

#[test]
fn setup_roots_require_existing_directories() {
    let temp = TempDir::new().expect("temp dir");
    let mut config = default_config();
    config.work_root = Some(temp.path().join("runs"));

    let err = config.setup_roots().expect_err("raw_dir unset");
    assert!(err.to_string().contains(ENV_RAW_DIR), "{err}");

    config.raw_dir = Some(temp.path().to_path_buf());
    config.calib_dir = Some(temp.path().join("missing"));
    let err = config.setup_roots().expect_err("calib_dir missing");
    assert!(err.to_string().contains("not a directory"), "{err}");

    config.calib_dir = Some(temp.path().to_path_buf());
    let roots = config.setup_roots().expect("roots");
    assert_eq!(roots.work_root, temp.path().join("runs"));
    assert!(!roots.work_root.exists());
}

#[test]
fn rendered_config_round_trips() {
    let mut config = default_config();
    config.recipes.insert(OperationKind::Combine, "combine_v2".into());
    let text = render_config(&config).expect("render");
    assert!(text.ends_with("}\n"));
    let parsed: PipelineConfig = serde_json::from_str(&text).expect("parse");
    assert_eq!(parsed, config);
}
