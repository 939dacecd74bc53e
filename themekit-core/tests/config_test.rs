use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;
use themekit_core::config::Config;

#[test]
fn test_parse_config() {
    let toml = r#"
[project]
name = "my-theme"
dist_dir = "./dist/"
enable_lint = true
version = "2.1.0"

[watch]
debounce_ms = 250

[[files.sass]]
cwd = "styles/"
src = ["main.scss"]
dest = "css/"
"#;

    let config: Config = toml::from_str(toml).unwrap();
    assert_eq!(config.project.name, "my-theme");
    assert_eq!(config.project.src_dir, PathBuf::from("./"));
    assert!(config.project.enable_lint);
    assert_eq!(config.watch.debounce_ms, 250);
    assert_eq!(config.files.sass[0].cwd, PathBuf::from("styles/"));
    assert_eq!(config.files.ts[0].src, vec!["master.js"]);
    assert!(config.validate().is_ok());
}

#[test]
fn test_discover_defaults_without_file() {
    let temp = TempDir::new().unwrap();
    let config = Config::discover(temp.path(), None).unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.project.text_domain(), "bagan-html");
}

#[test]
fn test_discover_reads_file() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("themekit.toml"),
        "[project]\nname = \"other\"\n",
    )
    .unwrap();

    let config = Config::discover(temp.path(), None).unwrap();
    assert_eq!(config.project.name, "other");
}

#[test]
fn test_invalid_toml_is_config_invalid() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("broken.toml");
    fs::write(&path, "[project\nname = ").unwrap();

    let err = Config::discover(temp.path(), Some(&path)).unwrap_err();
    assert_eq!(err.kind(), "config-invalid");
}

#[test]
fn test_empty_src_rejected() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("themekit.toml"),
        "[[files.sass]]\ncwd = \"sass/\"\nsrc = []\n",
    )
    .unwrap();

    let err = Config::discover(temp.path(), None).unwrap_err();
    assert!(err.to_string().contains("no src patterns"));
}

#[test]
fn test_missing_explicit_file_is_io_error() {
    let temp = TempDir::new().unwrap();
    let err = Config::discover(temp.path(), Some(&PathBuf::from("nope.toml"))).unwrap_err();
    assert_eq!(err.kind(), "io-failed");
}
