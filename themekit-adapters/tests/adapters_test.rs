use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use tempfile::TempDir;

use themekit_adapters::register_builtin;
use themekit_core::config::ProjectConfig;
use themekit_core::context::RunContext;
use themekit_core::executor::Executor;
use themekit_core::fileset::FileSetPattern;
use themekit_core::options::{
    ArchiveMode, ArchiveOptions, BundleMode, BundleOptions, BundleOutput, CleanOptions,
    CopyOptions, CssMinifyOptions, Devtool, JsMinifyOptions, LoaderRule, PotOptions,
    SassOptions, StyleLintOptions, TextDomainOptions, WatchGroup, WatchOptions,
};
use themekit_core::registry::TaskRegistry;
use themekit_core::reporter::{MemorySink, Reporter};
use themekit_core::task::{AdapterConfig, LeafTask};
use themekit_core::Result;

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn builtin_registry() -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    register_builtin(&mut registry);
    registry
}

/// Runs `task` against a project rooted at `root`; returns the result and
/// everything the reporter printed.
fn run(root: &Path, registry: TaskRegistry, task: &str) -> (Result<()>, String) {
    let (reporter, sink) = Reporter::memory();
    let ctx = RunContext::new(ProjectConfig::default(), registry, reporter, root);
    let result = Executor::new(&ctx).run_task(task);
    (result, sink.contents())
}

fn sass_task() -> LeafTask {
    LeafTask::new(AdapterConfig::Sass(SassOptions {
        source_map: true,
        omit_source_map_url: true,
        ..SassOptions::default()
    }))
    .with_file(FileSetPattern::new("sass/", ["*.scss", "!_*.scss"], "css/").with_ext("scss", "css"))
}

#[test]
fn test_sass_compiles_entries_but_not_partials() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "sass/master.scss", "$x: 1; .a{margin:$x}");
    write(dir.path(), "sass/_p.scss", ".p { color: red; }");

    let mut registry = builtin_registry();
    registry.register_multi("sass", [("compile", sass_task())]);
    let (result, output) = run(dir.path(), registry, "sass");

    result.unwrap();
    let css = fs::read_to_string(dir.path().join("css/master.css")).unwrap();
    assert!(css.contains("margin: 1"));
    assert!(!css.contains("sourceMappingURL"));
    let map: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(dir.path().join("css/master.css.map")).unwrap(),
    )
    .unwrap();
    assert_eq!(map["sources"][0], "../sass/master.scss");
    assert_eq!(map["mappings"], "");
    assert!(!dir.path().join("css/_p.css").exists());
    assert!(output.contains("Running \"sass:compile\" (sass) task"));
}

#[test]
fn test_sass_error_fails_task() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "sass/master.scss", ".a { margin: $missing; }");

    let mut registry = builtin_registry();
    registry.register_multi("sass", [("compile", sass_task())]);
    let (result, _) = run(dir.path(), registry, "sass");

    assert_eq!(result.unwrap_err().kind(), "adapter-failed");
    assert!(!dir.path().join("css/master.css").exists());
}

fn bundle_task(root: &Path) -> LeafTask {
    LeafTask::new(AdapterConfig::Bundle(BundleOptions {
        mode: BundleMode::Production,
        entry: root.join("src/master.js"),
        output: BundleOutput {
            path: root.join("js"),
            filename: "index.js".to_string(),
        },
        devtool: Devtool::SourceMap,
        rules: vec![LoaderRule::new(r"\.tsx?$", ["ts-loader"]).exclude("node_modules")],
        resolve_extensions: vec![".tsx".to_string(), ".ts".to_string(), ".js".to_string()],
    }))
}

#[test]
fn test_bundle_writes_script_and_map() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "src/master.js",
        "import { greet } from './greet';\nexport const hello = greet('theme');\n",
    );
    write(
        dir.path(),
        "src/greet.ts",
        "export function greet(name: string): string {\n  return 'hi ' + name;\n}\n",
    );

    let mut registry = builtin_registry();
    registry.register_multi("bundle", [("master", bundle_task(dir.path()))]);
    registry.register_alias("ts", ["bundle"]);
    let (result, output) = run(dir.path(), registry, "ts");

    result.unwrap();
    let script = fs::read_to_string(dir.path().join("js/index.js")).unwrap();
    assert!(!script.is_empty());
    assert!(script.contains("function greet(name)"));
    assert!(script.contains("//# sourceMappingURL=index.js.map"));
    let map: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("js/index.js.map")).unwrap())
            .unwrap();
    assert_eq!(map["version"], 3);
    assert!(output.contains("index.js"));
}

#[test]
fn test_bundle_reports_missing_module() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "src/master.js", "import './nowhere';\n");

    let mut registry = builtin_registry();
    registry.register_multi("bundle", [("master", bundle_task(dir.path()))]);
    let (result, _) = run(dir.path(), registry, "bundle");

    let message = result.unwrap_err().to_string();
    assert!(message.contains("Module not found"));
    assert!(!dir.path().join("js/index.js").exists());
}

fn boot_registry() -> TaskRegistry {
    let mut registry = builtin_registry();
    registry.register_multi(
        "clean",
        [(
            "dist",
            LeafTask::new(AdapterConfig::Clean(CleanOptions { force: true }))
                .with_file(FileSetPattern::new("build", ["**"], "")),
        )],
    );
    registry.register_multi(
        "copy",
        [(
            "dist",
            LeafTask::new(AdapterConfig::Copy(CopyOptions::default())).with_file(
                FileSetPattern::new(
                    "",
                    ["**", "!build/**", "!**/sass/**", "!**/*.map", "!none"],
                    "build",
                ),
            ),
        )],
    );
    registry.register_alias("boot", ["clean", "copy"]);
    registry
}

#[test]
fn test_boot_replaces_dist_contents() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "style.css", "body {}");
    write(root, "inc/functions.php", "<?php");
    write(root, "css/master.css.map", "{}");
    write(root, "sass/master.scss", ".a {}");
    write(root, "none", "");
    write(root, "build/old.txt", "stale");
    write(root, "build/gone/deep.txt", "stale");

    let (result, _) = run(root, boot_registry(), "boot");

    result.unwrap();
    let dist = root.join("build");
    assert!(!dist.join("old.txt").exists());
    assert!(!dist.join("gone").exists());
    assert!(dist.join("style.css").is_file());
    assert!(dist.join("inc/functions.php").is_file());
    assert!(!dist.join("css/master.css.map").exists());
    assert!(!dist.join("sass").exists());
    assert!(!dist.join("none").exists());
}

#[test]
fn test_clean_refuses_outside_root_without_force() {
    let outside = TempDir::new().unwrap();
    write(outside.path(), "keep.txt", "x");
    let dir = TempDir::new().unwrap();

    let mut registry = builtin_registry();
    registry.register_leaf(
        "clean",
        LeafTask::new(AdapterConfig::Clean(CleanOptions { force: false })).with_file(
            FileSetPattern::new(outside.path(), ["*.txt"], ""),
        ),
    );
    let (result, _) = run(dir.path(), registry, "clean");

    assert!(result.unwrap_err().to_string().contains("outside"));
    assert!(outside.path().join("keep.txt").is_file());
}

#[test]
fn test_minify_in_place() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "build/js/app.js",
        "/*! keep me */\n// drop me\nfunction add(a, b) {\n    return a + b;\n}\n",
    );
    write(dir.path(), "build/css/site.css", ".a {\n  color: red;\n  margin: 0px;\n}\n");

    let mut registry = builtin_registry();
    registry.register_leaf(
        "jsmin",
        LeafTask::new(AdapterConfig::MinifyJs(JsMinifyOptions::default()))
            .with_file(FileSetPattern::new("build", ["**/*.js"], "build")),
    );
    registry.register_leaf(
        "cssmin",
        LeafTask::new(AdapterConfig::MinifyCss(CssMinifyOptions {
            force: true,
            compress: true,
        }))
        .with_file(FileSetPattern::new("build", ["**/*.css"], "build")),
    );
    registry.register_alias("minify", ["jsmin", "cssmin"]);
    let (result, _) = run(dir.path(), registry, "minify");

    result.unwrap();
    let js = fs::read_to_string(dir.path().join("build/js/app.js")).unwrap();
    assert!(js.contains("/*! keep me */"));
    assert!(!js.contains("drop me"));
    assert!(js.contains("return a+b"));
    let css = fs::read_to_string(dir.path().join("build/css/site.css")).unwrap();
    assert_eq!(css, ".a{color:red;margin:0}");
}

#[test]
fn test_archive_prefixes_entries() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "build/style.css", "body{}");
    write(dir.path(), "build/js/index.js", "1;");
    let archive = dir.path().join("bagan-html-1.0.0.zip");

    let mut registry = builtin_registry();
    registry.register_leaf(
        "compress",
        LeafTask::new(AdapterConfig::Archive(ArchiveOptions {
            mode: ArchiveMode::Zip,
            archive: archive.clone(),
            prefix: "bagan-html".to_string(),
        }))
        .with_file(FileSetPattern::new("build", ["**"], "")),
    );
    let (result, _) = run(dir.path(), registry, "compress");

    result.unwrap();
    let mut zip = zip::ZipArchive::new(fs::File::open(&archive).unwrap()).unwrap();
    let mut names: Vec<String> = zip.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(names, vec!["bagan-html/js/index.js", "bagan-html/style.css"]);
    let mut contents = String::new();
    zip.by_name("bagan-html/style.css")
        .unwrap()
        .read_to_string(&mut contents)
        .unwrap();
    assert_eq!(contents, "body{}");
}

#[test]
fn test_makepot_and_textdomain() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "index.php",
        "<?php\necho esc_html__( 'Read more', 'bagan-html' );\n_e( 'Wrong', 'twentytwenty' );\n",
    );

    let mut registry = builtin_registry();
    registry.register_leaf(
        "makepot",
        LeafTask::new(AdapterConfig::Pot(PotOptions {
            text_domain: "bagan-html".to_string(),
            domain_path: "languages".into(),
            package_name: "bagan-html".to_string(),
            package_version: "1.0.0".to_string(),
            keywords: Vec::new(),
        }))
        .with_file(FileSetPattern::new("", ["**/*.php"], "")),
    );
    let (result, _) = run(dir.path(), registry, "makepot");
    result.unwrap();

    let pot = fs::read_to_string(dir.path().join("languages/bagan-html.pot")).unwrap();
    assert!(pot.contains("#: index.php:2\nmsgid \"Read more\""));
    assert!(!pot.contains("Wrong"));

    let mut registry = builtin_registry();
    registry.register_leaf(
        "checktextdomain",
        LeafTask::new(AdapterConfig::TextDomain(TextDomainOptions {
            text_domain: "bagan-html".to_string(),
            keywords: Vec::new(),
            report_missing: true,
        }))
        .with_file(FileSetPattern::new("", ["**/*.php"], "")),
    );
    let (result, _) = run(dir.path(), registry, "checktextdomain");
    let message = result.unwrap_err().to_string();
    assert!(message.contains("index.php:3  Incorrect text domain used (\"twentytwenty\")  (_e)"));
}

#[test]
fn test_stylelint_fixes_then_reports_remaining() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "sass/master.scss", ".a {  \n    color: red;\n}\n.b {}");
    write(dir.path(), ".stylelintrc", r#"{"rules": {"final-newline": true}}"#);

    let lint = |fix: bool| {
        let mut registry = builtin_registry();
        registry.register_leaf(
            "stylelint",
            LeafTask::new(AdapterConfig::StyleLint(StyleLintOptions {
                fix,
                config_file: Some(".stylelintrc".into()),
            }))
            .with_file(FileSetPattern::new("", ["**/*.scss"], "")),
        );
        registry
    };

    let (result, _) = run(dir.path(), lint(false), "stylelint");
    let message = result.unwrap_err().to_string();
    assert!(message.contains("sass/master.scss:1:"));
    assert!(message.contains("(indentation)"));

    let (result, _) = run(dir.path(), lint(true), "stylelint");
    let message = result.unwrap_err().to_string();
    assert!(message.contains("(no-empty-block)"));
    assert!(!message.contains("(indentation)"));
    assert_eq!(
        fs::read_to_string(dir.path().join("sass/master.scss")).unwrap(),
        ".a {\n\tcolor: red;\n}\n.b {}\n"
    );
}

/// Starts a watch over `*.txt` at `root` that mirrors them into `out/`.
/// Returns the worker, its interrupt flag and the reporter output.
fn spawn_watch(
    root: &Path,
    debounce_ms: u64,
) -> (thread::JoinHandle<Result<()>>, Arc<AtomicBool>, MemorySink) {
    let (reporter, sink) = Reporter::memory();
    let (flag_tx, flag_rx) = mpsc::channel();
    let worker_root = root.to_path_buf();
    let worker = thread::spawn(move || {
        let mut registry = builtin_registry();
        registry.register_leaf(
            "mirror",
            LeafTask::new(AdapterConfig::Copy(CopyOptions::default()))
                .with_file(FileSetPattern::new("", ["*.txt"], "out")),
        );
        let mut groups = IndexMap::new();
        groups.insert(
            "notes".to_string(),
            WatchGroup {
                files: vec!["*.txt".to_string()],
                tasks: vec!["mirror".to_string()],
            },
        );
        registry.register_leaf(
            "watch",
            LeafTask::new(AdapterConfig::Watch(WatchOptions {
                groups,
                debounce_ms,
                poll_ms: 10,
            })),
        );
        let ctx = RunContext::new(ProjectConfig::default(), registry, reporter, &worker_root);
        flag_tx.send(ctx.interrupt_flag()).unwrap();
        Executor::new(&ctx).run_task("watch")
    });
    (worker, flag_rx.recv().unwrap(), sink)
}

fn wait_until(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    false
}

fn mirror_runs(sink: &MemorySink) -> usize {
    sink.contents()
        .matches("Running \"mirror\" (copy) task")
        .count()
}

#[test]
fn test_watch_reruns_group_until_interrupted() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().to_path_buf();
    write(&root, "notes.txt", "one");

    let (worker, flag, _sink) = spawn_watch(&root, 50);
    let mirrored = root.join("out/notes.txt");
    let has = |expected: &str| fs::read_to_string(&mirrored).ok().as_deref() == Some(expected);

    assert!(wait_until(|| has("one")), "initial run did not copy");
    thread::sleep(Duration::from_millis(200));
    write(&root, "notes.txt", "two");
    assert!(wait_until(|| has("two")), "change did not re-run the group");

    flag.store(true, Ordering::SeqCst);
    let result = worker.join().unwrap();
    assert_eq!(result.unwrap_err().kind(), "cancelled");
}

#[test]
fn test_watch_burst_runs_group_once() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().to_path_buf();
    write(&root, "notes.txt", "one");

    let (worker, flag, sink) = spawn_watch(&root, 400);
    assert!(wait_until(|| mirror_runs(&sink) == 1), "initial run missing");
    thread::sleep(Duration::from_millis(300));

    for i in 0..5 {
        write(&root, &format!("burst-{}.txt", i), "x");
        thread::sleep(Duration::from_millis(10));
    }
    assert!(wait_until(|| mirror_runs(&sink) >= 2), "burst did not re-run the group");
    thread::sleep(Duration::from_millis(1000));
    assert_eq!(mirror_runs(&sink), 2);
    assert!(root.join("out/burst-4.txt").is_file());

    flag.store(true, Ordering::SeqCst);
    assert_eq!(worker.join().unwrap().unwrap_err().kind(), "cancelled");
}
