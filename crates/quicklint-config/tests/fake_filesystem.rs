//! Loader behavior over the in-memory fake filesystem.

use std::path::PathBuf;
use std::sync::Arc;

use quicklint_config::{
    CONFIG_FILE_NAME, ConfigLoader, FakeFilesystem, FileToLint, NullBackend,
};

fn loader_with(fs: Arc<FakeFilesystem>) -> ConfigLoader {
    ConfigLoader::new(fs, Box::new(NullBackend::new()))
}

#[test]
fn file_with_no_config_file_gets_no_config() {
    let fs = Arc::new(FakeFilesystem::new());
    fs.create_file(fs.rooted("hello.js"), "");

    let mut loader = loader_with(fs.clone());
    let loaded = loader
        .load_for_file(&FileToLint::new(fs.rooted("hello.js")))
        .unwrap();
    assert!(loaded.is_none());
}

#[test]
fn finds_config_in_same_directory() {
    let fs = Arc::new(FakeFilesystem::new());
    fs.create_file(fs.rooted("hello.js"), "");
    fs.create_file(fs.rooted(CONFIG_FILE_NAME), "{}");

    let mut loader = loader_with(fs.clone());
    let loaded = loader
        .load_for_file(&FileToLint::new(fs.rooted("hello.js")))
        .unwrap()
        .unwrap();
    assert_eq!(loaded.config_path(), fs.rooted(CONFIG_FILE_NAME));
}

#[test]
fn finds_config_in_parent_directory() {
    let fs = Arc::new(FakeFilesystem::new());
    fs.create_file(fs.rooted("dir/hello.js"), "");
    fs.create_file(fs.rooted(CONFIG_FILE_NAME), "{}");

    let mut loader = loader_with(fs.clone());
    let loaded = loader
        .load_for_file(&FileToLint::new(fs.rooted("dir/hello.js")))
        .unwrap()
        .unwrap();
    assert_eq!(loaded.config_path(), fs.rooted(CONFIG_FILE_NAME));
}

#[test]
fn introducing_a_json_syntax_error_falls_back_to_default_config() {
    let fs = Arc::new(FakeFilesystem::new());
    fs.create_file(fs.rooted("hello.js"), "");
    fs.create_file(fs.rooted(CONFIG_FILE_NAME), "{}");

    let mut loader = loader_with(fs.clone());
    let loaded = loader
        .watch_and_load_for_file(fs.rooted("hello.js"), 0)
        .unwrap()
        .unwrap();
    assert!(loaded.config().globals().find("console").is_some());

    fs.create_file(fs.rooted(CONFIG_FILE_NAME), "{\\}");

    let changes = loader.refresh();
    assert_eq!(changes.len(), 1);
    let doc = changes[0].config_file.as_ref().unwrap();
    assert!(
        doc.config().globals().find("console").is_some(),
        "default configuration still applies"
    );
}

#[test]
fn multiple_watches_on_the_same_config_are_notified_together() {
    let fs = Arc::new(FakeFilesystem::new());
    fs.create_file(fs.rooted(CONFIG_FILE_NAME), "{}");

    let mut loader = loader_with(fs.clone());
    loader
        .watch_and_load_config_file(fs.rooted(CONFIG_FILE_NAME), 1)
        .unwrap();
    loader
        .watch_and_load_config_file(fs.rooted(CONFIG_FILE_NAME), 2)
        .unwrap();

    fs.create_file(fs.rooted(CONFIG_FILE_NAME), r#"{"global-groups": false}"#);

    let changes = loader.refresh();
    let mut tokens: Vec<u64> = changes.iter().map(|change| change.token).collect();
    tokens.sort_unstable();
    assert_eq!(tokens, vec![1, 2]);
}

#[test]
fn watches_on_the_same_config_share_one_doc() {
    let fs = Arc::new(FakeFilesystem::new());
    fs.create_file(fs.rooted("a/hello.js"), "");
    fs.create_file(fs.rooted("b/hello.js"), "");
    fs.create_file(fs.rooted(CONFIG_FILE_NAME), "{}");

    let mut loader = loader_with(fs.clone());
    let one = loader
        .watch_and_load_for_file(fs.rooted("a/hello.js"), 1)
        .unwrap()
        .unwrap();
    let two = loader
        .watch_and_load_for_file(fs.rooted("b/hello.js"), 2)
        .unwrap()
        .unwrap();
    assert!(Arc::ptr_eq(&one, &two));
}

#[test]
fn no_config_for_stdin() {
    let fs = Arc::new(FakeFilesystem::new());
    fs.create_file(fs.rooted(CONFIG_FILE_NAME), "{}");

    let mut loader = loader_with(fs.clone());
    let loaded = loader
        .watch_and_load(
            &FileToLint {
                path: PathBuf::from("<stdin>"),
                is_stdin: true,
                ..FileToLint::default()
            },
            0,
        )
        .unwrap();
    assert!(loaded.is_none());
    assert_eq!(loader.watch_count(), 0, "stdin registers no watch");
}

#[test]
fn watch_and_load_honors_explicit_config_file() {
    let fs = Arc::new(FakeFilesystem::new());
    fs.create_file(fs.rooted("configs/strict.config"), r#"{"globals": {"strict": true}}"#);
    fs.create_file(fs.rooted("hello.js"), "");

    let mut loader = loader_with(fs.clone());
    let loaded = loader
        .watch_and_load(
            &FileToLint {
                path: fs.rooted("hello.js"),
                config_file: Some(fs.rooted("configs/strict.config")),
                ..FileToLint::default()
            },
            3,
        )
        .unwrap()
        .unwrap();
    assert!(loaded.config().globals().find("strict").is_some());

    fs.create_file(fs.rooted("configs/strict.config"), r#"{"globals": {"loose": true}}"#);
    let changes = loader.refresh();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].token, 3);
}

#[test]
fn deleting_config_reports_no_config() {
    let fs = Arc::new(FakeFilesystem::new());
    fs.create_file(fs.rooted("hello.js"), "");
    fs.create_file(fs.rooted("dir").join(CONFIG_FILE_NAME), "{}");
    fs.create_file(fs.rooted(CONFIG_FILE_NAME), "{}");

    let mut loader = loader_with(fs.clone());
    loader
        .watch_and_load_for_file(fs.rooted("hello.js"), 0)
        .unwrap()
        .unwrap();

    fs.remove_file(&fs.rooted(CONFIG_FILE_NAME));

    let changes = loader.refresh();
    assert_eq!(changes.len(), 1);
    assert!(changes[0].config_file.is_none());
    assert!(loader.refresh().is_empty());
}
