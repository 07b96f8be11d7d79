//! File-system resource watching and plugin definition reloading.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use tempfile::TempDir;
use trellis_core::config::PluginManagerConfig;
use trellis_core::plugins::{
    FileSystemSource, Listener, PluginError, PluginListeners, PluginManager, ResourceSource,
};

fn write(dir: &Path, relative: &str, contents: &str) {
    let path = dir.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// Pin a file's modification time so comparisons do not depend on clock granularity
fn set_mtime(path: &Path, seconds: u64) {
    let time = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + seconds);
    fs::OpenOptions::new()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

#[test]
fn test_file_system_source_resolves_across_bases() {
    let app = TempDir::new().unwrap();
    let plugin_dir = TempDir::new().unwrap();
    write(app.path(), "conf/UrlMappings.yml", "mappings: []");
    write(app.path(), "conf/nested/AdminUrlMappings.yml", "mappings: []");
    write(app.path(), "conf/DataSource.yml", "url: h2");
    write(plugin_dir.path(), "conf/PluginUrlMappings.yml", "mappings: []");

    let source = FileSystemSource::new(vec![plugin_dir.path().to_path_buf(), app.path().to_path_buf()]);

    let flat = source.resolve("./conf/*UrlMappings.yml").unwrap();
    assert_eq!(
        flat,
        vec![
            plugin_dir.path().join("conf/PluginUrlMappings.yml"),
            app.path().join("conf/UrlMappings.yml"),
        ]
    );

    let deep = source.resolve("file:./conf/**/*UrlMappings.yml").unwrap();
    assert_eq!(deep.len(), 3);
    assert!(deep.contains(&app.path().join("conf/nested/AdminUrlMappings.yml")));

    let literal = source.resolve("conf/DataSource.yml").unwrap();
    assert_eq!(literal, vec![app.path().join("conf/DataSource.yml")]);

    assert!(source.resolve("missing/**/*.yml").unwrap().is_empty());
}

#[test]
fn test_file_system_source_timestamps() {
    let app = TempDir::new().unwrap();
    write(app.path(), "conf/UrlMappings.yml", "mappings: []");
    let path = app.path().join("conf/UrlMappings.yml");
    set_mtime(&path, 0);

    let source = FileSystemSource::new(vec![app.path().to_path_buf()]);
    let before = source.last_modified(&path).unwrap().unwrap();
    let touched = source.touch(&path).unwrap();

    assert!(touched > before);
    assert!(source.last_modified(&app.path().join("conf/Gone.yml")).unwrap().is_none());
}

#[test]
fn test_watched_file_change_fires_once() {
    let app = TempDir::new().unwrap();
    write(app.path(), "conf/UrlMappings.yml", "mappings: []");
    let path = app.path().join("conf/UrlMappings.yml");
    set_mtime(&path, 0);

    let config = PluginManagerConfig::development().with_reload_location(app.path());
    let mut manager = PluginManager::new(config);

    let calls = Arc::new(Mutex::new(Vec::new()));
    let recorded = calls.clone();
    let listeners = PluginListeners::new().with_on_change(Listener::callback(move |event| {
        recorded.lock().unwrap().push(event.resource_path().cloned());
    }));
    manager
        .register(
            trellis_core::PluginDefinition::new("UrlMappingsPlugin")
                .with_version("1.0")
                .with_watched_resources(&["./conf/*UrlMappings.yml"]),
            listeners,
        )
        .unwrap();

    assert!(manager.check_for_changes().is_empty());

    set_mtime(&path, 60);
    assert_eq!(manager.check_for_changes().changed_resources.len(), 1);
    assert!(manager.check_for_changes().is_empty());

    assert_eq!(calls.lock().unwrap().clone(), vec![Some(path)]);
}

#[test]
fn test_definition_file_reload() {
    let dir = TempDir::new().unwrap();
    let definition_path = dir.path().join("AuditPlugin.yml");
    write(dir.path(), "AuditPlugin.yml", "type: AuditPlugin\nversion: \"1.0\"\n");
    set_mtime(&definition_path, 0);

    let mut manager = PluginManager::new(PluginManagerConfig::development());
    manager.register_file(&definition_path, PluginListeners::new()).unwrap();
    assert_eq!(manager.plugin("audit").unwrap().version(), "1.0");
    assert_eq!(
        manager.plugin("audit").unwrap().definition_path(),
        Some(definition_path.as_path())
    );

    write(dir.path(), "AuditPlugin.yml", "type: AuditPlugin\nversion: \"1.1\"\nstatus: enabled\n");
    set_mtime(&definition_path, 60);

    let report = manager.check_for_changes();
    assert_eq!(report.reloaded_plugins, vec!["audit"]);
    assert!(!report.restart_requested);
    assert_eq!(manager.plugin("audit").unwrap().version(), "1.1");

    assert!(manager.check_for_changes().is_empty());
}

#[test]
fn test_abstract_definition_requests_restart() {
    let dir = TempDir::new().unwrap();
    let definition_path = dir.path().join("AuditPlugin.yml");
    write(dir.path(), "AuditPlugin.yml", "type: AuditPlugin\nversion: \"1.0\"\n");
    set_mtime(&definition_path, 0);

    let mut manager = PluginManager::new(PluginManagerConfig::development());
    manager.register_file(&definition_path, PluginListeners::new()).unwrap();

    write(dir.path(), "AuditPlugin.yml", "type: AuditPlugin\nversion: \"1.1\"\nabstract: true\n");
    set_mtime(&definition_path, 60);

    let report = manager.check_for_changes();
    assert!(report.restart_requested);
    assert!(report.reloaded_plugins.is_empty());
    assert_eq!(manager.plugin("audit").unwrap().version(), "1.0");
}

#[test]
fn test_definition_file_errors() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "BrokenPlugin.yml", "type: BrokenPlugin\n");

    let mut manager = PluginManager::new(PluginManagerConfig::testing());
    let err = manager
        .register_file(&dir.path().join("BrokenPlugin.yml"), PluginListeners::new())
        .unwrap_err();
    assert!(matches!(err, PluginError::MissingVersion { plugin } if plugin == "broken"));

    let err = manager
        .register_file(&dir.path().join("Missing.yml"), PluginListeners::new())
        .unwrap_err();
    assert!(matches!(err, PluginError::Definition { .. }));
}
