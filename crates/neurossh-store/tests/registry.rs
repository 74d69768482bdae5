use neurossh_store::{SessionRegistry, StoreError};
use neurossh_types::SessionConfig;
use pretty_assertions::assert_eq;

fn registry(dir: &tempfile::TempDir) -> SessionRegistry {
    SessionRegistry::new(dir.path().join("sessions.yaml"))
}

#[test]
fn test_missing_file_loads_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = registry(&tmp);
    assert!(registry.load().is_empty());
    assert!(registry.folders().is_empty());
}

#[test]
fn test_malformed_file_loads_empty_but_reports_error() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = registry(&tmp);
    std::fs::write(registry.path(), "- host: [unterminated\n").unwrap();

    assert!(registry.load().is_empty());
    assert!(matches!(registry.try_load(), Err(StoreError::Yaml { .. })));
}

#[test]
fn test_upsert_appends_then_replaces() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = registry(&tmp);

    let web = SessionConfig::new("web", "10.0.0.5").with_folder("Prod");
    let db = SessionConfig::new("db", "10.0.0.6").with_folder("Prod").with_port(2222);
    registry.upsert(web.clone()).unwrap();
    registry.upsert(db.clone()).unwrap();
    assert_eq!(registry.load(), vec![web.clone(), db.clone()]);

    let renamed = SessionConfig {
        name: "web-1".to_string(),
        ..web.clone()
    };
    registry.upsert(renamed.clone()).unwrap();
    assert_eq!(registry.load(), vec![renamed, db]);
}

#[test]
fn test_records_survive_reload() {
    let tmp = tempfile::tempdir().unwrap();
    let session = SessionConfig::new("edge", "edge.example.net")
        .with_folder("Lab")
        .with_profile("PROD");
    registry(&tmp).upsert(session.clone()).unwrap();

    let reopened = registry(&tmp);
    assert_eq!(reopened.get(&session.id), Some(session.clone()));
    assert_eq!(reopened.find("edge"), Some(session));
}

#[test]
fn test_defaults_fill_missing_fields() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = registry(&tmp);
    std::fs::write(registry.path(), "- name: bare\n  host: 192.0.2.1\n").unwrap();

    let sessions = registry.load();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].port, 22);
    assert_eq!(sessions[0].folder, "Root");
    assert_eq!(sessions[0].profile, "DEV");
    assert_eq!(sessions[0].id.len(), 8);
}

#[test]
fn test_remove_and_remove_folder() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = registry(&tmp);
    let a = SessionConfig::new("a", "a.local").with_folder("Lab");
    let b = SessionConfig::new("b", "b.local").with_folder("Lab");
    let c = SessionConfig::new("c", "c.local");
    for session in [&a, &b, &c] {
        registry.upsert(session.clone()).unwrap();
    }

    assert_eq!(registry.remove(&c.id).unwrap(), c);
    assert!(matches!(registry.remove(&c.id), Err(StoreError::UnknownSession(_))));

    assert_eq!(registry.remove_folder("Lab").unwrap(), 2);
    assert!(registry.load().is_empty());
    assert_eq!(registry.remove_folder("Lab").unwrap(), 0);
}

#[test]
fn test_grouped_by_folder() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = registry(&tmp);
    let z = SessionConfig::new("z", "z.local").with_folder("Zeta");
    let r1 = SessionConfig::new("r1", "r1.local");
    let r2 = SessionConfig::new("r2", "r2.local");
    for session in [&z, &r1, &r2] {
        registry.upsert(session.clone()).unwrap();
    }

    assert_eq!(registry.folders(), vec!["Root".to_string(), "Zeta".to_string()]);
    let grouped = registry.grouped();
    assert_eq!(grouped[0], ("Root".to_string(), vec![r1, r2]));
    assert_eq!(grouped[1], ("Zeta".to_string(), vec![z]));
}
