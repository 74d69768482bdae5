use neurossh_store::{CredentialStore, StoreError, Vault};
use neurossh_types::{Credential, CredentialSource};
use pretty_assertions::assert_eq;

#[test]
fn test_unknown_profile_resolves_to_default() {
    let tmp = tempfile::tempdir().unwrap();
    let store = CredentialStore::new(tmp.path().join("identities.yaml"), Vault::generate());

    assert_eq!(store.resolve("DEV"), Credential::new("admin", "admin"));
    assert_eq!(store.profiles(), vec!["DEV".to_string(), "PROD".to_string()]);
}

#[test]
fn test_profiles_round_trip_through_key_file() {
    let tmp = tempfile::tempdir().unwrap();
    let key_path = tmp.path().join("vault.key");
    let identities = tmp.path().join("identities.yaml");

    let store = CredentialStore::new(&identities, Vault::load_or_create(&key_path).unwrap());
    store.save_profile("PROD", "ops", "correct horse").unwrap();
    store.save_profile("LAB", "tester", "battery").unwrap();

    let reopened = CredentialStore::new(&identities, Vault::load_or_create(&key_path).unwrap());
    assert_eq!(reopened.resolve("PROD"), Credential::new("ops", "correct horse"));
    assert_eq!(reopened.profiles(), vec!["LAB".to_string(), "PROD".to_string()]);
}

#[test]
fn test_foreign_key_cannot_reveal_secrets() {
    let tmp = tempfile::tempdir().unwrap();
    let identities = tmp.path().join("identities.yaml");
    CredentialStore::new(&identities, Vault::generate())
        .save_profile("PROD", "ops", "hidden")
        .unwrap();

    let stranger = CredentialStore::new(&identities, Vault::generate());
    assert!(matches!(stranger.try_resolve("PROD"), Err(StoreError::Vault(_))));
    assert_eq!(stranger.resolve("PROD"), Credential::default());
}

#[test]
fn test_remove_profile() {
    let tmp = tempfile::tempdir().unwrap();
    let store = CredentialStore::new(tmp.path().join("identities.yaml"), Vault::generate());
    store.save_profile("LAB", "tester", "pw").unwrap();

    store.remove_profile("LAB").unwrap();
    assert!(matches!(store.remove_profile("LAB"), Err(StoreError::UnknownProfile(_))));
    assert_eq!(store.profiles(), vec!["DEV".to_string(), "PROD".to_string()]);
}
