use super::load_existing_config as load_existing_config_impl;
use tempfile::TempDir;

#[test]
fn load_existing_config() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = load_existing_config_impl(temp_dir.path()).expect("config loaded successfully");

    assert_eq!(config.get_base_dir(), temp_dir.path());
    assert!(!config.ollama.host.is_empty());
    assert!(config.ollama.port > 0);
    assert!(!config.ollama.model.is_empty());
    assert!(config.retrieval.n_results > 0);
}

#[test]
fn load_existing_config_reads_saved_values() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = load_existing_config_impl(temp_dir.path()).expect("defaults should load");
    config.ollama.model = "nomic-embed-text".to_string();
    config.ollama.embedding_dimension = 768;
    config.save().expect("config should save");

    let reloaded = load_existing_config_impl(temp_dir.path()).expect("saved config should load");
    assert_eq!(reloaded.ollama.model, "nomic-embed-text");
    assert_eq!(reloaded.ollama.embedding_dimension, 768);
}
