use std::sync::Arc;
use tempfile::{TempDir, tempdir};

use crate::kernel::component::KernelComponent;
use crate::kernel::error::Result;
use crate::storage::manager::DefaultStorageManager;
use crate::storage::provider::StorageProvider;

fn create_test_manager() -> (DefaultStorageManager, TempDir) {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let manager = DefaultStorageManager::new(temp_dir.path().join("hearth"));
    (manager, temp_dir)
}

#[tokio::test]
async fn test_initialize_creates_directory_skeleton() -> Result<()> {
    let (manager, _guard) = create_test_manager();

    manager.initialize().await?;

    assert!(manager.is_dir(manager.app_config_path()));
    assert!(manager.is_dir(manager.plugin_config_path()));
    assert!(manager.is_dir(manager.context_path()));

    Ok(())
}

#[tokio::test]
async fn test_context_is_cached_per_namespace() -> Result<()> {
    let (manager, _guard) = create_test_manager();
    manager.initialize().await?;

    let first = manager.context("identities")?;
    let second = manager.context("identities")?;
    let other = manager.context("devices")?;

    assert!(Arc::ptr_eq(&first, &second), "Same namespace shares a context");
    assert!(!Arc::ptr_eq(&first, &other));

    Ok(())
}

#[tokio::test]
async fn test_wipe_context_removes_namespace_only() -> Result<()> {
    let (manager, _guard) = create_test_manager();
    manager.initialize().await?;

    manager.context("identities")?.set("root", &"serial")?;
    manager.context("devices")?.set("lamp", &1)?;

    manager.wipe_context("identities")?;

    let identities = manager.context("identities")?;
    assert_eq!(identities.get::<String>("root")?, None);

    let devices = manager.context("devices")?;
    assert_eq!(devices.get::<i32>("lamp")?, Some(1));

    Ok(())
}

#[tokio::test]
async fn test_wipe_context_without_open_context() -> Result<()> {
    let (manager, _guard) = create_test_manager();
    manager.initialize().await?;

    manager.context("identities")?.set("root", &"serial")?;
    manager.close_contexts()?;

    // Nothing cached anymore; the document itself must still be removed
    manager.wipe_context("identities")?;
    assert_eq!(manager.context("identities")?.get::<String>("root")?, None);

    Ok(())
}

#[tokio::test]
async fn test_wipe_all_recreates_skeleton() -> Result<()> {
    let (manager, _guard) = create_test_manager();
    manager.initialize().await?;

    manager.context("identities")?.set("root", &"serial")?;
    let mut config = crate::storage::config::ConfigData::new();
    config.set("port", 5540)?;
    manager.save_app_config("bridge", &config)?;

    manager.wipe_all()?;

    assert!(manager.is_dir(manager.app_config_path()));
    assert!(manager.is_dir(manager.context_path()));
    assert_eq!(manager.context("identities")?.get::<String>("root")?, None);

    Ok(())
}

#[tokio::test]
async fn test_stop_flushes_open_contexts() -> Result<()> {
    let (manager, _guard) = create_test_manager();
    manager.initialize().await?;

    manager.context("identities")?.set("root", &"serial")?;
    manager.stop().await?;

    // A fresh manager over the same root sees the flushed data
    let reopened = DefaultStorageManager::new(manager.base_path().to_path_buf());
    assert_eq!(
        reopened.context("identities")?.get::<String>("root")?,
        Some("serial".to_string())
    );

    Ok(())
}
