//! Environment/runtime helpers
//!
//! Sanity checks to ensure the local data directory exists at startup.

use tracing::info;

/// Ensure the data directory for the key-value provider exists.
pub async fn ensure_env(data_dir: &str) -> anyhow::Result<()> {
    if tokio::fs::metadata(data_dir).await.is_err() {
        info!(%data_dir, "data directory missing; creating it");
    }
    tokio::fs::create_dir_all(data_dir)
        .await
        .map_err(|e| anyhow::anyhow!("cannot create {data_dir}: {e}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ensure_env_creates_nested_dir() -> anyhow::Result<()> {
        let dir = std::env::temp_dir()
            .join(format!("vk_env_{}", std::process::id()))
            .join("nested");
        let path = dir.to_string_lossy().to_string();
        ensure_env(&path).await?;
        assert!(tokio::fs::metadata(&dir).await?.is_dir());
        let _ = tokio::fs::remove_dir_all(dir.parent().unwrap_or(dir.as_path())).await;
        Ok(())
    }
}
