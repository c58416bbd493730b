use std::path::Path;

use eyre::Context;
use serde::{Deserialize, Serialize};
use tokio::{
    fs::{self, File},
    io::{AsyncReadExt, AsyncWriteExt, BufReader},
};

/// Read bytes from file - asynchronous version
pub async fn read_file_async(path: impl AsRef<Path>) -> eyre::Result<Vec<u8>> {
    let path = path.as_ref();
    let file = File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer).await?;
    Ok(buffer)
}

/// Read from json file - asynchronous version
pub async fn read_from_json_file_async<T: for<'a> Deserialize<'a>>(
    path: impl AsRef<Path>,
) -> eyre::Result<T> {
    let path = path.as_ref();
    let data = read_file_async(path).await?;
    let value: T = serde_json::from_slice(&data)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(value)
}

/// Write to json file - asynchronous version
///
/// Contents go to a sibling `.tmp` file first and are renamed over the
/// target, so a crash mid-write leaves the previous version intact.
pub async fn write_json_to_file_async<T: Serialize>(
    path: impl AsRef<Path>,
    data: &T,
) -> eyre::Result<()> {
    let path = path.as_ref();
    let data = serde_json::to_string_pretty(data)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let tmp_path = path.with_extension("json.tmp");
    let mut file = File::create(&tmp_path)
        .await
        .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
    file.write_all(data.as_bytes()).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod test {
    use serde::{Deserialize, Serialize};

    use super::{read_from_json_file_async, write_json_to_file_async};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        step: String,
        address: String,
    }

    #[tokio::test]
    async fn test_write_then_read_creates_parent_dirs() {
        let dir = std::env::temp_dir().join(format!(
            "deploy-core-json-{}",
            std::process::id()
        ));
        let path = dir.join("nested").join("manifest.json");

        let record = Record {
            step: String::from("protocol_proxy"),
            address: String::from("0x1111111111111111111122222222222222222222"),
        };

        write_json_to_file_async(&path, &record).await.unwrap();
        let loaded: Record = read_from_json_file_async(&path).await.unwrap();

        assert_eq!(loaded, record);
        assert!(!path.with_extension("json.tmp").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_read_missing_file_fails() {
        let result: eyre::Result<Record> =
            read_from_json_file_async("/definitely/not/here/manifest.json").await;
        assert!(result.is_err());
    }
}
