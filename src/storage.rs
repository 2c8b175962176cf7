use anyhow::Result;
use async_trait::async_trait;
use chrono::Local;
use std::path::Path;
use std::sync::Arc;

use crate::story::Outline;

#[async_trait]
pub trait Storage: Send + Sync {
    async fn write(&self, path: &str, content: &[u8]) -> Result<()>;
    async fn exists(&self, path: &str) -> Result<bool>;
}

/// Plain files through `tokio::fs`.
pub struct NativeStorage;

impl NativeStorage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NativeStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for NativeStorage {
    async fn write(&self, path: &str, content: &[u8]) -> Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(path).await?)
    }
}

const DRAFTS_DIR: &str = "drafts";
const OUTLINES_DIR: &str = "outlines";

/// Writes finished drafts and generated outlines under an output folder.
pub struct DraftStore {
    output_folder: String,
    storage: Arc<dyn Storage>,
}

impl DraftStore {
    pub fn new(output_folder: impl Into<String>, storage: Arc<dyn Storage>) -> Self {
        Self {
            output_folder: output_folder.into(),
            storage,
        }
    }

    /// Saves `content` as `drafts/<title>_<timestamp>.txt` and returns the
    /// path. Blank content is rejected before touching storage.
    pub async fn save_draft(&self, title: &str, content: &str) -> Result<String> {
        if content.trim().is_empty() {
            anyhow::bail!("Draft content must not be empty");
        }
        let stem = format!("{}_{}", sanitize_title(title), timestamp());
        let path = self.free_path(DRAFTS_DIR, &stem, "txt").await?;
        self.storage.write(&path, content.as_bytes()).await?;
        Ok(path)
    }

    /// Saves a work-in-progress draft as `drafts/draft_<timestamp>.txt`.
    pub async fn save_intermediate(&self, content: &str) -> Result<String> {
        if content.trim().is_empty() {
            anyhow::bail!("Draft content must not be empty");
        }
        let stem = format!("draft_{}", timestamp());
        let path = self.free_path(DRAFTS_DIR, &stem, "txt").await?;
        self.storage.write(&path, content.as_bytes()).await?;
        Ok(path)
    }

    /// Saves the outline as YAML under `outlines/`.
    pub async fn save_outline(&self, outline: &Outline) -> Result<String> {
        let yaml = outline.to_yaml()?;
        let stem = format!("outline_{}", timestamp());
        let path = self.free_path(OUTLINES_DIR, &stem, "yaml").await?;
        self.storage.write(&path, yaml.as_bytes()).await?;
        Ok(path)
    }

    /// First `<dir>/<stem>[_n].<ext>` that does not exist yet; saves within
    /// the same second would otherwise collide.
    async fn free_path(&self, dir: &str, stem: &str, ext: &str) -> Result<String> {
        let base = Path::new(&self.output_folder).join(dir);
        let mut candidate = base.join(format!("{}.{}", stem, ext));
        let mut n = 1;
        while self.storage.exists(&candidate.to_string_lossy()).await? {
            candidate = base.join(format!("{}_{}.{}", stem, n, ext));
            n += 1;
        }
        Ok(candidate.to_string_lossy().to_string())
    }
}

fn timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Makes a title usable as a file name on common filesystems.
pub fn sanitize_title(title: &str) -> String {
    let cleaned: String = title
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() || c.is_whitespace() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == '_');
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::tests::sample_seed;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts every call that reaches storage.
    struct UntouchableStorage {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Storage for UntouchableStorage {
        async fn write(&self, _path: &str, _content: &[u8]) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn exists(&self, _path: &str) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(false)
        }
    }

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("测试故事"), "测试故事");
        assert_eq!(sanitize_title("a/b:c?"), "a_b_c");
        assert_eq!(sanitize_title("  春 天  "), "春_天");
        assert_eq!(sanitize_title("../.."), "untitled");
        assert_eq!(sanitize_title(""), "untitled");
    }

    #[tokio::test]
    async fn test_save_draft_rejects_empty_before_io() {
        let storage = Arc::new(UntouchableStorage { calls: AtomicUsize::new(0) });
        let store = DraftStore::new("out", storage.clone());

        for content in ["", "   \n"] {
            let err = store.save_draft("测试故事", content).await.unwrap_err();
            assert!(err.to_string().contains("must not be empty"));
            let err = store.save_intermediate(content).await.unwrap_err();
            assert!(err.to_string().contains("must not be empty"));
        }
        assert_eq!(storage.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_save_draft_writes_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().join("outputs");
        let store = DraftStore::new(output.to_string_lossy(), Arc::new(NativeStorage::new()));

        let path = store.save_draft("测试故事", "测试内容").await?;

        assert!(path.contains("drafts"));
        assert!(path.contains("测试故事_"));
        assert!(path.ends_with(".txt"));
        assert_eq!(std::fs::read_to_string(&path)?, "测试内容");
        Ok(())
    }

    #[tokio::test]
    async fn test_same_second_saves_do_not_overwrite() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = DraftStore::new(
            dir.path().to_string_lossy(),
            Arc::new(NativeStorage::new()),
        );

        let first = store.save_draft("题目", "第一稿").await?;
        let second = store.save_draft("题目", "第二稿").await?;

        assert_ne!(first, second);
        assert_eq!(std::fs::read_to_string(&first)?, "第一稿");
        assert_eq!(std::fs::read_to_string(&second)?, "第二稿");
        Ok(())
    }

    #[tokio::test]
    async fn test_intermediate_drafts_sit_beside_final() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = DraftStore::new(dir.path().to_string_lossy(), Arc::new(NativeStorage::new()));

        let first = store.save_intermediate("初稿").await?;
        let second = store.save_intermediate("润色稿").await?;
        store.save_draft("题目", "终稿").await?;

        assert_ne!(first, second);
        let name = Path::new(&first).file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("draft_"));
        assert_eq!(std::fs::read_to_string(&second)?, "润色稿");
        assert_eq!(std::fs::read_dir(dir.path().join("drafts"))?.count(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_save_outline_yaml() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = DraftStore::new(dir.path().to_string_lossy(), Arc::new(NativeStorage::new()));
        let outline = Outline::from_seed(&sample_seed(), "梗概");

        let path = store.save_outline(&outline).await?;

        assert!(path.contains("outlines"));
        let back: Outline = serde_yaml_ng::from_str(&std::fs::read_to_string(&path)?)?;
        assert_eq!(back, outline);
        Ok(())
    }
}
