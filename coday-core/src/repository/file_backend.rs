use super::ThreadRepository;
use super::sanitize::sanitize_name;
use crate::error::CodayError;
use crate::error::Result;
use crate::thread::AiThread;
use crate::thread::ThreadSummary;
use async_trait::async_trait;
use coday_protocol::ThreadId;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use tracing::debug;
use tracing::warn;

/// File-backed [`ThreadRepository`]: one YAML document per thread, named
/// `{sanitized-name}-{id}.yml` (§4.3, §6 "Persisted thread file").
pub struct FileThreadRepository {
    root: PathBuf,
}

impl FileThreadRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn ensure_dir(&self) -> Result<()> {
        match tokio::fs::create_dir_all(&self.root).await {
            Ok(()) => Ok(()),
            Err(err) => Err(CodayError::RepositoryInit(err)),
        }
    }

    fn filename(thread: &AiThread) -> String {
        format!("{}-{}.yml", sanitize_name(&thread.name), thread.id)
    }

    async fn find_path_by_id(&self, id: ThreadId) -> Result<Option<PathBuf>> {
        let suffix = format!("-{id}.yml");
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(CodayError::Repository(err)),
        };

        while let Some(entry) = entries.next_entry().await.map_err(CodayError::Repository)? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.ends_with(&suffix) {
                return Ok(Some(entry.path()));
            }
        }
        Ok(None)
    }

    async fn read_thread(path: &Path) -> Option<AiThread> {
        let contents = tokio::fs::read_to_string(path).await.ok()?;
        match serde_yaml::from_str::<AiThread>(&contents) {
            Ok(thread) => Some(thread),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unparsable thread file");
                None
            }
        }
    }
}

#[async_trait]
impl ThreadRepository for FileThreadRepository {
    async fn get_by_id(&self, id: ThreadId) -> Result<Option<AiThread>> {
        let Some(path) = self.find_path_by_id(id).await? else {
            return Ok(None);
        };
        Ok(Self::read_thread(&path).await)
    }

    async fn save(&self, thread: &AiThread) -> Result<()> {
        self.ensure_dir().await?;
        let path = self.root.join(Self::filename(thread));
        let yaml = serde_yaml::to_string(thread).map_err(|err| {
            CodayError::Repository(std::io::Error::new(ErrorKind::InvalidData, err))
        })?;
        tokio::fs::write(&path, yaml)
            .await
            .map_err(CodayError::Repository)?;
        debug!(path = %path.display(), id = %thread.id, "saved thread");
        Ok(())
    }

    async fn list_threads(&self) -> Result<Vec<ThreadSummary>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(CodayError::Repository(err)),
        };

        let mut summaries = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(CodayError::Repository)? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("yml") {
                continue;
            }
            if let Some(thread) = Self::read_thread(&path).await {
                summaries.push(ThreadSummary::from(&thread));
            }
        }
        summaries.sort_by(|a, b| b.modified_date.cmp(&a.modified_date));
        Ok(summaries)
    }

    async fn delete(&self, id: ThreadId) -> Result<bool> {
        let Some(path) = self.find_path_by_id(id).await? else {
            return Ok(false);
        };
        tokio::fs::remove_file(&path)
            .await
            .map_err(CodayError::Repository)?;
        Ok(true)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[tokio::test]
    async fn save_then_get_round_trips() {
        let dir = tempdir().expect("tempdir");
        let repo = FileThreadRepository::new(dir.path());
        let mut thread = AiThread::new("My Thread");
        thread.add_user_message("user", "hi");

        repo.save(&thread).await.expect("save");
        let loaded = repo.get_by_id(thread.id).await.expect("get").expect("found");
        assert_eq!(loaded.id, thread.id);
        assert_eq!(loaded.messages(), thread.messages());
    }

    #[tokio::test]
    async fn rename_keeps_old_file_on_disk() {
        let dir = tempdir().expect("tempdir");
        let repo = FileThreadRepository::new(dir.path());
        let mut thread = AiThread::new("Old Name");
        repo.save(&thread).await.expect("save");

        thread.name = "New Name".to_string();
        repo.save(&thread).await.expect("save renamed");

        let loaded = repo.get_by_id(thread.id).await.expect("get").expect("found");
        assert_eq!(loaded.name, "New Name");

        let mut rd = tokio::fs::read_dir(dir.path()).await.expect("read_dir");
        let mut names = Vec::new();
        while let Some(entry) = rd.next_entry().await.expect("entry") {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names.len(), 2);
        assert!(names.iter().any(|n| n.starts_with("old-name-")));
        assert!(names.iter().any(|n| n.starts_with("new-name-")));
    }

    #[tokio::test]
    async fn list_threads_skips_corrupt_files() {
        let dir = tempdir().expect("tempdir");
        let repo = FileThreadRepository::new(dir.path());
        let thread = AiThread::new("Ok Thread");
        repo.save(&thread).await.expect("save");

        tokio::fs::write(dir.path().join("broken.yml"), "not: [valid yaml")
            .await
            .expect("write broken");

        let summaries = repo.list_threads().await.expect("list");
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].id, thread.id);
    }

    #[tokio::test]
    async fn rename_helper_renames_and_keeps_old_file() {
        let dir = tempdir().expect("tempdir");
        let repo = FileThreadRepository::new(dir.path());
        let thread = AiThread::new("Original");
        repo.save(&thread).await.expect("save");

        let renamed = repo
            .rename(thread.id, "Renamed".to_string())
            .await
            .expect("rename")
            .expect("found");
        assert_eq!(renamed.name, "Renamed");

        let mut rd = tokio::fs::read_dir(dir.path()).await.expect("read_dir");
        let mut count = 0;
        while rd.next_entry().await.expect("entry").is_some() {
            count += 1;
        }
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn rename_unknown_id_returns_none() {
        let dir = tempdir().expect("tempdir");
        let repo = FileThreadRepository::new(dir.path());
        let result = repo
            .rename(ThreadId::new(), "x".to_string())
            .await
            .expect("rename");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn delete_removes_by_id_suffix() {
        let dir = tempdir().expect("tempdir");
        let repo = FileThreadRepository::new(dir.path());
        let thread = AiThread::new("Thread");
        repo.save(&thread).await.expect("save");

        assert!(repo.delete(thread.id).await.expect("delete"));
        assert!(repo.get_by_id(thread.id).await.expect("get").is_none());
        assert!(!repo.delete(thread.id).await.expect("delete again"));
    }
}
