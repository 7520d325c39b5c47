//! Durable per-repository storage for the release cache

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

#[cfg(test)]
use mockall::automock;
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::config::{CacheConfig, StoreBackend};
use crate::release::cache::RepoCache;
use crate::release::error::CacheError;
use crate::release::types::RepoId;

/// One durable record per repository
#[cfg_attr(test, automock)]
pub trait RepoStore: Send + Sync {
    /// Load a repository's record, `Ok(None)` if it was never saved
    fn load(&self, repo: &RepoId) -> Result<Option<RepoCache>, CacheError>;

    fn save(&self, repo: &RepoId, cache: &RepoCache) -> Result<(), CacheError>;

    /// Every repository with a saved record
    fn list(&self) -> Result<Vec<RepoId>, CacheError>;
}

/// Open the store selected by the configuration
pub fn open_store(config: &CacheConfig) -> Result<Box<dyn RepoStore>, CacheError> {
    match config.backend {
        StoreBackend::Files => Ok(Box::new(FileStore::new(&config.release_cache))),
        StoreBackend::Sqlite => Ok(Box::new(SqliteStore::new(&config.release_cache)?)),
    }
}

/// Directory of pretty-printed JSON documents named `owner#name.json`
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    const EXTENSION: &'static str = "json";

    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    fn repo_file(&self, repo: &RepoId) -> PathBuf {
        self.dir
            .join(format!("{}.{}", repo.storage_key(), Self::EXTENSION))
    }
}

impl RepoStore for FileStore {
    fn load(&self, repo: &RepoId) -> Result<Option<RepoCache>, CacheError> {
        let path = self.repo_file(repo);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn save(&self, repo: &RepoId, cache: &RepoCache) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.repo_file(repo);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(cache)?)?;
        std::fs::rename(&tmp, &path)?;
        debug!("Saved cache file {:?}", path);
        Ok(())
    }

    fn list(&self) -> Result<Vec<RepoId>, CacheError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut repos = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(Self::EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match RepoId::from_storage_key(stem) {
                Ok(repo) => repos.push(repo),
                Err(e) => warn!("Skipping cache file {:?}: {}", path, e),
            }
        }
        repos.sort();
        Ok(repos)
    }
}

/// SQLite database holding one JSON document per repository
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new(db_path: &Path) -> Result<Self, CacheError> {
        info!("Initializing release cache database at {:?}", db_path);

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;

        // Enable WAL mode for better concurrency
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS repo_caches (
                repo_key TEXT PRIMARY KEY,
                document TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        debug!("Release cache database ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire database connection lock with proper error handling
    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>, CacheError> {
        self.conn.lock().map_err(|_| CacheError::LockPoisoned)
    }
}

impl RepoStore for SqliteStore {
    fn load(&self, repo: &RepoId) -> Result<Option<RepoCache>, CacheError> {
        let conn = self.lock_conn()?;
        let document: Option<String> = conn
            .query_row(
                "SELECT document FROM repo_caches WHERE repo_key = ?1",
                [repo.storage_key()],
                |row| row.get(0),
            )
            .optional()?;

        document
            .map(|doc| serde_json::from_str(&doc))
            .transpose()
            .map_err(Into::into)
    }

    fn save(&self, repo: &RepoId, cache: &RepoCache) -> Result<(), CacheError> {
        let document = serde_json::to_string(cache)?;
        let now = chrono::Utc::now().timestamp_millis();

        let conn = self.lock_conn()?;
        conn.execute(
            r#"
            INSERT INTO repo_caches (repo_key, document, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(repo_key) DO UPDATE SET
                document = excluded.document,
                updated_at = excluded.updated_at
            "#,
            (repo.storage_key(), document, now),
        )?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<RepoId>, CacheError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare("SELECT repo_key FROM repo_caches ORDER BY repo_key")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(keys
            .into_iter()
            .filter_map(|key| {
                RepoId::from_storage_key(&key)
                    .inspect_err(|e| warn!("Skipping cache row {:?}: {}", key, e))
                    .ok()
            })
            .collect())
    }
}
