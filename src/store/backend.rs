use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::fs;
use tracing::{debug, warn};

use crate::config::settings::{RefreshCookieConfig, StorageConfig, StorageType};
use crate::helpers::time::{expires_after, now};
use crate::store::cookie::RefreshCookie;
use crate::store::session::{AccessToken, RefreshToken, Session};
use crate::utils::constants::{COOKIE_JAR_FILE, GENERATION_KEY_SUFFIX, KV_STORAGE_FILE};

/// Where a [`crate::store::credential_store::CredentialStore`] persists its session.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Absent values load as empty tokens
    async fn load(&self) -> Result<Session>;

    /// Both tokens are persisted as one unit
    async fn save(&self, session: &Session) -> Result<()>;
}

pub fn build_backend(storage: &StorageConfig) -> Result<Box<dyn SessionBackend>> {
    match storage.storage_type {
        StorageType::Memory => Ok(Box::new(MemoryBackend::default())),
        StorageType::File => {
            let dir = storage
                .dir
                .as_ref()
                .ok_or_else(|| anyhow!("storage.dir is required for file storage"))?;
            Ok(Box::new(FileBackend::new(
                dir,
                &storage.access_key,
                storage.refresh_cookie.clone(),
            )))
        }
    }
}

/// ================================
/// Volatile, process-scoped storage
/// ================================
#[derive(Debug, Default)]
pub struct MemoryBackend {
    session: Mutex<Session>,
}

#[async_trait]
impl SessionBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn load(&self) -> Result<Session> {
        Ok(self.session.lock().clone())
    }

    async fn save(&self, session: &Session) -> Result<()> {
        *self.session.lock() = session.clone();
        Ok(())
    }
}

/// ================================
/// File storage
///
/// access token: JSON key-value file, under `access_key`
/// refresh token: cookie jar file, one cookie per line
///
/// every save stamps both files with the same generation, strictly greater than
/// anything on disk; a pair whose generations differ was torn by a failed save
/// and loads as unauthenticated
/// ================================
#[derive(Debug, Clone)]
pub struct FileBackend {
    kv_path: PathBuf,
    cookie_path: PathBuf,
    access_key: String,
    generation_key: String,
    cookie: RefreshCookieConfig,
}

impl FileBackend {
    pub fn new(dir: impl AsRef<Path>, access_key: &str, cookie: RefreshCookieConfig) -> Self {
        let dir = dir.as_ref();
        Self {
            kv_path: dir.join(KV_STORAGE_FILE),
            cookie_path: dir.join(COOKIE_JAR_FILE),
            access_key: access_key.to_owned(),
            generation_key: format!("{}{}", access_key, GENERATION_KEY_SUFFIX),
            cookie,
        }
    }

    async fn read_kv(&self) -> Result<BTreeMap<String, String>> {
        match fs::read_to_string(&self.kv_path).await {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| anyhow!("corrupt storage file '{}': {}", self.kv_path.display(), e)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_cookie_lines(&self) -> Result<Vec<String>> {
        match fs::read_to_string(&self.cookie_path).await {
            Ok(content) => Ok(content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_owned)
                .collect()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn refresh_cookie(&self, lines: &[String]) -> Option<RefreshCookie> {
        lines
            .iter()
            .filter_map(|line| RefreshCookie::parse(line).ok())
            .find(|cookie| cookie.name == self.cookie.name)
    }

    fn kv_generation(&self, kv: &BTreeMap<String, String>) -> Option<u64> {
        kv.get(&self.generation_key).and_then(|g| g.parse().ok())
    }
}

#[async_trait]
impl SessionBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn load(&self) -> Result<Session> {
        let kv = self.read_kv().await?;
        let access = kv.get(&self.access_key).cloned().unwrap_or_default();
        let cookie = self.refresh_cookie(&self.read_cookie_lines().await?);

        if let Some(cookie) = cookie.as_ref() {
            let kv_generation = self.kv_generation(&kv);
            if kv_generation != cookie.generation {
                warn!(
                    "'{}' and '{}' come from different saves (generation {:?} vs {:?}), starting unauthenticated",
                    self.kv_path.display(),
                    self.cookie_path.display(),
                    kv_generation,
                    cookie.generation
                );
                return Ok(Session::empty());
            }
        }

        let refresh = cookie
            .filter(|cookie| {
                let expired = cookie.is_expired(now());
                if expired {
                    debug!("refresh cookie '{}' expired", cookie.name);
                }
                !expired
            })
            .map(|cookie| cookie.value)
            .unwrap_or_default();

        Ok(Session {
            access: AccessToken::new(access),
            refresh: RefreshToken::new(refresh),
        })
    }

    async fn save(&self, session: &Session) -> Result<()> {
        let mut kv = self.read_kv().await?;
        let lines = self.read_cookie_lines().await?;

        let generation = self
            .kv_generation(&kv)
            .max(self.refresh_cookie(&lines).and_then(|cookie| cookie.generation))
            .map_or(1, |g| g.saturating_add(1));

        // other keys of the key-value storage are kept as they are
        if session.access.is_empty() {
            kv.remove(&self.access_key);
        } else {
            kv.insert(self.access_key.clone(), session.access.as_str().to_owned());
        }
        kv.insert(self.generation_key.clone(), generation.to_string());
        write_atomic(&self.kv_path, serde_json::to_string_pretty(&kv)?.as_bytes()).await?;

        let mut lines: Vec<String> = lines
            .into_iter()
            .filter(|line| {
                RefreshCookie::parse(line)
                    .map(|cookie| cookie.name != self.cookie.name)
                    .unwrap_or(true)
            })
            .collect();
        if !session.refresh.is_empty() {
            let cookie = RefreshCookie::new(
                &self.cookie.name,
                session.refresh.as_str(),
                &self.cookie.path,
                self.cookie.max_age_seconds.map(expires_after),
            )
            .with_generation(generation);
            lines.push(cookie.to_cookie_string());
        }
        let mut content = lines.join("\n");
        content.push('\n');
        write_atomic(&self.cookie_path, content.as_bytes()).await
    }
}

/// tmp -> rename, credentials readable by the owner only
async fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, content).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
    }

    fs::rename(&tmp, path).await?;
    Ok(())
}
