//! 匿名身份提供者实现

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use application::{ApplicationError, IdentityProvider};
use async_trait::async_trait;
use domain::{DomainError, UserId};
use tokio::sync::Mutex;

/// 进程内身份，进程退出即丢失
#[derive(Default)]
pub struct MemoryIdentityProvider {
    user_id: Mutex<Option<UserId>>,
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用已知身份，常用于服务端代表某个客户端操作
    pub fn with_user(user_id: UserId) -> Self {
        Self {
            user_id: Mutex::new(Some(user_id)),
        }
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn ensure_authenticated(&self) -> Result<(), ApplicationError> {
        let mut user_id = self.user_id.lock().await;
        if user_id.is_none() {
            let issued = UserId::generate();
            tracing::debug!(user_id = %issued, "签发匿名身份");
            *user_id = Some(issued);
        }
        Ok(())
    }

    async fn user_id(&self) -> Result<UserId, ApplicationError> {
        self.user_id
            .lock()
            .await
            .ok_or_else(|| DomainError::AuthNotInitialized.into())
    }
}

/// 把匿名身份持久化到文件，客户端重启后沿用同一个身份
pub struct FileIdentityProvider {
    path: PathBuf,
    cached: Mutex<Option<UserId>>,
}

impl FileIdentityProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_stored(&self) -> Result<Option<UserId>, ApplicationError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => match raw.trim().parse::<UserId>() {
                Ok(user_id) => Ok(Some(user_id)),
                Err(err) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %err,
                        "身份文件内容无效，将重新签发"
                    );
                    Ok(None)
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(ApplicationError::infrastructure(format!(
                "failed to read identity file {}: {err}",
                self.path.display()
            ))),
        }
    }

    async fn write_stored(&self, user_id: UserId) -> Result<(), ApplicationError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|err| {
                ApplicationError::infrastructure(format!(
                    "failed to create identity directory {}: {err}",
                    parent.display()
                ))
            })?;
        }
        tokio::fs::write(&self.path, user_id.to_string())
            .await
            .map_err(|err| {
                ApplicationError::infrastructure(format!(
                    "failed to write identity file {}: {err}",
                    self.path.display()
                ))
            })
    }
}

#[async_trait]
impl IdentityProvider for FileIdentityProvider {
    async fn ensure_authenticated(&self) -> Result<(), ApplicationError> {
        let mut cached = self.cached.lock().await;
        if cached.is_some() {
            return Ok(());
        }

        let user_id = match self.read_stored().await? {
            Some(user_id) => user_id,
            None => {
                let issued = UserId::generate();
                self.write_stored(issued).await?;
                tracing::info!(path = %self.path.display(), user_id = %issued, "签发匿名身份");
                issued
            }
        };
        *cached = Some(user_id);
        Ok(())
    }

    async fn user_id(&self) -> Result<UserId, ApplicationError> {
        let mut cached = self.cached.lock().await;
        if let Some(user_id) = *cached {
            return Ok(user_id);
        }
        // 之前的进程可能已经签发过
        let stored = self
            .read_stored()
            .await?
            .ok_or(DomainError::AuthNotInitialized)?;
        *cached = Some(stored);
        Ok(stored)
    }
}
