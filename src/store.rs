//! User profile persistence.
//!
//! Profiles are kept in memory and, when a path is configured, written through
//! to a single JSON file after every change. Debate sessions are never stored.

use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::{Mutex, RwLock};

/// Schema version of the profile file
pub const STORE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on profile store: {0}")]
    Io(#[from] std::io::Error),

    #[error("Profile store is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Profile store schema version {found} is newer than supported version {supported}")]
    UnsupportedSchema { found: u32, supported: u32 },
}

/// On-disk layout of the profile file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub schema_version: u32,
    /// ISO8601
    pub saved_at: String,
    pub profiles: HashMap<UserId, User>,
}

pub struct ProfileStore {
    path: Option<PathBuf>,
    profiles: RwLock<HashMap<UserId, User>>,
    /// Serializes snapshot, temp write and rename
    save_lock: Mutex<()>,
}

impl ProfileStore {
    /// A store that lives only as long as the process
    pub fn in_memory() -> Self {
        Self {
            path: None,
            profiles: RwLock::new(HashMap::new()),
            save_lock: Mutex::new(()),
        }
    }

    /// In-memory store holding `users`
    pub fn with_profiles(users: Vec<User>) -> Self {
        Self {
            path: None,
            profiles: RwLock::new(users.into_iter().map(|u| (u.id.clone(), u)).collect()),
            save_lock: Mutex::new(()),
        }
    }

    /// Open the store at `path`, starting empty when the file does not exist yet
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let profiles = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let snapshot: ProfileSnapshot = serde_json::from_slice(&bytes)?;
                if snapshot.schema_version > STORE_SCHEMA_VERSION {
                    return Err(StoreError::UnsupportedSchema {
                        found: snapshot.schema_version,
                        supported: STORE_SCHEMA_VERSION,
                    });
                }
                tracing::info!(
                    "Loaded {} profiles from {}",
                    snapshot.profiles.len(),
                    path.display()
                );
                snapshot.profiles
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No profile store at {}, starting fresh", path.display());
                HashMap::new()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path: Some(path),
            profiles: RwLock::new(profiles),
            save_lock: Mutex::new(()),
        })
    }

    /// Open the file named by `PROFILE_STORE_PATH`, or an in-memory store when unset
    pub async fn from_env() -> Result<Self, StoreError> {
        match std::env::var("PROFILE_STORE_PATH") {
            Ok(path) if !path.trim().is_empty() => Self::open(path.trim()).await,
            _ => {
                tracing::warn!("PROFILE_STORE_PATH not set, profiles will not survive a restart");
                Ok(Self::in_memory())
            }
        }
    }

    pub async fn get(&self, id: &str) -> Option<User> {
        self.profiles.read().await.get(id).cloned()
    }

    pub async fn find_by_email(&self, email: &str) -> Option<User> {
        self.profiles
            .read()
            .await
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned()
    }

    pub async fn all(&self) -> Vec<User> {
        self.profiles.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.profiles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.profiles.read().await.is_empty()
    }

    /// Insert or replace a profile and persist
    pub async fn put(&self, user: User) -> Result<(), StoreError> {
        self.profiles.write().await.insert(user.id.clone(), user);
        self.save().await
    }

    /// Insert profiles that are not present yet (by id)
    pub async fn seed(&self, users: Vec<User>) -> Result<(), StoreError> {
        {
            let mut profiles = self.profiles.write().await;
            for user in users {
                profiles.entry(user.id.clone()).or_insert(user);
            }
        }
        self.save().await
    }

    /// Apply `f` to a stored profile and persist. Returns the updated profile.
    pub async fn update<F>(&self, id: &str, f: F) -> Result<Option<User>, StoreError>
    where
        F: FnOnce(&mut User),
    {
        let updated = {
            let mut profiles = self.profiles.write().await;
            profiles.get_mut(id).map(|user| {
                f(user);
                user.clone()
            })
        };
        if updated.is_some() {
            self.save().await?;
        }
        Ok(updated)
    }

    /// Write the current profiles to disk (temp file, then rename)
    pub async fn save(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let _guard = self.save_lock.lock().await;
        let snapshot = ProfileSnapshot {
            schema_version: STORE_SCHEMA_VERSION,
            saved_at: chrono::Utc::now().to_rfc3339(),
            profiles: self.profiles.read().await.clone(),
        };
        let json = serde_json::to_vec_pretty(&snapshot)?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}
