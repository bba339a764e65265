use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use uuid::Uuid;

/// The signed-in user. Passed explicitly to every store call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub user_id: Uuid,
    pub email: String,
    pub signed_in_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct SessionStore {
    users_path: PathBuf,
    session_path: PathBuf,
}

impl SessionStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;
        Ok(Self {
            users_path: data_dir.join("users.json"),
            session_path: data_dir.join("session.json"),
        })
    }

    /// Signs in as `email`, registering a stable user id on first use.
    #[tracing::instrument(skip(self, now))]
    pub fn login(&self, email: &str, now: DateTime<Utc>) -> anyhow::Result<Session> {
        let email = normalize_email(email)?;
        let mut users = self.load_users()?;
        let user_id = *users.entry(email.clone()).or_insert_with(|| {
            info!(email = %email, "registering new user");
            Uuid::new_v4()
        });
        write_json_atomic(&self.users_path, &users).context("failed to save users.json")?;

        let session = Session {
            user_id,
            email,
            signed_in_at: now,
        };
        write_json_atomic(&self.session_path, &session).context("failed to save session.json")?;
        info!(user_id = %session.user_id, "signed in");
        Ok(session)
    }

    /// Clears the current session. Returns whether one existed.
    #[tracing::instrument(skip(self))]
    pub fn logout(&self) -> anyhow::Result<bool> {
        if !self.session_path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.session_path)
            .with_context(|| format!("failed removing {}", self.session_path.display()))?;
        info!("signed out");
        Ok(true)
    }

    #[tracing::instrument(skip(self))]
    pub fn current(&self) -> anyhow::Result<Option<Session>> {
        if !self.session_path.exists() {
            debug!("no session file");
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.session_path)
            .with_context(|| format!("failed reading {}", self.session_path.display()))?;
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let session = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing {}", self.session_path.display()))?;
        Ok(Some(session))
    }

    /// The current session, or an error telling the user to sign in.
    pub fn require(&self) -> anyhow::Result<Session> {
        self.current()?
            .ok_or_else(|| anyhow!("not signed in; run `calio login <email>` first"))
    }

    fn load_users(&self) -> anyhow::Result<BTreeMap<String, Uuid>> {
        if !self.users_path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(&self.users_path)
            .with_context(|| format!("failed reading {}", self.users_path.display()))?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing {}", self.users_path.display()))
    }
}

fn normalize_email(raw: &str) -> anyhow::Result<String> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(anyhow!("invalid email address: {raw}")),
    }
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut temp, value)?;
    writeln!(temp)?;
    temp.flush()?;
    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::tempdir;

    use super::SessionStore;

    #[test]
    fn login_is_stable_per_email() {
        let temp = tempdir().expect("tempdir");
        let store = SessionStore::open(temp.path()).expect("open");

        assert!(store.current().expect("current").is_none());
        assert!(store.require().is_err());

        let first = store.login("Me@Example.com ", Utc::now()).expect("login");
        assert_eq!(first.email, "me@example.com");
        assert!(store.logout().expect("logout"));
        assert!(!store.logout().expect("second logout"));

        let again = store.login("me@example.com", Utc::now()).expect("login again");
        assert_eq!(again.user_id, first.user_id);
        assert_eq!(store.require().expect("require").user_id, first.user_id);

        let other = store.login("you@example.com", Utc::now()).expect("other login");
        assert_ne!(other.user_id, first.user_id);
    }

    #[test]
    fn rejects_malformed_email() {
        let temp = tempdir().expect("tempdir");
        let store = SessionStore::open(temp.path()).expect("open");
        assert!(store.login("nobody", Utc::now()).is_err());
        assert!(store.login("@example.com", Utc::now()).is_err());
    }
}
