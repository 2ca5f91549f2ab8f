use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};

/// The signed-in identity as commands see it. Never carries the password.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
}

/// Registered account as stored in users.json. Passwords are kept in the
/// clear, matching the backend's prototype credential store.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredUser {
    id: String,
    username: String,
    email: String,
    password: String,
}

/// Holds the signed-in user for the process lifetime. The session record is
/// read from `user.json` once at open; mutations write through to disk.
#[derive(Debug)]
pub struct SessionStore {
    pub users_path: PathBuf,
    pub session_path: PathBuf,
    session: Option<User>,
}

impl SessionStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir).map_err(|err| {
            Error::persistence(format!("failed to create {}: {err}", data_dir.display()))
        })?;

        let users_path = data_dir.join("users.json");
        let session_path = data_dir.join("user.json");

        if !users_path.exists() {
            fs::write(&users_path, "[]").map_err(Error::persistence)?;
        }
        if !session_path.exists() {
            fs::write(&session_path, "").map_err(Error::persistence)?;
        }

        let session = read_session_file(&session_path)?;

        info!(
            users = %users_path.display(),
            session = %session_path.display(),
            signed_in = session.is_some(),
            "opened session store"
        );

        Ok(Self {
            users_path,
            session_path,
            session,
        })
    }

    #[tracing::instrument(skip(self, password))]
    pub fn register(&mut self, username: &str, email: &str, password: &str) -> Result<User> {
        if username.trim().is_empty() {
            return Err(Error::Validation { field: "username" });
        }
        if email.trim().is_empty() {
            return Err(Error::Validation { field: "email" });
        }
        if password.trim().is_empty() {
            return Err(Error::Validation { field: "password" });
        }

        let mut users = self.load_users()?;
        if users.iter().any(|u| u.email == email) {
            return Err(Error::DuplicateUser {
                email: email.to_string(),
            });
        }

        let stored = StoredUser {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        let user = User {
            id: stored.id.clone(),
            username: stored.username.clone(),
            email: stored.email.clone(),
        };

        users.push(stored);
        self.save_users(&users)?;
        self.write_session(&user)?;
        self.session = Some(user.clone());

        info!(email = %user.email, "registered new user");
        Ok(user)
    }

    #[tracing::instrument(skip(self, password))]
    pub fn login(&mut self, email: &str, password: &str) -> Result<User> {
        let users = self.load_users()?;
        let found = users
            .iter()
            .find(|u| u.email == email && u.password == password)
            .ok_or(Error::InvalidCredentials)?;

        let user = User {
            id: found.id.clone(),
            username: found.username.clone(),
            email: found.email.clone(),
        };
        self.write_session(&user)?;
        self.session = Some(user.clone());

        info!(email = %user.email, "logged in");
        Ok(user)
    }

    #[tracing::instrument(skip(self))]
    pub fn logout(&mut self) -> Result<()> {
        match fs::remove_file(&self.session_path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(Error::persistence(format!(
                    "failed removing {}: {err}",
                    self.session_path.display()
                )));
            }
        }
        self.session = None;
        debug!("cleared session");
        Ok(())
    }

    pub fn current(&self) -> Option<&User> {
        self.session.as_ref()
    }

    #[tracing::instrument(skip(self))]
    fn load_users(&self) -> Result<Vec<StoredUser>> {
        let raw = fs::read_to_string(&self.users_path).map_err(|err| {
            Error::persistence(format!(
                "failed reading {}: {err}",
                self.users_path.display()
            ))
        })?;

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(vec![]);
        }

        serde_json::from_str(trimmed).map_err(|err| {
            Error::persistence(format!(
                "failed parsing {}: {err}",
                self.users_path.display()
            ))
        })
    }

    #[tracing::instrument(skip(self, users))]
    fn save_users(&self, users: &[StoredUser]) -> Result<()> {
        debug!(file = %self.users_path.display(), count = users.len(), "saving users atomically");

        let dir = self.users_path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir).map_err(Error::persistence)?;
        let serialized = serde_json::to_string(users).map_err(Error::persistence)?;
        temp.write_all(serialized.as_bytes())
            .map_err(Error::persistence)?;
        temp.flush().map_err(Error::persistence)?;

        temp.persist(&self.users_path).map_err(|err| {
            Error::persistence(format!(
                "failed to persist {}: {err}",
                self.users_path.display()
            ))
        })?;

        Ok(())
    }

    #[tracing::instrument(skip(self, user))]
    fn write_session(&self, user: &User) -> Result<()> {
        let serialized = serde_json::to_string(user).map_err(Error::persistence)?;
        fs::write(&self.session_path, serialized).map_err(|err| {
            Error::persistence(format!(
                "failed writing {}: {err}",
                self.session_path.display()
            ))
        })?;
        Ok(())
    }
}

/// Reads the saved session record, if any. A corrupt file is logged and
/// treated as signed out.
fn read_session_file(path: &Path) -> Result<Option<User>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(Error::persistence(format!(
                "failed reading {}: {err}",
                path.display()
            )));
        }
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    match serde_json::from_str::<User>(trimmed) {
        Ok(user) => Ok(Some(user)),
        Err(err) => {
            warn!(
                file = %path.display(),
                error = %err,
                "session file is corrupt; treating as signed out"
            );
            Ok(None)
        }
    }
}
