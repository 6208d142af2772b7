//! Auth gateway backed by a JSON user store
//!
//! Accounts live in `users.json`, one record per username holding the
//! Argon2id password hash and the user's storage directory. Username
//! uniqueness is enforced here, not by the session code. The in-memory map
//! is the source of truth; every mutation writes the file through before
//! returning.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::constants::MAX_USERNAME_LENGTH;

pub mod password;

/// Characters that are not allowed in usernames (path-sensitive)
const FORBIDDEN_USERNAME_CHARS: &[char] = &['/', '\\', ':', '.', '<', '>', '"', '|', '?', '*'];

/// One persisted account.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserRecord {
    /// Password hash in PHC string format (or `$FAST$` in test mode)
    password: String,
    /// The user's private storage subtree
    storage_dir: PathBuf,
}

/// Credential store and per-user storage-path resolver.
///
/// Cheap to clone; all clones share the same map and write through to the
/// same file.
#[derive(Debug, Clone)]
pub struct UserStore {
    users: Arc<Mutex<HashMap<String, UserRecord>>>,
    users_file: PathBuf,
    storage_root: PathBuf,
    fast_hash: bool,
}

/// Validate a username before it becomes a storage directory name.
///
/// Allows Unicode letters and ASCII graphic characters up to
/// [`MAX_USERNAME_LENGTH`] characters; rejects whitespace, control
/// characters, and path-sensitive characters (`/`, `\`, `:`, `.`, `<`,
/// `>`, `"`, `|`, `?`, `*`).
pub fn validate_username(username: &str) -> bool {
    if username.is_empty() || username.chars().count() > MAX_USERNAME_LENGTH {
        return false;
    }
    username.chars().all(|ch| {
        !FORBIDDEN_USERNAME_CHARS.contains(&ch) && (ch.is_alphabetic() || ch.is_ascii_graphic())
    })
}

impl UserStore {
    /// Load the store from `users_file`, or start empty if it does not
    /// exist yet.
    ///
    /// `storage_root` must be absolute and canonical; new accounts get a
    /// directory directly beneath it. `fast_hash` switches password hashing
    /// to the test-only fast mode.
    pub fn load(users_file: &Path, storage_root: &Path, fast_hash: bool) -> io::Result<Self> {
        let users = if users_file.exists() {
            let data = std::fs::read_to_string(users_file)?;
            serde_json::from_str(&data)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
        } else {
            HashMap::new()
        };

        Ok(Self {
            users: Arc::new(Mutex::new(users)),
            users_file: users_file.to_path_buf(),
            storage_root: storage_root.to_path_buf(),
            fast_hash,
        })
    }

    /// Create an account, returning `Ok(false)` if the username is taken.
    ///
    /// Hashes the password, creates the user's storage directory, and
    /// persists the store. Runs on the blocking pool; Argon2 is slow on
    /// purpose.
    pub async fn create(&self, username: &str, password: &str) -> io::Result<bool> {
        let store = self.clone();
        let username = username.to_string();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || store.create_sync(&username, &password))
            .await
            .map_err(|e| io::Error::other(format!("user store task failed: {e}")))?
    }

    /// Verify credentials. Any failure (unknown user, wrong password,
    /// malformed stored hash) comes back as `false`.
    pub async fn verify(&self, username: &str, password: &str) -> bool {
        let store = self.clone();
        let username = username.to_string();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || store.verify_sync(&username, &password))
            .await
            .unwrap_or(false)
    }

    /// The storage directory of an existing user.
    pub fn storage_root(&self, username: &str) -> Option<PathBuf> {
        let users = self.users.lock().expect("user store lock");
        users.get(username).map(|record| record.storage_dir.clone())
    }

    /// Number of accounts.
    pub fn len(&self) -> usize {
        let users = self.users.lock().expect("user store lock");
        users.len()
    }

    /// Whether the store has no accounts.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Synchronous account creation; see [`Self::create`].
    pub fn create_sync(&self, username: &str, password: &str) -> io::Result<bool> {
        if username.is_empty() || password.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "empty username or password",
            ));
        }
        if !validate_username(username) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid username",
            ));
        }

        // Hash outside the lock; Argon2 takes long enough to matter
        let hash = password::hash_password(password, self.fast_hash)
            .map_err(|e| io::Error::other(format!("password hashing failed: {e}")))?;

        let storage_dir = self.storage_root.join(username);

        let mut users = self.users.lock().expect("user store lock");
        if users.contains_key(username) {
            return Ok(false);
        }

        std::fs::create_dir_all(&storage_dir)?;
        users.insert(
            username.to_string(),
            UserRecord {
                password: hash,
                storage_dir,
            },
        );
        self.save_locked(&users)?;

        Ok(true)
    }

    /// Synchronous credential check; see [`Self::verify`].
    pub fn verify_sync(&self, username: &str, password: &str) -> bool {
        let hash = {
            let users = self.users.lock().expect("user store lock");
            match users.get(username) {
                Some(record) => record.password.clone(),
                None => return false,
            }
        };

        password::verify_password(password, &hash).unwrap_or(false)
    }

    /// Write the store through to disk. Called with the lock held so two
    /// writers cannot interleave partial files.
    fn save_locked(&self, users: &HashMap<String, UserRecord>) -> io::Result<()> {
        let data = serde_json::to_string_pretty(users)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        std::fs::write(&self.users_file, data)
    }
}
