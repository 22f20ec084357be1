//! Local user directory interface.
//!
//! The host owns user accounts; the linker only needs point lookups, account
//! creation for the host-side login helper, and saving overridden profile
//! fields.

use std::sync::RwLock;

use chrono::Utc;

use crate::errors::StoreError;
use crate::models::{NewUser, User};

/// Access to the host's local user accounts.
pub trait UserDirectory: Send + Sync {
    fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;

    /// Exact match after [`email_key`] folding on both sides. When several
    /// accounts match, the lowest id wins.
    fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    fn create_user(&self, new_user: &NewUser) -> Result<User, StoreError>;

    fn save_user(&self, user: &User) -> Result<(), StoreError>;
}

/// Lookup key for an email address: Unicode lowercase, so `ÉVE@x.com`
/// and `éve@X.COM` compare equal. Every directory matches on this.
pub fn email_key(email: &str) -> String {
    email.to_lowercase()
}

/// A process-local [`UserDirectory`], for tests and embedding.
#[derive(Default)]
pub struct MemoryUserDirectory {
    users: RwLock<Vec<User>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.read().map(|u| u.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("user directory lock poisoned".into())
}

impl UserDirectory for MemoryUserDirectory {
    fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let users = self.users.read().map_err(|_| poisoned())?;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let key = email_key(email);
        let users = self.users.read().map_err(|_| poisoned())?;
        Ok(users
            .iter()
            .filter(|u| u.email.as_deref().is_some_and(|e| email_key(e) == key))
            .min_by_key(|u| u.id)
            .cloned())
    }

    fn create_user(&self, new_user: &NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        if users
            .iter()
            .any(|u| u.username.eq_ignore_ascii_case(&new_user.username))
        {
            return Err(StoreError::Conflict {
                entity: "username".into(),
                value: new_user.username.clone(),
            });
        }
        let id = users.iter().map(|u| u.id).max().unwrap_or(0) + 1;
        let user = User {
            id,
            username: new_user.username.clone(),
            name: new_user.name.clone(),
            email: new_user.email.clone(),
            title: None,
            created_at: Utc::now().to_rfc3339(),
        };
        users.push(user.clone());
        Ok(user)
    }

    fn save_user(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        match users.iter_mut().find(|u| u.id == user.id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(StoreError::Database(crate::errors::DatabaseError::NotFound {
                entity: "user".into(),
                id: user.id.to_string(),
            })),
        }
    }
}
