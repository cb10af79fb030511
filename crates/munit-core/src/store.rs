//! User store seam
//!
//! Authentication consumes persisted users only through [`UserStore`].
//! [`MemoryUserStore`] backs the server when no external store is wired in
//! and is what the tests run against.

use crate::{MunitError, Result, User, UserId};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Persistence operations on user accounts
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Load a user by identifier, `MunitError::NotFound` if absent
    async fn get_user(&self, id: &UserId) -> Result<User>;

    /// Load a user by email address, `MunitError::NotFound` if absent
    async fn get_user_by_email(&self, email: &str) -> Result<User>;

    /// Persist a new user
    async fn insert_user(&self, user: User) -> Result<()>;

    /// Replace an existing user record
    async fn update_user(&self, id: &UserId, user: User) -> Result<User>;

    /// Remove a user
    async fn delete_user(&self, id: &UserId) -> Result<()>;
}

/// In-process user store
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<UserId, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

fn email_taken(users: &HashMap<UserId, User>, email: &str, except: Option<&UserId>) -> bool {
    users
        .values()
        .any(|u| u.email == email && Some(&u.id) != except)
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get_user(&self, id: &UserId) -> Result<User> {
        self.users
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| MunitError::NotFound("user".to_string()))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User> {
        self.users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| MunitError::NotFound("user".to_string()))
    }

    async fn insert_user(&self, user: User) -> Result<()> {
        user.validate()?;

        let mut users = self.users.write().await;
        if users.contains_key(&user.id) {
            return Err(MunitError::Conflict("user id is taken".to_string()));
        }
        if email_taken(&users, &user.email, None) {
            return Err(MunitError::Conflict("email is taken".to_string()));
        }
        users.insert(user.id.clone(), user);
        Ok(())
    }

    async fn update_user(&self, id: &UserId, mut user: User) -> Result<User> {
        user.validate()?;

        let mut users = self.users.write().await;
        if !users.contains_key(id) {
            return Err(MunitError::NotFound("user".to_string()));
        }
        if email_taken(&users, &user.email, Some(id)) {
            return Err(MunitError::Conflict("email is taken".to_string()));
        }
        user.id = id.clone();
        users.insert(id.clone(), user.clone());
        Ok(user)
    }

    async fn delete_user(&self, id: &UserId) -> Result<()> {
        self.users
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| MunitError::NotFound("user".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(email: &str) -> User {
        User::new(UserId::generate(), "Test", email, vec![1; 32], vec![2; 32])
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let store = MemoryUserStore::new();
        let u = user("a@example.com");
        store.insert_user(u.clone()).await.unwrap();

        assert_eq!(store.get_user(&u.id).await.unwrap(), u);
        assert_eq!(store.get_user_by_email("a@example.com").await.unwrap(), u);
        assert!(store
            .get_user_by_email("b@example.com")
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MemoryUserStore::new();
        store.insert_user(user("a@example.com")).await.unwrap();

        let err = store.insert_user(user("a@example.com")).await.unwrap_err();
        assert!(matches!(err, MunitError::Conflict(_)));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_invalid_user_rejected() {
        let store = MemoryUserStore::new();
        let mut u = user("a@example.com");
        u.salt.clear();
        assert!(matches!(
            store.insert_user(u).await,
            Err(MunitError::Validation(_))
        ));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_update_keeps_id_and_checks_email() {
        let store = MemoryUserStore::new();
        let a = user("a@example.com");
        let b = user("b@example.com");
        store.insert_user(a.clone()).await.unwrap();
        store.insert_user(b.clone()).await.unwrap();

        let mut changed = a.clone();
        changed.id = UserId::generate();
        changed.display_name = "Renamed".to_string();
        let updated = store.update_user(&a.id, changed).await.unwrap();
        assert_eq!(updated.id, a.id);
        assert_eq!(store.get_user(&a.id).await.unwrap().display_name, "Renamed");

        let mut clash = a.clone();
        clash.email = b.email.clone();
        assert!(matches!(
            store.update_user(&a.id, clash).await,
            Err(MunitError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryUserStore::new();
        let u = user("a@example.com");
        store.insert_user(u.clone()).await.unwrap();

        store.delete_user(&u.id).await.unwrap();
        assert!(store.get_user(&u.id).await.unwrap_err().is_not_found());
        assert!(store.delete_user(&u.id).await.unwrap_err().is_not_found());
    }
}
