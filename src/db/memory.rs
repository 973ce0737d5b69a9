use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::db::models::Credential;
use crate::db::operations::UserStore;
use crate::error::DatabaseError;

/// Process-local [`UserStore`], for tests and running without Postgres.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, Credential>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn remove(&self, username: &str) -> Option<Credential> {
        self.users.write().await.remove(username)
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Credential>, DatabaseError> {
        Ok(self.users.read().await.get(username).cloned())
    }

    async fn create(&self, credential: &Credential) -> Result<(), DatabaseError> {
        let mut users = self.users.write().await;
        if users.contains_key(&credential.username) {
            return Err(DatabaseError::Duplicate);
        }
        users.insert(credential.username.clone(), credential.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_find() {
        let store = InMemoryUserStore::new();
        assert!(store.find_by_username("alice@example.com").await.unwrap().is_none());

        store.create(&Credential::new("alice@example.com", "hash")).await.unwrap();
        let found = store.find_by_username("alice@example.com").await.unwrap().unwrap();
        assert_eq!(found.password_hash, "hash");

        let err = store.create(&Credential::new("alice@example.com", "other")).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Duplicate));

        assert!(store.remove("alice@example.com").await.is_some());
        assert!(store.find_by_username("alice@example.com").await.unwrap().is_none());
    }
}
