//! User directory.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use atrium_auth::User;
use atrium_core::UserId;

use crate::StoreError;

pub trait UserStore: Send + Sync {
    /// Insert a new user; fails with `Conflict` if the email is taken.
    fn insert(&self, user: User) -> Result<(), StoreError>;
    fn get(&self, id: UserId) -> Option<User>;
    /// Lookup by already-normalized email.
    fn find_by_email(&self, email: &str) -> Option<User>;
    fn list(&self) -> Vec<User>;
    fn update(&self, user: User) -> Result<(), StoreError>;
    fn remove(&self, id: UserId) -> Result<User, StoreError>;
}

impl<S> UserStore for Arc<S>
where
    S: UserStore + ?Sized,
{
    fn insert(&self, user: User) -> Result<(), StoreError> {
        (**self).insert(user)
    }

    fn get(&self, id: UserId) -> Option<User> {
        (**self).get(id)
    }

    fn find_by_email(&self, email: &str) -> Option<User> {
        (**self).find_by_email(email)
    }

    fn list(&self) -> Vec<User> {
        (**self).list()
    }

    fn update(&self, user: User) -> Result<(), StoreError> {
        (**self).update(user)
    }

    fn remove(&self, id: UserId) -> Result<User, StoreError> {
        (**self).remove(id)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    inner: RwLock<HashMap<UserId, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserStore for InMemoryUserStore {
    fn insert(&self, user: User) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        if map.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!("email '{}' is already registered", user.email)));
        }
        if map.contains_key(&user.id) {
            return Err(StoreError::Conflict(format!("user {} already exists", user.id)));
        }
        map.insert(user.id, user);
        Ok(())
    }

    fn get(&self, id: UserId) -> Option<User> {
        self.inner.read().ok()?.get(&id).cloned()
    }

    fn find_by_email(&self, email: &str) -> Option<User> {
        self.inner
            .read()
            .ok()?
            .values()
            .find(|u| u.email == email)
            .cloned()
    }

    fn list(&self) -> Vec<User> {
        let Ok(map) = self.inner.read() else {
            return vec![];
        };
        let mut users: Vec<User> = map.values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        users
    }

    fn update(&self, user: User) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        match map.get_mut(&user.id) {
            Some(existing) => {
                *existing = user;
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    fn remove(&self, id: UserId) -> Result<User, StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        map.remove(&id).ok_or(StoreError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atrium_auth::Role;
    use chrono::Utc;

    fn user(email: &str) -> User {
        User {
            id: UserId::new(),
            email: email.to_string(),
            name: "N".into(),
            role: Role::Member,
            password_hash: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn duplicate_email_conflicts() {
        let store = InMemoryUserStore::new();
        store.insert(user("a@example.com")).unwrap();
        assert!(matches!(
            store.insert(user("a@example.com")),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn find_update_remove() {
        let store = InMemoryUserStore::new();
        let mut u = user("a@example.com");
        store.insert(u.clone()).unwrap();
        assert_eq!(store.find_by_email("a@example.com").unwrap().id, u.id);

        u.name = "Renamed".into();
        store.update(u.clone()).unwrap();
        assert_eq!(store.get(u.id).unwrap().name, "Renamed");

        store.remove(u.id).unwrap();
        assert!(store.get(u.id).is_none());
        assert!(matches!(store.remove(u.id), Err(StoreError::NotFound)));
    }
}
