use super::{AdminGrant, CredentialStore, NewUser, StoreError, UserCredentials, UserProfile};
use crate::token::RoleFlags;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredUser {
    name: String,
    email: String,
    password_hash: String,
    email_confirmed: bool,
    roles: RoleFlags,
}

impl StoredUser {
    fn profile(&self, id: &str) -> UserProfile {
        UserProfile {
            id: id.to_string(),
            name: self.name.clone(),
            email: self.email.clone(),
            email_confirmed: self.email_confirmed,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    users: HashMap<String, StoredUser>,
    ids_by_email: HashMap<String, String>,
}

impl State {
    fn user_mut(&mut self, id: &str) -> Result<&mut StoredUser, StoreError> {
        self.users.get_mut(id).ok_or(StoreError::NotFound)
    }
}

/// Process-local store. Data does not survive a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.ids_by_email.contains_key(&user.email) || state.users.contains_key(&user.id) {
            return Err(StoreError::AlreadyExists);
        }

        state.ids_by_email.insert(user.email.clone(), user.id.clone());
        state.users.insert(
            user.id,
            StoredUser {
                name: user.name,
                email: user.email,
                password_hash: user.password_hash,
                email_confirmed: false,
                roles: RoleFlags::default(),
            },
        );
        Ok(())
    }

    async fn get_user_by_id(&self, id: &str) -> Result<UserProfile, StoreError> {
        let state = self.state.read().await;
        state
            .users
            .get(id)
            .map(|user| user.profile(id))
            .ok_or(StoreError::NotFound)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<UserCredentials, StoreError> {
        let state = self.state.read().await;
        let id = state.ids_by_email.get(email).ok_or(StoreError::NotFound)?;
        let user = state.users.get(id).ok_or(StoreError::NotFound)?;
        Ok(UserCredentials {
            id: id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            email_confirmed: user.email_confirmed,
            roles: user.roles,
        })
    }

    async fn get_users_by_email(&self, prefix: &str) -> Result<Vec<UserProfile>, StoreError> {
        let state = self.state.read().await;
        let mut users: Vec<UserProfile> = state
            .ids_by_email
            .iter()
            .filter(|(email, _)| email.starts_with(prefix))
            .filter_map(|(_, id)| state.users.get(id).map(|user| user.profile(id)))
            .collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    async fn get_moderator(&self, id: &str) -> Result<String, StoreError> {
        let state = self.state.read().await;
        match state.users.get(id) {
            Some(user) if user.roles.is_moderator => Ok(id.to_string()),
            _ => Err(StoreError::NotFound),
        }
    }

    async fn get_admin(&self, id: &str) -> Result<AdminGrant, StoreError> {
        let state = self.state.read().await;
        match state.users.get(id) {
            Some(user) if user.roles.is_admin => Ok(AdminGrant {
                is_core: user.roles.is_core_admin,
            }),
            _ => Err(StoreError::NotFound),
        }
    }

    async fn confirm_email(&self, id: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.user_mut(id)?.email_confirmed = true;
        Ok(())
    }

    async fn set_password(&self, id: &str, password_hash: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.user_mut(id)?.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn promote_moderator(&self, id: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let user = state.user_mut(id)?;
        if user.roles.is_moderator {
            return Err(StoreError::AlreadyExists);
        }
        user.roles.is_moderator = true;
        Ok(())
    }

    async fn promote_admin(&self, id: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let user = state.user_mut(id)?;
        if user.roles.is_admin {
            return Err(StoreError::AlreadyExists);
        }
        user.roles.is_admin = true;
        Ok(())
    }

    async fn promote_core_admin(&self, id: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let user = state.user_mut(id)?;
        if !user.roles.is_admin {
            return Err(StoreError::NotFound);
        }
        if user.roles.is_core_admin {
            return Err(StoreError::AlreadyExists);
        }
        user.roles.is_core_admin = true;
        Ok(())
    }
}
