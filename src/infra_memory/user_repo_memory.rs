use crate::domain_model::*;
use crate::domain_port::*;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Users keyed by identifier. Updates are compare-and-set on `version`.
#[derive(Default)]
pub struct InMemoryUserRepo {
    users: DashMap<String, User>,
}

impl InMemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl UserRepo for InMemoryUserRepo {
    async fn get_user(&self, user_id: UserId) -> Result<User, UserRepoError> {
        self.users
            .iter()
            .find(|entry| entry.user_id == user_id)
            .map(|entry| entry.value().clone())
            .ok_or(UserRepoError::NotFound)
    }

    async fn get_user_by_identifier(&self, username: &str) -> Result<User, UserRepoError> {
        self.users
            .get(username)
            .map(|entry| entry.value().clone())
            .ok_or(UserRepoError::NotFound)
    }

    async fn create_user(&self, user: &User) -> Result<(), UserRepoError> {
        match self.users.entry(user.username.clone()) {
            Entry::Occupied(_) => Err(UserRepoError::AlreadyExists),
            Entry::Vacant(slot) => {
                slot.insert(user.clone());
                Ok(())
            }
        }
    }

    async fn update_user(&self, user: &User) -> Result<i64, UserRepoError> {
        let mut stored = self
            .users
            .get_mut(&user.username)
            .ok_or(UserRepoError::NotFound)?;
        if stored.version != user.version {
            return Err(UserRepoError::Conflict);
        }
        let mut next = user.clone();
        next.version = user.version + 1;
        next.updated_at = Utc::now();
        *stored = next;
        Ok(user.version + 1)
    }
}
