use super::util::is_dup_key;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};
use uuid::Uuid;

const SELECT_USER: &str = r#"
SELECT user_id, username, password_hash,
       access_token_hash, refresh_token_hash,
       previous_access_token_hash, previous_refresh_token_hash,
       version, created_at, updated_at
FROM users
"#;

/// `users` table, see `schema/users.sql`.
pub struct MySqlUserRepo {
    pool: MySqlPool,
}

impl MySqlUserRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlUserRepo { pool }
    }

    #[inline]
    fn uid_as_bytes(id: &UserId) -> &[u8] {
        id.0.as_bytes()
    }

    #[inline]
    fn uid_from_bytes(id: &[u8]) -> Result<UserId, UserRepoError> {
        Ok(UserId(
            Uuid::from_slice(id).map_err(|e| UserRepoError::Store(e.to_string()))?,
        ))
    }

    fn row_to_user(row: MySqlRow) -> Result<User, UserRepoError> {
        let store = |e: sqlx::Error| UserRepoError::Store(e.to_string());

        let user_id_bytes: Vec<u8> = row.try_get("user_id").map_err(store)?;
        let hash = |column: &str| -> Result<Option<TokenHash>, UserRepoError> {
            let value: Option<String> = row.try_get(column).map_err(store)?;
            Ok(value.map(TokenHash))
        };

        Ok(User {
            user_id: Self::uid_from_bytes(&user_id_bytes)?,
            username: row.try_get("username").map_err(store)?,
            password_hash: row.try_get("password_hash").map_err(store)?,
            access_token_hash: hash("access_token_hash")?,
            refresh_token_hash: hash("refresh_token_hash")?,
            previous_access_token_hash: hash("previous_access_token_hash")?,
            previous_refresh_token_hash: hash("previous_refresh_token_hash")?,
            version: row.try_get("version").map_err(store)?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(store)?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at").map_err(store)?,
        })
    }

    async fn fetch_one_user(
        &self,
        query: sqlx::query::Query<'_, sqlx::MySql, sqlx::mysql::MySqlArguments>,
    ) -> Result<User, UserRepoError> {
        match query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| UserRepoError::Store(e.to_string()))?
        {
            Some(row) => Self::row_to_user(row),
            None => Err(UserRepoError::NotFound),
        }
    }
}

fn hash_column(hash: &Option<TokenHash>) -> Option<&str> {
    hash.as_ref().map(TokenHash::as_str)
}

#[async_trait::async_trait]
impl UserRepo for MySqlUserRepo {
    async fn get_user(&self, user_id: UserId) -> Result<User, UserRepoError> {
        let sql = format!("{SELECT_USER} WHERE user_id = ?");
        self.fetch_one_user(sqlx::query(&sql).bind(Self::uid_as_bytes(&user_id)))
            .await
    }

    async fn get_user_by_identifier(&self, username: &str) -> Result<User, UserRepoError> {
        let sql = format!("{SELECT_USER} WHERE username = ?");
        self.fetch_one_user(sqlx::query(&sql).bind(username)).await
    }

    async fn create_user(&self, user: &User) -> Result<(), UserRepoError> {
        sqlx::query(
            r#"
INSERT INTO users (user_id, username, password_hash,
                   access_token_hash, refresh_token_hash,
                   previous_access_token_hash, previous_refresh_token_hash,
                   version, created_at, updated_at)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#,
        )
        .bind(Self::uid_as_bytes(&user.user_id))
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(hash_column(&user.access_token_hash))
        .bind(hash_column(&user.refresh_token_hash))
        .bind(hash_column(&user.previous_access_token_hash))
        .bind(hash_column(&user.previous_refresh_token_hash))
        .bind(user.version)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_dup_key(&e) {
                UserRepoError::AlreadyExists
            } else {
                UserRepoError::Store(e.to_string())
            }
        })?;

        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<i64, UserRepoError> {
        let next_version = user.version + 1;
        let result = sqlx::query(
            r#"
UPDATE users
SET password_hash = ?,
    access_token_hash = ?,
    refresh_token_hash = ?,
    previous_access_token_hash = ?,
    previous_refresh_token_hash = ?,
    version = ?,
    updated_at = ?
WHERE user_id = ? AND version = ?
"#,
        )
        .bind(&user.password_hash)
        .bind(hash_column(&user.access_token_hash))
        .bind(hash_column(&user.refresh_token_hash))
        .bind(hash_column(&user.previous_access_token_hash))
        .bind(hash_column(&user.previous_refresh_token_hash))
        .bind(next_version)
        .bind(Utc::now())
        .bind(Self::uid_as_bytes(&user.user_id))
        .bind(user.version)
        .execute(&self.pool)
        .await
        .map_err(|e| UserRepoError::Store(e.to_string()))?;

        if result.rows_affected() == 0 {
            // Either the row is gone or someone else bumped the version.
            let exists: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE user_id = ?")
                .bind(Self::uid_as_bytes(&user.user_id))
                .fetch_one(&self.pool)
                .await
                .map_err(|e| UserRepoError::Store(e.to_string()))?;
            return Err(if exists > 0 {
                UserRepoError::Conflict
            } else {
                UserRepoError::NotFound
            });
        }

        Ok(next_version)
    }
}
