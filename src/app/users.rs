use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;

use crate::domain::user::User;
use crate::infra::db::Db;

pub(crate) const USER_COLUMNS: &str = "id, username, email, first_name, last_name, created_at";

pub(crate) fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        created_at: row.get("created_at"),
    }
}

#[derive(Clone)]
pub struct UserService {
    db: Db,
}

impl UserService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(username)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }
}
