use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;

use crate::domain::group::Group;
use crate::infra::db::Db;

fn group_from_row(row: &PgRow) -> Group {
    Group {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        description: row.get("description"),
    }
}

#[derive(Clone)]
pub struct GroupService {
    db: Db,
}

impl GroupService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create_group(&self, title: String, slug: String, description: String) -> Result<Group> {
        let row = sqlx::query(
            "INSERT INTO groups (title, slug, description) VALUES ($1, $2, $3) \
             RETURNING id, title, slug, description",
        )
        .bind(title)
        .bind(slug)
        .bind(description)
        .fetch_one(self.db.pool())
        .await?;

        Ok(group_from_row(&row))
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Group>> {
        let row = sqlx::query("SELECT id, title, slug, description FROM groups WHERE slug = $1")
            .bind(slug)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(group_from_row))
    }

    pub async fn get_by_id(&self, group_id: i64) -> Result<Option<Group>> {
        let row = sqlx::query("SELECT id, title, slug, description FROM groups WHERE id = $1")
            .bind(group_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(group_from_row))
    }

    /// Every group, for the group choice on the post form.
    pub async fn list_groups(&self) -> Result<Vec<Group>> {
        let rows = sqlx::query("SELECT id, title, slug, description FROM groups ORDER BY title, id")
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.iter().map(group_from_row).collect())
    }

    /// Posts of a deleted group stay, with their group cleared (`ON DELETE SET NULL`).
    pub async fn delete_by_slug(&self, slug: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM groups WHERE slug = $1")
            .bind(slug)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
