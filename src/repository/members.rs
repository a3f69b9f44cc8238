//! Members repository. Members and their user accounts are written together.

use sqlx::{Pool, Postgres};

use super::{constraint_error, delete_error};
use crate::{
    error::{AppError, AppResult},
    models::member::{CreateMember, Member, UpdateMember},
};

const MEMBER_SELECT: &str = r#"
    SELECT m.id, m.user_id, u.username, u.email, u.first_name, u.last_name, m.membership_date
    FROM members m
    JOIN users u ON u.id = m.user_id
"#;

#[derive(Clone)]
pub struct MembersRepository {
    pool: Pool<Postgres>,
}

impl MembersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> AppResult<Vec<Member>> {
        let rows = sqlx::query_as::<_, Member>(&format!("{} ORDER BY m.id", MEMBER_SELECT))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Member> {
        sqlx::query_as::<_, Member>(&format!("{} WHERE m.id = $1", MEMBER_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", id)))
    }

    /// Create the user account and the member record in one transaction
    pub async fn create(&self, data: &CreateMember) -> AppResult<Member> {
        let mut tx = self.pool.begin().await?;

        let user_id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO users (username, email, first_name, last_name)
            VALUES ($1, $2, COALESCE($3, ''), COALESCE($4, ''))
            RETURNING id
            "#,
        )
        .bind(&data.username)
        .bind(&data.email)
        .bind(&data.first_name)
        .bind(&data.last_name)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| constraint_error(e, "Username"))?;

        let member_id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO members (user_id, membership_date)
            VALUES ($1, COALESCE($2, CURRENT_DATE))
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(data.membership_date)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        self.get_by_id(member_id).await
    }

    pub async fn update(&self, id: i32, data: &UpdateMember) -> AppResult<Member> {
        let mut tx = self.pool.begin().await?;

        let user_id: i32 = sqlx::query_scalar(
            r#"
            UPDATE members
            SET membership_date = COALESCE($2, membership_date)
            WHERE id = $1
            RETURNING user_id
            "#,
        )
        .bind(id)
        .bind(data.membership_date)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", id)))?;

        sqlx::query(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                email = COALESCE($3, email),
                first_name = COALESCE($4, first_name),
                last_name = COALESCE($5, last_name)
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(&data.username)
        .bind(&data.email)
        .bind(&data.first_name)
        .bind(&data.last_name)
        .execute(&mut *tx)
        .await
        .map_err(|e| constraint_error(e, "Username"))?;

        tx.commit().await?;
        self.get_by_id(id).await
    }

    /// Delete a member and its user account. Members with loan history cannot
    /// be deleted.
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let user_id: i32 = sqlx::query_scalar("DELETE FROM members WHERE id = $1 RETURNING user_id")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| delete_error(e, "Member"))?
            .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", id)))?;

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
