//! Books repository

use sqlx::{Pool, Postgres};

use super::{constraint_error, delete_error, lending::lock_book};
use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookQuery, CreateBook, UpdateBook},
};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// List books, optionally filtered by author, title fragment or availability
    pub async fn list(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        let mut conditions = Vec::new();
        let mut idx = 1;

        if query.author_id.is_some() {
            conditions.push(format!("author_id = ${}", idx));
            idx += 1;
        }
        if query.title.is_some() {
            conditions.push(format!("title ILIKE '%' || ${} || '%'", idx));
        }
        match query.available {
            Some(true) => conditions.push("available_copies > 0".to_string()),
            Some(false) => conditions.push("available_copies = 0".to_string()),
            None => {}
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let sql = format!("SELECT * FROM books {} ORDER BY title, id", where_clause);

        let mut builder = sqlx::query_as::<_, Book>(&sql);
        if let Some(author_id) = query.author_id {
            builder = builder.bind(author_id);
        }
        if let Some(ref title) = query.title {
            builder = builder.bind(title);
        }

        let rows = builder.fetch_all(&self.pool).await?;
        Ok(rows)
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    async fn author_exists(&self, author_id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM authors WHERE id = $1)")
            .bind(author_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    pub async fn create(&self, data: &CreateBook) -> AppResult<Book> {
        let available_copies = data.initial_available_copies()?;

        if !self.author_exists(data.author_id).await? {
            return Err(AppError::UnknownReference(format!(
                "Author {} does not exist.",
                data.author_id
            )));
        }

        sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, author_id, isbn, genre, published_date, total_copies, available_copies)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&data.title)
        .bind(data.author_id)
        .bind(&data.isbn)
        .bind(&data.genre)
        .bind(data.published_date)
        .bind(data.total_copies)
        .bind(available_copies)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| constraint_error(e, "Book"))
    }

    /// Update a book. Changing `total_copies` moves `available_copies` by the
    /// same amount under the book's row lock.
    pub async fn update(&self, id: i32, data: &UpdateBook) -> AppResult<Book> {
        if let Some(author_id) = data.author_id {
            if !self.author_exists(author_id).await? {
                return Err(AppError::UnknownReference(format!(
                    "Author {} does not exist.",
                    author_id
                )));
            }
        }

        let mut tx = self.pool.begin().await?;
        let mut book = lock_book(&mut tx, id).await?;

        if let Some(ref title) = data.title {
            book.title = title.clone();
        }
        if let Some(author_id) = data.author_id {
            book.author_id = author_id;
        }
        if data.isbn.is_some() {
            book.isbn = data.isbn.clone();
        }
        if data.genre.is_some() {
            book.genre = data.genre.clone();
        }
        if data.published_date.is_some() {
            book.published_date = data.published_date;
        }
        if let Some(total) = data.total_copies {
            book.set_total_copies(total)?;
        }

        let book = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET title = $2, author_id = $3, isbn = $4, genre = $5, published_date = $6,
                total_copies = $7, available_copies = $8
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(book.id)
        .bind(&book.title)
        .bind(book.author_id)
        .bind(&book.isbn)
        .bind(&book.genre)
        .bind(book.published_date)
        .bind(book.total_copies)
        .bind(book.available_copies)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| constraint_error(e, "Book"))?;

        tx.commit().await?;
        Ok(book)
    }

    /// Books with loan history cannot be deleted
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| delete_error(e, "Book"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }
        Ok(())
    }
}
