//! src/services/table_store.rs
//!
//! Key-value table seam for book records. `SqliteTableStore` keeps every
//! logical table in one `book_items` relation keyed by `(table_name, id)`.
//! Writes are unconditional upserts: the last write for an id wins.

use crate::models::book::{Book, parse_decimal};
use chrono::Utc;
use futures::{FutureExt, future::BoxFuture};
use sqlx::{FromRow, SqlitePool};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

#[derive(Debug, Error)]
pub enum TableError {
    #[error("stored price `{price}` for `{id}` is not a decimal")]
    CorruptPrice { id: String, price: String },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type TableResult<T> = Result<T, TableError>;

pub trait TableStore: Send + Sync {
    /// Insert or fully replace the record keyed by `book.id`.
    fn put_item<'a>(&'a self, table: &'a str, book: &'a Book) -> BoxFuture<'a, TableResult<()>>;

    fn get_item<'a>(&'a self, table: &'a str, id: &'a str)
    -> BoxFuture<'a, TableResult<Option<Book>>>;
}

#[derive(FromRow, Debug)]
struct BookRow {
    id: String,
    rv_id: i64,
    name: String,
    author: String,
    price: String,
    category: Option<String>,
    description: Option<String>,
    image: Option<String>,
}

impl TryFrom<BookRow> for Book {
    type Error = TableError;

    fn try_from(row: BookRow) -> TableResult<Self> {
        let price = parse_decimal(&row.price).ok_or_else(|| TableError::CorruptPrice {
            id: row.id.clone(),
            price: row.price.clone(),
        })?;
        Ok(Book {
            id: row.id,
            rv_id: row.rv_id,
            name: row.name,
            author: row.author,
            price,
            category: row.category,
            description: row.description,
            image: row.image,
        })
    }
}

/// SQLite-backed table store.
#[derive(Clone)]
pub struct SqliteTableStore {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

impl SqliteTableStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    async fn upsert(&self, table: &str, book: &Book) -> TableResult<()> {
        sqlx::query(
            r#"
            INSERT INTO book_items (
                table_name, id, rv_id, name, author, price,
                category, description, image, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(table_name, id) DO UPDATE SET
                rv_id = excluded.rv_id,
                name = excluded.name,
                author = excluded.author,
                price = excluded.price,
                category = excluded.category,
                description = excluded.description,
                image = excluded.image,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(table)
        .bind(&book.id)
        .bind(book.rv_id)
        .bind(&book.name)
        .bind(&book.author)
        .bind(book.price.to_string())
        .bind(&book.category)
        .bind(&book.description)
        .bind(&book.image)
        .bind(Utc::now())
        .execute(&*self.db)
        .await?;

        debug!(table, id = %book.id, "upserted book item");
        Ok(())
    }

    async fn fetch(&self, table: &str, id: &str) -> TableResult<Option<Book>> {
        let row = sqlx::query_as::<_, BookRow>(
            "SELECT id, rv_id, name, author, price, category, description, image
             FROM book_items WHERE table_name = ? AND id = ?",
        )
        .bind(table)
        .bind(id)
        .fetch_optional(&*self.db)
        .await?;

        row.map(Book::try_from).transpose()
    }
}

impl TableStore for SqliteTableStore {
    fn put_item<'a>(&'a self, table: &'a str, book: &'a Book) -> BoxFuture<'a, TableResult<()>> {
        self.upsert(table, book).boxed()
    }

    fn get_item<'a>(
        &'a self,
        table: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, TableResult<Option<Book>>> {
        self.fetch(table, id).boxed()
    }
}

/// Apply the embedded schema statement by statement.
pub async fn run_migrations(db: &SqlitePool) -> TableResult<()> {
    let statements = SCHEMA
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} migration statements...", statements.len());

    for stmt in statements {
        debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }

    Ok(())
}
