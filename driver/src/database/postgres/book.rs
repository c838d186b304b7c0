use sqlx::PgConnection;

use kernel::interface::query::BookQuery;
use kernel::interface::update::{BookModifier, InventoryLedger};
use kernel::prelude::entity::{
    Book, BookAuthor, BookId, BookPatch, BookStock, BookTitle, NewBook,
};
use kernel::KernelError;

use crate::database::postgres::PostgresConnection;
use crate::error::ConvertError;

pub struct PostgresBookRepository;

#[async_trait::async_trait]
impl BookQuery for PostgresBookRepository {
    type Transaction = PostgresConnection;

    async fn find_by_id(
        &self,
        con: &mut PostgresConnection,
        id: &BookId,
    ) -> error_stack::Result<Option<Book>, KernelError> {
        PgBookInternal::find_by_id(con, id).await
    }

    async fn find_all(
        &self,
        con: &mut PostgresConnection,
    ) -> error_stack::Result<Vec<Book>, KernelError> {
        PgBookInternal::find_all(con).await
    }

    async fn find_by_title(
        &self,
        con: &mut PostgresConnection,
        title: &BookTitle,
    ) -> error_stack::Result<Option<Book>, KernelError> {
        PgBookInternal::find_by_title(con, title).await
    }
}

#[async_trait::async_trait]
impl BookModifier for PostgresBookRepository {
    type Transaction = PostgresConnection;

    async fn create(
        &self,
        con: &mut PostgresConnection,
        book: &NewBook,
    ) -> error_stack::Result<Book, KernelError> {
        PgBookInternal::create(con, book).await
    }

    async fn update(
        &self,
        con: &mut PostgresConnection,
        book_id: &BookId,
        patch: &BookPatch,
    ) -> error_stack::Result<Option<Book>, KernelError> {
        PgBookInternal::update(con, book_id, patch).await
    }

    async fn lock(
        &self,
        con: &mut PostgresConnection,
        book_id: &BookId,
    ) -> error_stack::Result<bool, KernelError> {
        PgBookInternal::lock(con, book_id).await
    }

    async fn delete(
        &self,
        con: &mut PostgresConnection,
        book_id: &BookId,
    ) -> error_stack::Result<bool, KernelError> {
        PgBookInternal::delete(con, book_id).await
    }
}

#[async_trait::async_trait]
impl InventoryLedger for PostgresBookRepository {
    type Transaction = PostgresConnection;

    async fn decrement_if_available(
        &self,
        con: &mut PostgresConnection,
        book_id: &BookId,
    ) -> error_stack::Result<bool, KernelError> {
        PgBookInternal::decrement_if_available(con, book_id).await
    }

    async fn increment(
        &self,
        con: &mut PostgresConnection,
        book_id: &BookId,
    ) -> error_stack::Result<bool, KernelError> {
        PgBookInternal::increment(con, book_id).await
    }
}

#[derive(sqlx::FromRow)]
struct BookRow {
    id: i32,
    title: String,
    author: String,
    stock: i32,
}

impl From<BookRow> for Book {
    fn from(value: BookRow) -> Self {
        Book::new(
            BookId::new(value.id),
            BookTitle::new(value.title),
            BookAuthor::new(value.author),
            BookStock::new(value.stock),
        )
    }
}

pub(in crate::database) struct PgBookInternal;

impl PgBookInternal {
    async fn find_by_id(
        con: &mut PgConnection,
        id: &BookId,
    ) -> error_stack::Result<Option<Book>, KernelError> {
        let row = sqlx::query_as::<_, BookRow>(
            // language=postgresql
            r#"
            SELECT id, title, author, stock
            FROM books
            WHERE id = $1
            "#,
        )
        .bind(id.as_ref())
        .fetch_optional(con)
        .await
        .convert_error()?;
        Ok(row.map(Book::from))
    }

    async fn find_all(con: &mut PgConnection) -> error_stack::Result<Vec<Book>, KernelError> {
        let rows = sqlx::query_as::<_, BookRow>(
            // language=postgresql
            r#"
            SELECT id, title, author, stock
            FROM books
            ORDER BY id DESC
            "#,
        )
        .fetch_all(con)
        .await
        .convert_error()?;
        Ok(rows.into_iter().map(Book::from).collect())
    }

    async fn find_by_title(
        con: &mut PgConnection,
        title: &BookTitle,
    ) -> error_stack::Result<Option<Book>, KernelError> {
        let row = sqlx::query_as::<_, BookRow>(
            // language=postgresql
            r#"
            SELECT id, title, author, stock
            FROM books
            WHERE lower(title) = lower($1)
            "#,
        )
        .bind(title.as_ref())
        .fetch_optional(con)
        .await
        .convert_error()?;
        Ok(row.map(Book::from))
    }

    async fn create(con: &mut PgConnection, book: &NewBook) -> error_stack::Result<Book, KernelError> {
        let row = sqlx::query_as::<_, BookRow>(
            // language=postgresql
            r#"
            INSERT INTO books (title, author, stock)
            VALUES ($1, $2, $3)
            RETURNING id, title, author, stock
            "#,
        )
        .bind(book.title().as_ref())
        .bind(book.author().as_ref())
        .bind(book.stock().as_ref())
        .fetch_one(con)
        .await
        .convert_error()?;
        Ok(Book::from(row))
    }

    async fn update(
        con: &mut PgConnection,
        book_id: &BookId,
        patch: &BookPatch,
    ) -> error_stack::Result<Option<Book>, KernelError> {
        let row = sqlx::query_as::<_, BookRow>(
            // language=postgresql
            r#"
            UPDATE books
            SET title  = COALESCE($2, title),
                author = COALESCE($3, author),
                stock  = COALESCE($4, stock)
            WHERE id = $1
            RETURNING id, title, author, stock
            "#,
        )
        .bind(book_id.as_ref())
        .bind(patch.title().clone().map(String::from))
        .bind(patch.author().clone().map(String::from))
        .bind(patch.stock().map(i32::from))
        .fetch_optional(con)
        .await
        .convert_error()?;
        Ok(row.map(Book::from))
    }

    async fn lock(con: &mut PgConnection, book_id: &BookId) -> error_stack::Result<bool, KernelError> {
        let row = sqlx::query_scalar::<_, i32>(
            // language=postgresql
            r#"
            SELECT id
            FROM books
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(book_id.as_ref())
        .fetch_optional(con)
        .await
        .convert_error()?;
        Ok(row.is_some())
    }

    async fn delete(con: &mut PgConnection, book_id: &BookId) -> error_stack::Result<bool, KernelError> {
        let result = sqlx::query(
            // language=postgresql
            r#"
            DELETE FROM books
            WHERE id = $1
            "#,
        )
        .bind(book_id.as_ref())
        .execute(con)
        .await
        .convert_error()?;
        Ok(result.rows_affected() > 0)
    }

    async fn decrement_if_available(
        con: &mut PgConnection,
        book_id: &BookId,
    ) -> error_stack::Result<bool, KernelError> {
        // The guard and the decrement share one statement; concurrent borrowers of the
        // last copy serialize on the row lock and the loser re-reads `stock > 0`.
        let result = sqlx::query(
            // language=postgresql
            r#"
            UPDATE books
            SET stock = stock - 1
            WHERE id = $1 AND stock > 0
            "#,
        )
        .bind(book_id.as_ref())
        .execute(con)
        .await
        .convert_error()?;
        Ok(result.rows_affected() == 1)
    }

    async fn increment(con: &mut PgConnection, book_id: &BookId) -> error_stack::Result<bool, KernelError> {
        let result = sqlx::query(
            // language=postgresql
            r#"
            UPDATE books
            SET stock = stock + 1
            WHERE id = $1
            "#,
        )
        .bind(book_id.as_ref())
        .execute(con)
        .await
        .convert_error()?;
        Ok(result.rows_affected() == 1)
    }
}
