use error_stack::Report;

use kernel::interface::database::{DatabaseConnection, DependOnDatabaseConnection, Transaction};
use kernel::interface::query::{BookQuery, DependOnBookQuery};
use kernel::interface::update::{
    BookModifier, DependOnBookModifier, DependOnLoanTracker, LoanTracker,
};
use kernel::prelude::entity::{BookAuthor, BookId, BookPatch, BookStock, BookTitle, NewBook};
use kernel::KernelError;

use crate::service::abort;
use crate::transfer::{
    BookDto, CreateBookDto, DeleteBookDto, DeletedBookDto, GetBookDto, UpdateBookDto,
};

fn not_found(id: &BookId) -> Report<KernelError> {
    Report::new(KernelError::NotFound).attach_printable(format!("Book {} not found", id))
}

fn validate_title(title: &BookTitle) -> error_stack::Result<(), KernelError> {
    if title.is_blank() {
        return Err(Report::new(KernelError::InvalidInput)
            .attach_printable("Book title must not be empty"));
    }
    Ok(())
}

fn validate_stock(stock: &BookStock) -> error_stack::Result<(), KernelError> {
    if stock.is_negative() {
        return Err(Report::new(KernelError::InvalidInput)
            .attach_printable("Book stock must not be negative"));
    }
    Ok(())
}

#[async_trait::async_trait]
pub trait GetBookService: 'static + Sync + Send + DependOnBookQuery {
    async fn get_book(&self, dto: GetBookDto) -> error_stack::Result<BookDto, KernelError> {
        let mut connection = self.database_connection().transact().await?;

        let id = BookId::new(dto.id);
        let book = self
            .book_query()
            .find_by_id(&mut connection, &id)
            .await?
            .ok_or_else(|| not_found(&id))?;

        Ok(BookDto::from(book))
    }

    async fn get_all_books(&self) -> error_stack::Result<Vec<BookDto>, KernelError> {
        let mut connection = self.database_connection().transact().await?;

        let books = self.book_query().find_all(&mut connection).await?;

        Ok(books.into_iter().map(BookDto::from).collect())
    }
}

impl<T> GetBookService for T where T: DependOnBookQuery {}

#[async_trait::async_trait]
pub trait CreateBookService:
    'static + Sync + Send + DependOnBookQuery + DependOnBookModifier
{
    async fn create_book(&self, dto: CreateBookDto) -> error_stack::Result<BookDto, KernelError> {
        let title = BookTitle::new(dto.title.trim());
        let stock = BookStock::new(dto.stock);
        validate_title(&title)?;
        validate_stock(&stock)?;

        let mut connection = self.database_connection().transact().await?;

        if let Some(existing) = self
            .book_query()
            .find_by_title(&mut connection, &title)
            .await?
        {
            tracing::debug!(book_id = %existing.id(), "Rejected duplicate title");
            return Err(Report::new(KernelError::DuplicateTitle)
                .attach_printable(format!("Title is already used by book {}", existing.id())));
        }

        let book = NewBook::new(title, BookAuthor::new(dto.author), stock);
        let book = self.book_modifier().create(&mut connection, &book).await?;
        connection.commit().await?;

        tracing::info!(book_id = %book.id(), "Book created");
        Ok(BookDto::from(book))
    }
}

impl<T> CreateBookService for T where T: DependOnBookQuery + DependOnBookModifier {}

#[async_trait::async_trait]
pub trait UpdateBookService:
    'static + Sync + Send + DependOnBookQuery + DependOnBookModifier
{
    async fn update_book(&self, dto: UpdateBookDto) -> error_stack::Result<BookDto, KernelError> {
        let id = BookId::new(dto.id);
        let title = dto.title.map(|title| BookTitle::new(title.trim()));
        let stock = dto.stock.map(BookStock::new);
        if let Some(title) = &title {
            validate_title(title)?;
        }
        if let Some(stock) = &stock {
            validate_stock(stock)?;
        }
        let patch = BookPatch::new(title, dto.author.map(BookAuthor::new), stock);

        let mut connection = self.database_connection().transact().await?;

        if patch.is_empty() {
            let book = self
                .book_query()
                .find_by_id(&mut connection, &id)
                .await?
                .ok_or_else(|| not_found(&id))?;
            return Ok(BookDto::from(book));
        }

        if let Some(title) = patch.title() {
            let owner = self.book_query().find_by_title(&mut connection, title).await?;
            if let Some(owner) = owner.filter(|owner| owner.id() != &id) {
                return Err(Report::new(KernelError::DuplicateTitle)
                    .attach_printable(format!("Title is already used by book {}", owner.id())));
            }
        }

        let book = self
            .book_modifier()
            .update(&mut connection, &id, &patch)
            .await?
            .ok_or_else(|| not_found(&id))?;
        connection.commit().await?;

        tracing::info!(book_id = %id, "Book updated");
        Ok(BookDto::from(book))
    }
}

impl<T> UpdateBookService for T where T: DependOnBookQuery + DependOnBookModifier {}

/// Deleting a book locks it first, then retires its whole loan history in the
/// same transaction.
#[async_trait::async_trait]
pub trait DeleteBookService:
    'static + Sync + Send + DependOnBookModifier + DependOnLoanTracker
{
    async fn delete_book(
        &self,
        dto: DeleteBookDto,
    ) -> error_stack::Result<DeletedBookDto, KernelError> {
        let id = BookId::new(dto.id);
        let mut connection = self.database_connection().transact().await?;

        match self.book_modifier().lock(&mut connection, &id).await {
            Ok(true) => {}
            Ok(false) => return Err(abort(connection, not_found(&id)).await),
            Err(report) => return Err(abort(connection, report).await),
        }

        let retired = match self
            .loan_tracker()
            .retire_history(&mut connection, &id)
            .await
        {
            Ok(retired) => retired,
            Err(report) => return Err(abort(connection, report).await),
        };

        match self.book_modifier().delete(&mut connection, &id).await {
            Ok(true) => {}
            Ok(false) => return Err(abort(connection, not_found(&id)).await),
            Err(report) => return Err(abort(connection, report).await),
        }
        connection.commit().await?;

        tracing::info!(book_id = %id, retired_loans = retired, "Book deleted");
        Ok(DeletedBookDto {
            id: id.into(),
            retired_loans: retired,
        })
    }
}

impl<T> DeleteBookService for T where T: DependOnBookModifier + DependOnLoanTracker {}
