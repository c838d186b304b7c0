use crate::database::{DatabaseConnection, DependOnDatabaseConnection, Transaction};
use crate::entity::{Book, BookId, BookPatch, NewBook};
use crate::KernelError;

#[async_trait::async_trait]
pub trait BookModifier: 'static + Sync + Send {
    type Transaction: Transaction;
    async fn create(
        &self,
        con: &mut Self::Transaction,
        book: &NewBook,
    ) -> error_stack::Result<Book, KernelError>;

    /// Applies `patch` in one write. Returns `None` when the book does not exist.
    async fn update(
        &self,
        con: &mut Self::Transaction,
        book_id: &BookId,
        patch: &BookPatch,
    ) -> error_stack::Result<Option<Book>, KernelError>;

    /// Holds the book row until the transaction ends, so no borrow or return can
    /// touch it in between. Returns `false` when the book does not exist.
    async fn lock(
        &self,
        con: &mut Self::Transaction,
        book_id: &BookId,
    ) -> error_stack::Result<bool, KernelError>;

    /// Returns `false` when the book does not exist.
    async fn delete(
        &self,
        con: &mut Self::Transaction,
        book_id: &BookId,
    ) -> error_stack::Result<bool, KernelError>;
}

pub trait DependOnBookModifier: 'static + Sync + Send + DependOnDatabaseConnection {
    type BookModifier: BookModifier<
        Transaction = <Self::DatabaseConnection as DatabaseConnection>::Transaction,
    >;
    fn book_modifier(&self) -> &Self::BookModifier;
}
