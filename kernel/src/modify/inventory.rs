use crate::database::{DatabaseConnection, DependOnDatabaseConnection, Transaction};
use crate::entity::BookId;
use crate::KernelError;

/// Owns every stock mutation caused by lending.
#[async_trait::async_trait]
pub trait InventoryLedger: 'static + Sync + Send {
    type Transaction: Transaction;

    /// Takes one copy off the shelf if at least one is there.
    ///
    /// The check and the decrement must be a single store operation. Returns `false`
    /// without touching anything when the book is missing or its stock is zero.
    async fn decrement_if_available(
        &self,
        con: &mut Self::Transaction,
        book_id: &BookId,
    ) -> error_stack::Result<bool, KernelError>;

    /// Puts one copy back. Returns `false` when the book is missing.
    async fn increment(
        &self,
        con: &mut Self::Transaction,
        book_id: &BookId,
    ) -> error_stack::Result<bool, KernelError>;
}

pub trait DependOnInventoryLedger: 'static + Sync + Send + DependOnDatabaseConnection {
    type InventoryLedger: InventoryLedger<
        Transaction = <Self::DatabaseConnection as DatabaseConnection>::Transaction,
    >;
    fn inventory_ledger(&self) -> &Self::InventoryLedger;
}
