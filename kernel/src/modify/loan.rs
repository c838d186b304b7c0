use crate::database::{DatabaseConnection, DependOnDatabaseConnection, Transaction};
use crate::entity::{BookId, BorrowerName, Loan};
use crate::KernelError;

/// Owns the borrow/return history.
#[async_trait::async_trait]
pub trait LoanTracker: 'static + Sync + Send {
    type Transaction: Transaction;

    async fn open_loan(
        &self,
        con: &mut Self::Transaction,
        book_id: &BookId,
        borrower: &BorrowerName,
    ) -> error_stack::Result<Loan, KernelError>;

    /// Marks the oldest open loan of the book as returned.
    ///
    /// Oldest means earliest `borrowed_at`, then lowest id. Returns `None` when the
    /// book has no open loan.
    async fn close_oldest_open_loan(
        &self,
        con: &mut Self::Transaction,
        book_id: &BookId,
    ) -> error_stack::Result<Option<Loan>, KernelError>;

    /// Deletes every loan of the book and returns how many were removed.
    async fn retire_history(
        &self,
        con: &mut Self::Transaction,
        book_id: &BookId,
    ) -> error_stack::Result<u64, KernelError>;
}

pub trait DependOnLoanTracker: 'static + Sync + Send + DependOnDatabaseConnection {
    type LoanTracker: LoanTracker<
        Transaction = <Self::DatabaseConnection as DatabaseConnection>::Transaction,
    >;
    fn loan_tracker(&self) -> &Self::LoanTracker;
}
