use crate::database::{DatabaseConnection, DependOnDatabaseConnection, Transaction};
use crate::entity::{BookId, Loan, LoanHistory};
use crate::KernelError;

#[async_trait::async_trait]
pub trait LoanQuery: 'static + Sync + Send {
    type Transaction: Transaction;

    /// All loans joined with their book title, newest loan id first.
    async fn find_history(
        &self,
        con: &mut Self::Transaction,
    ) -> error_stack::Result<Vec<LoanHistory>, KernelError>;

    async fn find_by_book_id(
        &self,
        con: &mut Self::Transaction,
        book_id: &BookId,
    ) -> error_stack::Result<Vec<Loan>, KernelError>;
}

pub trait DependOnLoanQuery: 'static + Sync + Send + DependOnDatabaseConnection {
    type LoanQuery: LoanQuery<
        Transaction = <Self::DatabaseConnection as DatabaseConnection>::Transaction,
    >;
    fn loan_query(&self) -> &Self::LoanQuery;
}
