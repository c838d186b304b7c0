use error_stack::Report;

use kernel::interface::database::{DatabaseConnection, DependOnDatabaseConnection};
use kernel::interface::query::{BookQuery, DependOnBookQuery, DependOnLoanQuery, LoanQuery};
use kernel::prelude::entity::BookId;
use kernel::KernelError;

use crate::transfer::{GetLoansFromBookIdDto, LoanDto, LoanHistoryDto};

#[async_trait::async_trait]
pub trait GetLoanHistoryService: 'static + Sync + Send + DependOnBookQuery + DependOnLoanQuery {
    /// Every loan joined with its book title, newest first.
    async fn get_history(&self) -> error_stack::Result<Vec<LoanHistoryDto>, KernelError> {
        let mut connection = self.database_connection().transact().await?;

        let history = self.loan_query().find_history(&mut connection).await?;

        Ok(history.into_iter().map(LoanHistoryDto::from).collect())
    }

    async fn get_loans_of_book(
        &self,
        dto: GetLoansFromBookIdDto,
    ) -> error_stack::Result<Vec<LoanDto>, KernelError> {
        let mut connection = self.database_connection().transact().await?;

        let book_id = BookId::new(dto.book_id);
        if self
            .book_query()
            .find_by_id(&mut connection, &book_id)
            .await?
            .is_none()
        {
            return Err(Report::new(KernelError::NotFound)
                .attach_printable(format!("Book {} not found", book_id)));
        }

        let loans = self
            .loan_query()
            .find_by_book_id(&mut connection, &book_id)
            .await?;

        Ok(loans.into_iter().map(LoanDto::from).collect())
    }
}

impl<T> GetLoanHistoryService for T where T: DependOnBookQuery + DependOnLoanQuery {}

#[cfg(test)]
mod test {
    use driver::database::InMemoryDatabase;
    use kernel::KernelError;

    use crate::service::{BorrowBookService, CreateBookService, GetLoanHistoryService};
    use crate::transfer::{BorrowDto, CreateBookDto, GetLoansFromBookIdDto};

    #[tokio::test]
    async fn empty_history() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        assert!(db.get_history().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn history_is_newest_first() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let mut ids = Vec::new();
        for title in ["Dune", "Emma"] {
            let book = db
                .create_book(CreateBookDto {
                    title: title.to_string(),
                    author: String::new(),
                    stock: 1,
                })
                .await?;
            ids.push(book.id);
        }
        let first = db
            .borrow_book(BorrowDto {
                book_id: ids[0],
                borrower_name: "Alice".to_string(),
            })
            .await?;
        let second = db
            .borrow_book(BorrowDto {
                book_id: ids[1],
                borrower_name: "Bob".to_string(),
            })
            .await?;

        let history = db.get_history().await?;
        let order = history.iter().map(|entry| entry.loan.id).collect::<Vec<_>>();
        assert_eq!(order, vec![second.id, first.id]);
        assert_eq!(history[0].book_title, "Emma");

        let dune = db
            .get_loans_of_book(GetLoansFromBookIdDto { book_id: ids[0] })
            .await?;
        assert_eq!(dune.len(), 1);
        assert_eq!(dune[0].borrower_name, "Alice");
        Ok(())
    }

    #[tokio::test]
    async fn loans_of_missing_book() {
        let db = InMemoryDatabase::new();
        let error = db
            .get_loans_of_book(GetLoansFromBookIdDto { book_id: 3 })
            .await
            .unwrap_err();
        assert_eq!(error.current_context(), &KernelError::NotFound);
    }
}
