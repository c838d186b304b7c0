use error_stack::Report;

use kernel::interface::database::{DatabaseConnection, DependOnDatabaseConnection, Transaction};
use kernel::interface::update::{
    DependOnInventoryLedger, DependOnLoanTracker, InventoryLedger, LoanTracker,
};
use kernel::prelude::entity::{BookId, BorrowerName};
use kernel::KernelError;

use crate::service::abort;
use crate::transfer::{BorrowDto, LoanDto, ReturnDto};

#[async_trait::async_trait]
pub trait BorrowBookService:
    'static + Sync + Send + DependOnInventoryLedger + DependOnLoanTracker
{
    /// Takes one copy off the shelf and opens a loan for it, both or neither.
    async fn borrow_book(&self, dto: BorrowDto) -> error_stack::Result<LoanDto, KernelError> {
        let book_id = BookId::new(dto.book_id);
        let borrower = BorrowerName::new(dto.borrower_name.trim());
        if borrower.is_blank() {
            return Err(Report::new(KernelError::InvalidInput)
                .attach_printable("Borrower name must not be empty"));
        }

        let mut connection = self.database_connection().transact().await?;

        match self
            .inventory_ledger()
            .decrement_if_available(&mut connection, &book_id)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(%book_id, "Borrow rejected, no copy on the shelf");
                let report = Report::new(KernelError::OutOfStockOrNotFound)
                    .attach_printable(format!("Book {} is out of stock or missing", book_id));
                return Err(abort(connection, report).await);
            }
            Err(report) => return Err(abort(connection, report).await),
        }

        let loan = match self
            .loan_tracker()
            .open_loan(&mut connection, &book_id, &borrower)
            .await
        {
            Ok(loan) => loan,
            Err(report) => {
                tracing::warn!(%book_id, "Failed to open loan, releasing the copy");
                return Err(abort(connection, report).await);
            }
        };
        connection.commit().await?;

        tracing::info!(%book_id, loan_id = %loan.id(), "Book borrowed");
        Ok(LoanDto::from(loan))
    }
}

impl<T> BorrowBookService for T where T: DependOnInventoryLedger + DependOnLoanTracker {}

#[async_trait::async_trait]
pub trait ReturnBookService:
    'static + Sync + Send + DependOnInventoryLedger + DependOnLoanTracker
{
    /// Closes the oldest open loan of the book and puts the copy back.
    async fn return_book(&self, dto: ReturnDto) -> error_stack::Result<LoanDto, KernelError> {
        let book_id = BookId::new(dto.book_id);
        let mut connection = self.database_connection().transact().await?;

        let loan = match self
            .loan_tracker()
            .close_oldest_open_loan(&mut connection, &book_id)
            .await
        {
            Ok(Some(loan)) => loan,
            Ok(None) => {
                tracing::debug!(%book_id, "Return rejected, no open loan");
                let report = Report::new(KernelError::NoActiveLoan)
                    .attach_printable(format!("Book {} has no open loan", book_id));
                return Err(abort(connection, report).await);
            }
            Err(report) => return Err(abort(connection, report).await),
        };

        match self
            .inventory_ledger()
            .increment(&mut connection, &book_id)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::error!(%book_id, loan_id = %loan.id(), "Closed a loan of a missing book");
                let report = Report::new(KernelError::Internal).attach_printable(format!(
                    "Loan {} was open but book {} does not exist",
                    loan.id(),
                    book_id
                ));
                return Err(abort(connection, report).await);
            }
            Err(report) => return Err(abort(connection, report).await),
        }
        connection.commit().await?;

        tracing::info!(%book_id, loan_id = %loan.id(), "Book returned");
        Ok(LoanDto::from(loan))
    }
}

impl<T> ReturnBookService for T where T: DependOnInventoryLedger + DependOnLoanTracker {}

#[cfg(test)]
mod test {
    use driver::database::{FaultPoint, InMemoryDatabase};
    use kernel::KernelError;

    use crate::service::{
        BorrowBookService, CreateBookService, GetBookService, GetLoanHistoryService,
        ReturnBookService,
    };
    use crate::transfer::{
        BookDto, BorrowDto, CreateBookDto, GetBookDto, GetLoansFromBookIdDto, ReturnDto,
    };

    async fn shelve(
        db: &InMemoryDatabase,
        title: &str,
        stock: i32,
    ) -> error_stack::Result<BookDto, KernelError> {
        db.create_book(CreateBookDto {
            title: title.to_string(),
            author: String::new(),
            stock,
        })
        .await
    }

    fn borrow(book_id: i32, borrower: &str) -> BorrowDto {
        BorrowDto {
            book_id,
            borrower_name: borrower.to_string(),
        }
    }

    async fn stock_of(db: &InMemoryDatabase, id: i32) -> error_stack::Result<i32, KernelError> {
        Ok(db.get_book(GetBookDto { id }).await?.stock)
    }

    async fn open_loans(db: &InMemoryDatabase, book_id: i32) -> error_stack::Result<usize, KernelError> {
        let loans = db.get_loans_of_book(GetLoansFromBookIdDto { book_id }).await?;
        Ok(loans.iter().filter(|loan| loan.status == "open").count())
    }

    #[tokio::test]
    async fn dune() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let book = shelve(&db, "Dune", 1).await?;

        let alice = db.borrow_book(borrow(book.id, "Alice")).await?;
        assert_eq!(alice.status, "open");
        assert_eq!(stock_of(&db, book.id).await?, 0);

        let error = db.borrow_book(borrow(book.id, "Bob")).await.unwrap_err();
        assert_eq!(error.current_context(), &KernelError::OutOfStockOrNotFound);

        let returned = db.return_book(ReturnDto { book_id: book.id }).await?;
        assert_eq!(returned.id, alice.id);
        assert_eq!(returned.borrower_name, "Alice");
        assert_eq!(returned.status, "returned");
        assert!(returned.returned_at.is_some());
        assert_eq!(stock_of(&db, book.id).await?, 1);

        let history = db.get_history().await?;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].book_title, "Dune");
        assert_eq!(history[0].loan.status, "returned");
        Ok(())
    }

    #[tokio::test]
    async fn borrow_without_stock_changes_nothing() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let book = shelve(&db, "Dune", 0).await?;

        let error = db.borrow_book(borrow(book.id, "Alice")).await.unwrap_err();
        assert_eq!(error.current_context(), &KernelError::OutOfStockOrNotFound);
        assert_eq!(stock_of(&db, book.id).await?, 0);
        assert!(db.get_history().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn borrow_of_missing_book_is_rejected() {
        let db = InMemoryDatabase::new();
        let error = db.borrow_book(borrow(99, "Alice")).await.unwrap_err();
        assert_eq!(error.current_context(), &KernelError::OutOfStockOrNotFound);
    }

    #[tokio::test]
    async fn blank_borrower_is_rejected() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let book = shelve(&db, "Dune", 1).await?;

        let error = db.borrow_book(borrow(book.id, "  \t")).await.unwrap_err();
        assert_eq!(error.current_context(), &KernelError::InvalidInput);
        assert_eq!(stock_of(&db, book.id).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn return_without_open_loan() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let book = shelve(&db, "Dune", 2).await?;

        let error = db
            .return_book(ReturnDto { book_id: book.id })
            .await
            .unwrap_err();
        assert_eq!(error.current_context(), &KernelError::NoActiveLoan);
        assert_eq!(stock_of(&db, book.id).await?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn borrow_then_return_restores_stock() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let book = shelve(&db, "Dune", 3).await?;

        let loan = db.borrow_book(borrow(book.id, "Alice")).await?;
        assert_eq!(stock_of(&db, book.id).await?, 2);
        db.return_book(ReturnDto { book_id: book.id }).await?;
        assert_eq!(stock_of(&db, book.id).await?, 3);

        let loans = db
            .get_loans_of_book(GetLoansFromBookIdDto { book_id: book.id })
            .await?;
        assert_eq!(loans.len(), 1);
        assert_eq!(loans[0].id, loan.id);
        assert_eq!(loans[0].status, "returned");
        Ok(())
    }

    #[tokio::test]
    async fn returns_close_oldest_first() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let book = shelve(&db, "Dune", 3).await?;
        let alice = db.borrow_book(borrow(book.id, "Alice")).await?;
        let bob = db.borrow_book(borrow(book.id, "Bob")).await?;

        let first = db.return_book(ReturnDto { book_id: book.id }).await?;
        assert_eq!(first.id, alice.id);
        let second = db.return_book(ReturnDto { book_id: book.id }).await?;
        assert_eq!(second.id, bob.id);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_borrows_of_last_copy() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let book_id = shelve(&db, "Dune", 1).await?.id;

        let handles = (0..8)
            .map(|n| {
                let db = db.clone();
                tokio::spawn(async move {
                    db.borrow_book(borrow(book_id, &format!("reader-{n}"))).await
                })
            })
            .collect::<Vec<_>>();

        let mut succeeded = 0;
        for handle in handles {
            match handle.await {
                Ok(Ok(_)) => succeeded += 1,
                Ok(Err(error)) => {
                    assert_eq!(error.current_context(), &KernelError::OutOfStockOrNotFound)
                }
                Err(join) => panic!("borrow task panicked: {join}"),
            }
        }
        assert_eq!(succeeded, 1);
        assert_eq!(stock_of(&db, book_id).await?, 0);
        assert_eq!(open_loans(&db, book_id).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn failed_loan_insert_releases_the_copy() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let book = shelve(&db, "Dune", 1).await?;

        db.fail_next(FaultPoint::OpenLoan);
        let error = db.borrow_book(borrow(book.id, "Alice")).await.unwrap_err();
        assert_eq!(error.current_context(), &KernelError::StoreUnavailable);
        assert_eq!(stock_of(&db, book.id).await?, 1);
        assert!(db.get_history().await?.is_empty());

        db.borrow_book(borrow(book.id, "Alice")).await?;
        assert_eq!(stock_of(&db, book.id).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn failed_credit_keeps_the_loan_open() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let book = shelve(&db, "Dune", 1).await?;
        db.borrow_book(borrow(book.id, "Alice")).await?;

        db.fail_next(FaultPoint::IncrementStock);
        let error = db
            .return_book(ReturnDto { book_id: book.id })
            .await
            .unwrap_err();
        assert_eq!(error.current_context(), &KernelError::StoreUnavailable);
        assert_eq!(stock_of(&db, book.id).await?, 0);
        assert_eq!(open_loans(&db, book.id).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn failed_commit_changes_nothing() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let book = shelve(&db, "Dune", 1).await?;

        db.fail_next(FaultPoint::Commit);
        let error = db.borrow_book(borrow(book.id, "Alice")).await.unwrap_err();
        assert_eq!(error.current_context(), &KernelError::StoreUnavailable);
        assert_eq!(stock_of(&db, book.id).await?, 1);
        assert_eq!(open_loans(&db, book.id).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn failed_debit_changes_nothing() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let book = shelve(&db, "Dune", 1).await?;

        db.fail_next(FaultPoint::DecrementStock);
        let error = db.borrow_book(borrow(book.id, "Alice")).await.unwrap_err();
        assert_eq!(error.current_context(), &KernelError::StoreUnavailable);
        assert_eq!(stock_of(&db, book.id).await?, 1);
        assert!(db.get_history().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn failed_close_keeps_the_loan_open() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let book = shelve(&db, "Dune", 1).await?;
        let loan = db.borrow_book(borrow(book.id, "Alice")).await?;

        db.fail_next(FaultPoint::CloseLoan);
        let error = db
            .return_book(ReturnDto { book_id: book.id })
            .await
            .unwrap_err();
        assert_eq!(error.current_context(), &KernelError::StoreUnavailable);
        assert_eq!(stock_of(&db, book.id).await?, 0);
        assert_eq!(open_loans(&db, book.id).await?, 1);

        let returned = db.return_book(ReturnDto { book_id: book.id }).await?;
        assert_eq!(returned.id, loan.id);
        assert_eq!(stock_of(&db, book.id).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn stock_tracks_open_loans() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let copies = 3;
        let book = shelve(&db, "Dune", copies).await?;

        // borrow = true, return = false
        let steps = [
            true, true, false, true, true, true, false, false, false, false, true, false,
        ];
        let mut open = 0;
        for (n, step) in steps.into_iter().enumerate() {
            if step {
                let result = db.borrow_book(borrow(book.id, &format!("reader-{n}"))).await;
                if open < copies {
                    assert_eq!(result?.status, "open");
                    open += 1;
                } else {
                    let error = result.unwrap_err();
                    assert_eq!(error.current_context(), &KernelError::OutOfStockOrNotFound);
                }
            } else {
                let result = db.return_book(ReturnDto { book_id: book.id }).await;
                if open > 0 {
                    assert_eq!(result?.status, "returned");
                    open -= 1;
                } else {
                    let error = result.unwrap_err();
                    assert_eq!(error.current_context(), &KernelError::NoActiveLoan);
                }
            }
            assert_eq!(stock_of(&db, book.id).await?, copies - open);
            assert_eq!(open_loans(&db, book.id).await?, open as usize);
        }
        assert_eq!(open, 0);
        Ok(())
    }
}
