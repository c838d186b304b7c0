use error_stack::Report;
use sqlx::PgConnection;
use time::OffsetDateTime;

use kernel::interface::query::LoanQuery;
use kernel::interface::update::LoanTracker;
use kernel::prelude::entity::{
    BookId, BookTitle, BorrowedAt, BorrowerName, Loan, LoanHistory, LoanId, LoanStatus,
    ReturnedAt,
};
use kernel::KernelError;

use crate::database::postgres::PostgresConnection;
use crate::error::ConvertError;

pub struct PostgresLoanRepository;

#[async_trait::async_trait]
impl LoanQuery for PostgresLoanRepository {
    type Transaction = PostgresConnection;

    async fn find_history(
        &self,
        con: &mut PostgresConnection,
    ) -> error_stack::Result<Vec<LoanHistory>, KernelError> {
        PgLoanInternal::find_history(con).await
    }

    async fn find_by_book_id(
        &self,
        con: &mut PostgresConnection,
        book_id: &BookId,
    ) -> error_stack::Result<Vec<Loan>, KernelError> {
        PgLoanInternal::find_by_book_id(con, book_id).await
    }
}

#[async_trait::async_trait]
impl LoanTracker for PostgresLoanRepository {
    type Transaction = PostgresConnection;

    async fn open_loan(
        &self,
        con: &mut PostgresConnection,
        book_id: &BookId,
        borrower: &BorrowerName,
    ) -> error_stack::Result<Loan, KernelError> {
        PgLoanInternal::open_loan(con, book_id, borrower).await
    }

    async fn close_oldest_open_loan(
        &self,
        con: &mut PostgresConnection,
        book_id: &BookId,
    ) -> error_stack::Result<Option<Loan>, KernelError> {
        PgLoanInternal::close_oldest_open_loan(con, book_id).await
    }

    async fn retire_history(
        &self,
        con: &mut PostgresConnection,
        book_id: &BookId,
    ) -> error_stack::Result<u64, KernelError> {
        PgLoanInternal::retire_history(con, book_id).await
    }
}

#[derive(sqlx::FromRow)]
struct LoanRow {
    id: i64,
    book_id: i32,
    borrower_name: String,
    borrowed_at: OffsetDateTime,
    returned_at: Option<OffsetDateTime>,
    status: String,
}

impl TryFrom<LoanRow> for Loan {
    type Error = Report<KernelError>;
    fn try_from(value: LoanRow) -> Result<Self, Self::Error> {
        Ok(Loan::new(
            LoanId::new(value.id),
            BookId::new(value.book_id),
            BorrowerName::new(value.borrower_name),
            BorrowedAt::new(value.borrowed_at),
            value.returned_at.map(ReturnedAt::new),
            value.status.parse::<LoanStatus>()?,
        ))
    }
}

#[derive(sqlx::FromRow)]
struct LoanHistoryRow {
    #[sqlx(flatten)]
    loan: LoanRow,
    book_title: String,
}

impl TryFrom<LoanHistoryRow> for LoanHistory {
    type Error = Report<KernelError>;
    fn try_from(value: LoanHistoryRow) -> Result<Self, Self::Error> {
        Ok(LoanHistory::new(
            Loan::try_from(value.loan)?,
            BookTitle::new(value.book_title),
        ))
    }
}

pub(in crate::database) struct PgLoanInternal;

impl PgLoanInternal {
    async fn find_history(con: &mut PgConnection) -> error_stack::Result<Vec<LoanHistory>, KernelError> {
        let rows = sqlx::query_as::<_, LoanHistoryRow>(
            // language=postgresql
            r#"
            SELECT
                l.id,
                l.book_id,
                l.borrower_name,
                l.borrowed_at,
                l.returned_at,
                l.status,
                b.title AS book_title
            FROM
                loans l
                JOIN books b ON b.id = l.book_id
            ORDER BY
                l.id DESC
            "#,
        )
        .fetch_all(con)
        .await
        .convert_error()?;
        rows.into_iter().map(LoanHistory::try_from).collect()
    }

    async fn find_by_book_id(
        con: &mut PgConnection,
        book_id: &BookId,
    ) -> error_stack::Result<Vec<Loan>, KernelError> {
        let rows = sqlx::query_as::<_, LoanRow>(
            // language=postgresql
            r#"
            SELECT
                id,
                book_id,
                borrower_name,
                borrowed_at,
                returned_at,
                status
            FROM
                loans
            WHERE
                book_id = $1
            ORDER BY
                id DESC
            "#,
        )
        .bind(book_id.as_ref())
        .fetch_all(con)
        .await
        .convert_error()?;
        rows.into_iter().map(Loan::try_from).collect()
    }

    async fn open_loan(
        con: &mut PgConnection,
        book_id: &BookId,
        borrower: &BorrowerName,
    ) -> error_stack::Result<Loan, KernelError> {
        let row = sqlx::query_as::<_, LoanRow>(
            // language=postgresql
            r#"
            INSERT INTO loans (book_id, borrower_name, status)
            VALUES ($1, $2, $3)
            RETURNING id, book_id, borrower_name, borrowed_at, returned_at, status
            "#,
        )
        .bind(book_id.as_ref())
        .bind(borrower.as_ref())
        .bind(LoanStatus::Open.as_str())
        .fetch_one(con)
        .await
        .convert_error()?;
        Loan::try_from(row)
    }

    async fn close_oldest_open_loan(
        con: &mut PgConnection,
        book_id: &BookId,
    ) -> error_stack::Result<Option<Loan>, KernelError> {
        // SKIP LOCKED hands concurrent returns distinct rows; the outer status check
        // keeps a row from being closed twice.
        let row = sqlx::query_as::<_, LoanRow>(
            // language=postgresql
            r#"
            UPDATE loans
            SET status = $3, returned_at = now()
            WHERE id = (
                SELECT id
                FROM loans
                WHERE book_id = $1 AND status = $2
                ORDER BY borrowed_at ASC, id ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            ) AND status = $2
            RETURNING id, book_id, borrower_name, borrowed_at, returned_at, status
            "#,
        )
        .bind(book_id.as_ref())
        .bind(LoanStatus::Open.as_str())
        .bind(LoanStatus::Returned.as_str())
        .fetch_optional(con)
        .await
        .convert_error()?;
        row.map(Loan::try_from).transpose()
    }

    async fn retire_history(
        con: &mut PgConnection,
        book_id: &BookId,
    ) -> error_stack::Result<u64, KernelError> {
        let result = sqlx::query(
            // language=postgresql
            r#"
            DELETE FROM loans
            WHERE book_id = $1
            "#,
        )
        .bind(book_id.as_ref())
        .execute(con)
        .await
        .convert_error()?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod test {
    use kernel::interface::database::{DatabaseConnection, Transaction};
    use kernel::interface::query::LoanQuery;
    use kernel::interface::update::{BookModifier, LoanTracker};
    use kernel::prelude::entity::{
        BookAuthor, BookId, BookStock, BookTitle, BorrowerName, LoanId, LoanStatus, NewBook,
    };
    use kernel::KernelError;

    use crate::database::postgres::{
        PostgresBookRepository, PostgresDatabase, PostgresLoanRepository,
    };

    #[test_with::env(POSTGRES_TEST)]
    #[tokio::test]
    async fn closes_oldest_first() -> error_stack::Result<(), KernelError> {
        let db = PostgresDatabase::new().await?;
        let mut con = db.transact().await?;
        let title = BookTitle::new(format!("loan-{}", rand::random::<u32>()));
        let book = PostgresBookRepository
            .create(&mut con, &NewBook::new(title.clone(), BookAuthor::default(), BookStock::new(2)))
            .await?;

        let first = PostgresLoanRepository
            .open_loan(&mut con, book.id(), &BorrowerName::new("Alice"))
            .await?;
        let second = PostgresLoanRepository
            .open_loan(&mut con, book.id(), &BorrowerName::new("Bob"))
            .await?;
        assert_eq!(first.status(), &LoanStatus::Open);

        let closed = PostgresLoanRepository
            .close_oldest_open_loan(&mut con, book.id())
            .await?
            .expect("an open loan");
        assert_eq!(closed.id(), first.id());
        assert_eq!(closed.status(), &LoanStatus::Returned);
        assert!(closed.returned_at().is_some());

        let history = PostgresLoanRepository.find_by_book_id(&mut con, book.id()).await?;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id(), second.id());

        let joined = PostgresLoanRepository.find_history(&mut con).await?;
        assert!(joined
            .iter()
            .any(|entry| entry.loan().id() == second.id() && entry.book_title() == &title));

        let closed = PostgresLoanRepository
            .close_oldest_open_loan(&mut con, book.id())
            .await?;
        assert_eq!(closed.as_ref().map(|loan| *loan.id()), Some(*second.id()));
        let closed = PostgresLoanRepository
            .close_oldest_open_loan(&mut con, book.id())
            .await?;
        assert!(closed.is_none());

        assert_eq!(PostgresLoanRepository.retire_history(&mut con, book.id()).await?, 2);
        con.roll_back().await?;
        Ok(())
    }

    async fn close_one(
        db: PostgresDatabase,
        book_id: BookId,
    ) -> error_stack::Result<Option<LoanId>, KernelError> {
        let mut con = db.transact().await?;
        let closed = PostgresLoanRepository
            .close_oldest_open_loan(&mut con, &book_id)
            .await?;
        con.commit().await?;
        Ok(closed.map(|loan| *loan.id()))
    }

    #[test_with::env(POSTGRES_TEST)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn racing_returns_close_one_loan_once() -> error_stack::Result<(), KernelError> {
        let db = PostgresDatabase::new().await?;
        let mut con = db.transact().await?;
        let book = PostgresBookRepository
            .create(
                &mut con,
                &NewBook::new(
                    BookTitle::new(format!("return-{}", rand::random::<u32>())),
                    BookAuthor::default(),
                    BookStock::new(0),
                ),
            )
            .await?;
        let loan = PostgresLoanRepository
            .open_loan(&mut con, book.id(), &BorrowerName::new("Alice"))
            .await?;
        con.commit().await?;

        let (first, second) = tokio::join!(
            tokio::spawn(close_one(db.clone(), *book.id())),
            tokio::spawn(close_one(db.clone(), *book.id())),
        );
        let first = first.expect("first return task")?;
        let second = second.expect("second return task")?;
        let closed = [first, second].into_iter().flatten().collect::<Vec<_>>();
        assert_eq!(closed, vec![*loan.id()]);

        let mut con = db.transact().await?;
        PostgresLoanRepository.retire_history(&mut con, book.id()).await?;
        PostgresBookRepository.delete(&mut con, book.id()).await?;
        con.commit().await?;
        Ok(())
    }

    #[test_with::env(POSTGRES_TEST)]
    #[tokio::test]
    async fn loan_for_missing_book_is_internal() -> error_stack::Result<(), KernelError> {
        let db = PostgresDatabase::new().await?;
        let mut con = db.transact().await?;
        let error = PostgresLoanRepository
            .open_loan(&mut con, &BookId::new(i32::MAX), &BorrowerName::new("Alice"))
            .await
            .unwrap_err();
        assert_eq!(error.current_context(), &KernelError::Internal);
        con.roll_back().await?;
        Ok(())
    }
}
