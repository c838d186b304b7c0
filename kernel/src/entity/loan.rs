mod borrowed_at;
mod borrower;
mod id;
mod returned_at;
mod status;

pub use self::{borrowed_at::*, borrower::*, id::*, returned_at::*, status::*};
use crate::entity::{BookId, BookTitle};
use destructure::Destructure;
use vodca::References;

/// One borrow of one copy. Moves from [`LoanStatus::Open`] to [`LoanStatus::Returned`] exactly once.
#[derive(Debug, Clone, Eq, PartialEq, References, Destructure)]
pub struct Loan {
    id: LoanId,
    book_id: BookId,
    borrower: BorrowerName,
    borrowed_at: BorrowedAt,
    returned_at: Option<ReturnedAt>,
    status: LoanStatus,
}

impl Loan {
    pub fn new(
        id: LoanId,
        book_id: BookId,
        borrower: BorrowerName,
        borrowed_at: BorrowedAt,
        returned_at: Option<ReturnedAt>,
        status: LoanStatus,
    ) -> Self {
        Self {
            id,
            book_id,
            borrower,
            borrowed_at,
            returned_at,
            status,
        }
    }

    pub fn open(id: LoanId, book_id: BookId, borrower: BorrowerName, borrowed_at: BorrowedAt) -> Self {
        Self::new(id, book_id, borrower, borrowed_at, None, LoanStatus::Open)
    }

    pub fn is_open(&self) -> bool {
        self.status == LoanStatus::Open
    }

    pub fn returned(self, at: ReturnedAt) -> Self {
        self.reconstruct(|loan| {
            loan.status = LoanStatus::Returned;
            loan.returned_at = Some(at);
        })
    }
}

/// A loan joined with the title of its book at read time.
#[derive(Debug, Clone, Eq, PartialEq, References, Destructure)]
pub struct LoanHistory {
    loan: Loan,
    book_title: BookTitle,
}

impl LoanHistory {
    pub fn new(loan: Loan, book_title: BookTitle) -> Self {
        Self { loan, book_title }
    }
}

#[cfg(test)]
mod test {
    use time::OffsetDateTime;

    use super::*;

    fn alice() -> Loan {
        Loan::open(
            LoanId::new(1),
            BookId::new(7),
            BorrowerName::new("Alice"),
            BorrowedAt::new(OffsetDateTime::UNIX_EPOCH),
        )
    }

    #[test]
    fn returned_stamps_time_and_status() {
        let at = ReturnedAt::new(OffsetDateTime::UNIX_EPOCH + time::Duration::hours(3));
        let loan = alice().returned(at.clone());
        assert!(!loan.is_open());
        assert_eq!(loan.status(), &LoanStatus::Returned);
        assert_eq!(loan.returned_at(), &Some(at));
    }

    #[test]
    fn returned_keeps_identity() {
        let loan = alice().returned(ReturnedAt::now());
        assert_eq!(loan.id(), alice().id());
        assert_eq!(loan.borrower(), alice().borrower());
        assert_eq!(loan.borrowed_at(), alice().borrowed_at());
    }
}
