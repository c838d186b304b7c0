use time::OffsetDateTime;

use kernel::prelude::entity::{DestructLoan, DestructLoanHistory, Loan, LoanHistory};

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LoanDto {
    pub id: i64,
    pub book_id: i32,
    pub borrower_name: String,
    pub borrowed_at: OffsetDateTime,
    pub returned_at: Option<OffsetDateTime>,
    pub status: String,
}

impl From<Loan> for LoanDto {
    fn from(value: Loan) -> Self {
        let DestructLoan {
            id,
            book_id,
            borrower,
            borrowed_at,
            returned_at,
            status,
        } = value.into_destruct();
        Self {
            id: id.into(),
            book_id: book_id.into(),
            borrower_name: borrower.into(),
            borrowed_at: borrowed_at.into(),
            returned_at: returned_at.map(OffsetDateTime::from),
            status: status.to_string(),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LoanHistoryDto {
    pub loan: LoanDto,
    pub book_title: String,
}

impl From<LoanHistory> for LoanHistoryDto {
    fn from(value: LoanHistory) -> Self {
        let DestructLoanHistory { loan, book_title } = value.into_destruct();
        Self {
            loan: LoanDto::from(loan),
            book_title: book_title.into(),
        }
    }
}

pub struct BorrowDto {
    pub book_id: i32,
    pub borrower_name: String,
}

pub struct ReturnDto {
    pub book_id: i32,
}

pub struct GetLoansFromBookIdDto {
    pub book_id: i32,
}
