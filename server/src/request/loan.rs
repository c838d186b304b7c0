use crate::controller::Intake;
use application::transfer::{BorrowDto, ReturnDto};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct BorrowRequest {
    book_id: i32,
    borrower_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ReturnRequest {
    book_id: i32,
}

pub struct LoanTransformer;

impl Intake<BorrowRequest> for LoanTransformer {
    type To = BorrowDto;
    fn emit(&self, input: BorrowRequest) -> Self::To {
        BorrowDto {
            book_id: input.book_id,
            borrower_name: input.borrower_name,
        }
    }
}

impl Intake<ReturnRequest> for LoanTransformer {
    type To = ReturnDto;
    fn emit(&self, input: ReturnRequest) -> Self::To {
        ReturnDto {
            book_id: input.book_id,
        }
    }
}
