use crate::controller::Exhaust;
use application::transfer::{LoanDto, LoanHistoryDto};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use time::OffsetDateTime;

#[derive(Debug, Serialize)]
pub struct LoanResponse {
    id: i64,
    book_id: i32,
    borrower_name: String,
    #[serde(with = "time::serde::rfc3339")]
    borrowed_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    returned_at: Option<OffsetDateTime>,
    status: String,
}

impl From<LoanDto> for LoanResponse {
    fn from(value: LoanDto) -> Self {
        Self {
            id: value.id,
            book_id: value.book_id,
            borrower_name: value.borrower_name,
            borrowed_at: value.borrowed_at,
            returned_at: value.returned_at,
            status: value.status,
        }
    }
}

impl IntoResponse for LoanResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, axum::Json(self)).into_response()
    }
}

#[derive(Debug)]
pub struct CreatedLoanResponse(LoanResponse);

impl IntoResponse for CreatedLoanResponse {
    fn into_response(self) -> Response {
        (StatusCode::CREATED, axum::Json(self.0)).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct LoanHistoryResponse {
    #[serde(flatten)]
    loan: LoanResponse,
    book_title: String,
}

pub struct LoanPresenter;

impl Exhaust<LoanDto> for LoanPresenter {
    type To = LoanResponse;
    fn emit(&self, input: LoanDto) -> Self::To {
        LoanResponse::from(input)
    }
}

impl Exhaust<Vec<LoanDto>> for LoanPresenter {
    type To = axum::Json<Vec<LoanResponse>>;
    fn emit(&self, input: Vec<LoanDto>) -> Self::To {
        axum::Json::from(input.into_iter().map(LoanResponse::from).collect::<Vec<_>>())
    }
}

impl Exhaust<Vec<LoanHistoryDto>> for LoanPresenter {
    type To = axum::Json<Vec<LoanHistoryResponse>>;
    fn emit(&self, input: Vec<LoanHistoryDto>) -> Self::To {
        let result = input
            .into_iter()
            .map(|entry| LoanHistoryResponse {
                loan: LoanResponse::from(entry.loan),
                book_title: entry.book_title,
            })
            .collect::<Vec<_>>();

        axum::Json::from(result)
    }
}

pub struct CreatedLoanPresenter;

impl Exhaust<LoanDto> for CreatedLoanPresenter {
    type To = CreatedLoanResponse;
    fn emit(&self, input: LoanDto) -> Self::To {
        CreatedLoanResponse(LoanResponse::from(input))
    }
}
