use crate::controller::Controller;
use crate::error::ErrorStatus;
use crate::handler::{AppModule, Database};
use crate::request::{BorrowRequest, LoanTransformer, ReturnRequest};
use crate::response::{CreatedLoanPresenter, LoanPresenter};
use application::service::{BorrowBookService, GetLoanHistoryService, ReturnBookService};
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};

pub trait LoanRouter {
    fn route_loan(self) -> Self;
}

impl<D: Database> LoanRouter for Router<AppModule<D>> {
    fn route_loan(self) -> Self {
        self.route(
            "/loans",
            post(
                |State(module): State<AppModule<D>>, Json(req): Json<BorrowRequest>| async move {
                    Controller::new(LoanTransformer, CreatedLoanPresenter)
                        .intake(req)
                        .handle(|dto| async move { module.database().borrow_book(dto).await })
                        .await
                        .map_err(ErrorStatus::from)
                },
            ),
        )
        .route(
            "/returns",
            post(
                |State(module): State<AppModule<D>>, Json(req): Json<ReturnRequest>| async move {
                    Controller::new(LoanTransformer, LoanPresenter)
                        .intake(req)
                        .handle(|dto| async move { module.database().return_book(dto).await })
                        .await
                        .map_err(ErrorStatus::from)
                },
            ),
        )
        .route(
            "/history",
            get(|State(module): State<AppModule<D>>| async move {
                Controller::new((), LoanPresenter)
                    .bypass(|| async move { module.database().get_history().await })
                    .await
                    .map_err(ErrorStatus::from)
            }),
        )
    }
}
