mod book;
mod loan;

pub use self::{book::*, loan::*};

use crate::handler::{AppModule, Database};
use axum::Router;

/// All routes, mounted under `/api`.
pub fn api<D: Database>(module: AppModule<D>) -> Router {
    let routes = Router::<AppModule<D>>::new().route_book().route_loan();
    Router::new().nest("/api", routes).with_state(module)
}
