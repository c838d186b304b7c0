use driver::database::PostgresDatabase;
use kernel::interface::query::{DependOnBookQuery, DependOnLoanQuery};
use kernel::interface::update::{
    DependOnBookModifier, DependOnInventoryLedger, DependOnLoanTracker,
};
use kernel::KernelError;
use std::ops::Deref;
use std::sync::Arc;

/// Every port the routes reach through. Both store drivers provide all of them.
pub trait Database:
    DependOnBookQuery
    + DependOnBookModifier
    + DependOnInventoryLedger
    + DependOnLoanQuery
    + DependOnLoanTracker
{
}

impl<T> Database for T where
    T: DependOnBookQuery
        + DependOnBookModifier
        + DependOnInventoryLedger
        + DependOnLoanQuery
        + DependOnLoanTracker
{
}

pub struct AppModule<D = PostgresDatabase>(Arc<Handler<D>>);

impl AppModule<PostgresDatabase> {
    pub async fn new() -> error_stack::Result<Self, KernelError> {
        Ok(Self::with_database(PostgresDatabase::new().await?))
    }
}

impl<D: Database> AppModule<D> {
    pub fn with_database(database: D) -> Self {
        Self(Arc::new(Handler { database }))
    }
}

impl<D> Clone for AppModule<D> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<D> Deref for AppModule<D> {
    type Target = Handler<D>;
    fn deref(&self) -> &Self::Target {
        Deref::deref(&self.0)
    }
}

pub struct Handler<D> {
    database: D,
}

impl<D> Handler<D> {
    pub fn database(&self) -> &D {
        &self.database
    }
}
