mod book;
mod loan;

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use error_stack::{Report, ResultExt};
use sqlx::error::ErrorKind;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Error, PgConnection, Pool, Postgres};

use kernel::interface::database::{DatabaseConnection, Transaction};
use kernel::interface::query::{DependOnBookQuery, DependOnLoanQuery};
use kernel::interface::update::{
    DependOnBookModifier, DependOnInventoryLedger, DependOnLoanTracker,
};
use kernel::KernelError;

pub use self::{book::*, loan::*};
use crate::error::ConvertError;
use crate::{env, env_or};

static POSTGRES_URL: &str = "POSTGRES_URL";
static POSTGRES_MAX_CONNECTIONS: &str = "POSTGRES_MAX_CONNECTIONS";
static POSTGRES_ACQUIRE_TIMEOUT_SECS: &str = "POSTGRES_ACQUIRE_TIMEOUT_SECS";

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Clone)]
pub struct PostgresDatabase {
    pool: Pool<Postgres>,
}

impl PostgresDatabase {
    pub async fn new() -> error_stack::Result<Self, KernelError> {
        let url = env(POSTGRES_URL)?;
        let max_connections = env_or(POSTGRES_MAX_CONNECTIONS, 10u32)?;
        let acquire_timeout = env_or(POSTGRES_ACQUIRE_TIMEOUT_SECS, 5u64)?;
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(acquire_timeout))
            .connect(&url)
            .await
            .convert_error()
            .attach_printable("Failed to connect postgres")?;
        MIGRATOR
            .run(&pool)
            .await
            .change_context_lazy(|| KernelError::Internal)
            .attach_printable("Failed to migrate postgres schema")?;
        tracing::info!(max_connections, acquire_timeout, "Connected to postgres");
        Ok(Self { pool })
    }
}

/// A postgres transaction. Dropping it without commit rolls back.
pub struct PostgresConnection(sqlx::Transaction<'static, Postgres>);

impl Deref for PostgresConnection {
    type Target = PgConnection;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for PostgresConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

#[async_trait::async_trait]
impl Transaction for PostgresConnection {
    async fn commit(self) -> error_stack::Result<(), KernelError> {
        self.0.commit().await.convert_error()
    }

    async fn roll_back(self) -> error_stack::Result<(), KernelError> {
        self.0.rollback().await.convert_error()
    }
}

#[async_trait::async_trait]
impl DatabaseConnection for PostgresDatabase {
    type Transaction = PostgresConnection;
    async fn transact(&self) -> error_stack::Result<PostgresConnection, KernelError> {
        let con = self.pool.begin().await.convert_error()?;
        Ok(PostgresConnection(con))
    }
}

impl DependOnBookQuery for PostgresDatabase {
    type BookQuery = PostgresBookRepository;
    fn book_query(&self) -> &Self::BookQuery {
        &PostgresBookRepository
    }
}

impl DependOnBookModifier for PostgresDatabase {
    type BookModifier = PostgresBookRepository;
    fn book_modifier(&self) -> &Self::BookModifier {
        &PostgresBookRepository
    }
}

impl DependOnInventoryLedger for PostgresDatabase {
    type InventoryLedger = PostgresBookRepository;
    fn inventory_ledger(&self) -> &Self::InventoryLedger {
        &PostgresBookRepository
    }
}

impl DependOnLoanQuery for PostgresDatabase {
    type LoanQuery = PostgresLoanRepository;
    fn loan_query(&self) -> &Self::LoanQuery {
        &PostgresLoanRepository
    }
}

impl DependOnLoanTracker for PostgresDatabase {
    type LoanTracker = PostgresLoanRepository;
    fn loan_tracker(&self) -> &Self::LoanTracker {
        &PostgresLoanRepository
    }
}

impl<T> ConvertError for Result<T, Error> {
    type Ok = T;
    fn convert_error(self) -> error_stack::Result<T, KernelError> {
        self.map_err(|error| {
            let context = match &error {
                Error::PoolTimedOut
                | Error::PoolClosed
                | Error::WorkerCrashed
                | Error::Io(_)
                | Error::Tls(_) => KernelError::StoreUnavailable,
                Error::Database(database) => match database.kind() {
                    ErrorKind::UniqueViolation => KernelError::DuplicateTitle,
                    ErrorKind::CheckViolation | ErrorKind::NotNullViolation => {
                        KernelError::InvalidInput
                    }
                    _ => KernelError::Internal,
                },
                _ => KernelError::Internal,
            };
            Report::from(error).change_context(context)
        })
    }
}

#[cfg(test)]
mod test {
    use sqlx::Error;

    use kernel::KernelError;

    use crate::error::ConvertError;

    #[test]
    fn pool_timeout_is_store_unavailable() {
        let result: Result<(), Error> = Err(Error::PoolTimedOut);
        let report = result.convert_error().unwrap_err();
        assert_eq!(report.current_context(), &KernelError::StoreUnavailable);
    }

    #[test]
    fn missing_row_is_internal() {
        let result: Result<(), Error> = Err(Error::RowNotFound);
        let report = result.convert_error().unwrap_err();
        assert_eq!(report.current_context(), &KernelError::Internal);
    }
}
