mod book;
mod history;
mod lending;

pub use self::{book::*, history::*, lending::*};

use error_stack::Report;
use kernel::interface::database::Transaction;
use kernel::KernelError;

/// Rolls back after a failed step and returns the failure.
///
/// A rollback that itself fails leaves the store state unknown to this process,
/// so it is logged at error level and appended to the returned report.
pub(crate) async fn abort<T: Transaction>(
    connection: T,
    mut report: Report<KernelError>,
) -> Report<KernelError> {
    if let Err(rollback) = connection.roll_back().await {
        tracing::error!(
            error.cause = ?report,
            error.rollback = ?rollback,
            "Rollback failed; stock and loan history may disagree"
        );
        report.extend_one(rollback);
    }
    report
}
