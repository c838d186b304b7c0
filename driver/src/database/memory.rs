//! Process-local store with the same transactional contract as postgres.
//!
//! A transaction holds the store lock from `transact` until commit or drop, so
//! transactions run one at a time. Writes go to a private copy that replaces the
//! shared state only on commit.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use error_stack::Report;
use tokio::sync::OwnedMutexGuard;

use kernel::interface::database::{DatabaseConnection, Transaction};
use kernel::interface::query::{BookQuery, DependOnBookQuery, DependOnLoanQuery, LoanQuery};
use kernel::interface::update::{
    BookModifier, DependOnBookModifier, DependOnInventoryLedger, DependOnLoanTracker,
    InventoryLedger, LoanTracker,
};
use kernel::prelude::entity::{
    Book, BookId, BookPatch, BookStock, BookTitle, BorrowedAt, BorrowerName, Loan, LoanHistory,
    LoanId, NewBook, ReturnedAt,
};
use kernel::KernelError;

/// Store operations that can be made to fail once, for exercising rollback paths.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum FaultPoint {
    DecrementStock,
    IncrementStock,
    OpenLoan,
    CloseLoan,
    RetireHistory,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct MemoryStore {
    books: BTreeMap<BookId, Book>,
    loans: BTreeMap<LoanId, Loan>,
    last_book_id: i32,
    last_loan_id: i64,
}

impl MemoryStore {
    fn title_taken(&self, title: &BookTitle, except: Option<&BookId>) -> bool {
        let key = title.unique_key();
        self.books
            .values()
            .any(|book| Some(book.id()) != except && book.title().unique_key() == key)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryDatabase {
    store: Arc<tokio::sync::Mutex<MemoryStore>>,
    faults: Arc<Mutex<HashSet<FaultPoint>>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next call reaching `point` fails with [`KernelError::StoreUnavailable`].
    pub fn fail_next(&self, point: FaultPoint) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.insert(point);
        }
    }
}

pub struct InMemoryConnection {
    guard: OwnedMutexGuard<MemoryStore>,
    working: MemoryStore,
    faults: Arc<Mutex<HashSet<FaultPoint>>>,
}

impl InMemoryConnection {
    fn trip(&self, point: FaultPoint) -> error_stack::Result<(), KernelError> {
        let tripped = self
            .faults
            .lock()
            .map(|mut faults| faults.remove(&point))
            .unwrap_or(false);
        if tripped {
            return Err(Report::new(KernelError::StoreUnavailable)
                .attach_printable(format!("Injected fault at {:?}", point)));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Transaction for InMemoryConnection {
    async fn commit(self) -> error_stack::Result<(), KernelError> {
        self.trip(FaultPoint::Commit)?;
        let Self {
            mut guard, working, ..
        } = self;
        *guard = working;
        Ok(())
    }

    async fn roll_back(self) -> error_stack::Result<(), KernelError> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl DatabaseConnection for InMemoryDatabase {
    type Transaction = InMemoryConnection;
    async fn transact(&self) -> error_stack::Result<InMemoryConnection, KernelError> {
        let guard = self.store.clone().lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryConnection {
            guard,
            working,
            faults: self.faults.clone(),
        })
    }
}

pub struct InMemoryBookRepository;

#[async_trait::async_trait]
impl BookQuery for InMemoryBookRepository {
    type Transaction = InMemoryConnection;

    async fn find_by_id(
        &self,
        con: &mut InMemoryConnection,
        id: &BookId,
    ) -> error_stack::Result<Option<Book>, KernelError> {
        Ok(con.working.books.get(id).cloned())
    }

    async fn find_all(
        &self,
        con: &mut InMemoryConnection,
    ) -> error_stack::Result<Vec<Book>, KernelError> {
        Ok(con.working.books.values().rev().cloned().collect())
    }

    async fn find_by_title(
        &self,
        con: &mut InMemoryConnection,
        title: &BookTitle,
    ) -> error_stack::Result<Option<Book>, KernelError> {
        let key = title.unique_key();
        Ok(con
            .working
            .books
            .values()
            .find(|book| book.title().unique_key() == key)
            .cloned())
    }
}

#[async_trait::async_trait]
impl BookModifier for InMemoryBookRepository {
    type Transaction = InMemoryConnection;

    async fn create(
        &self,
        con: &mut InMemoryConnection,
        book: &NewBook,
    ) -> error_stack::Result<Book, KernelError> {
        let store = &mut con.working;
        if store.title_taken(book.title(), None) {
            return Err(Report::new(KernelError::DuplicateTitle));
        }
        if book.stock().is_negative() || book.title().is_blank() {
            return Err(Report::new(KernelError::InvalidInput));
        }
        store.last_book_id += 1;
        let created = book.clone().into_book(BookId::new(store.last_book_id));
        store.books.insert(*created.id(), created.clone());
        Ok(created)
    }

    async fn update(
        &self,
        con: &mut InMemoryConnection,
        book_id: &BookId,
        patch: &BookPatch,
    ) -> error_stack::Result<Option<Book>, KernelError> {
        let store = &mut con.working;
        if let Some(title) = patch.title() {
            if store.title_taken(title, Some(book_id)) {
                return Err(Report::new(KernelError::DuplicateTitle));
            }
        }
        let Some(book) = store.books.remove(book_id) else {
            return Ok(None);
        };
        let updated = patch.apply(book);
        store.books.insert(*book_id, updated.clone());
        Ok(Some(updated))
    }

    async fn lock(
        &self,
        con: &mut InMemoryConnection,
        book_id: &BookId,
    ) -> error_stack::Result<bool, KernelError> {
        Ok(con.working.books.contains_key(book_id))
    }

    async fn delete(
        &self,
        con: &mut InMemoryConnection,
        book_id: &BookId,
    ) -> error_stack::Result<bool, KernelError> {
        let store = &mut con.working;
        if store.loans.values().any(|loan| loan.book_id() == book_id) {
            return Err(Report::new(KernelError::Internal)
                .attach_printable(format!("Book {} is still referenced by loans", book_id)));
        }
        Ok(store.books.remove(book_id).is_some())
    }
}

#[async_trait::async_trait]
impl InventoryLedger for InMemoryBookRepository {
    type Transaction = InMemoryConnection;

    async fn decrement_if_available(
        &self,
        con: &mut InMemoryConnection,
        book_id: &BookId,
    ) -> error_stack::Result<bool, KernelError> {
        con.trip(FaultPoint::DecrementStock)?;
        let Some(book) = con.working.books.remove(book_id) else {
            return Ok(false);
        };
        let available = book.stock().is_available();
        let book = if available {
            book.reconstruct(|book| book.stock = BookStock::new(*book.stock.as_ref() - 1))
        } else {
            book
        };
        con.working.books.insert(*book_id, book);
        Ok(available)
    }

    async fn increment(
        &self,
        con: &mut InMemoryConnection,
        book_id: &BookId,
    ) -> error_stack::Result<bool, KernelError> {
        con.trip(FaultPoint::IncrementStock)?;
        let Some(book) = con.working.books.remove(book_id) else {
            return Ok(false);
        };
        let Some(stock) = book.stock().as_ref().checked_add(1) else {
            let report = Report::new(KernelError::Internal)
                .attach_printable(format!("Stock of book {} is at its limit", book_id));
            con.working.books.insert(*book_id, book);
            return Err(report);
        };
        let book = book.reconstruct(|book| book.stock = BookStock::new(stock));
        con.working.books.insert(*book_id, book);
        Ok(true)
    }
}

pub struct InMemoryLoanRepository;

#[async_trait::async_trait]
impl LoanQuery for InMemoryLoanRepository {
    type Transaction = InMemoryConnection;

    async fn find_history(
        &self,
        con: &mut InMemoryConnection,
    ) -> error_stack::Result<Vec<LoanHistory>, KernelError> {
        let store = &con.working;
        Ok(store
            .loans
            .values()
            .rev()
            .filter_map(|loan| {
                store
                    .books
                    .get(loan.book_id())
                    .map(|book| LoanHistory::new(loan.clone(), book.title().clone()))
            })
            .collect())
    }

    async fn find_by_book_id(
        &self,
        con: &mut InMemoryConnection,
        book_id: &BookId,
    ) -> error_stack::Result<Vec<Loan>, KernelError> {
        Ok(con
            .working
            .loans
            .values()
            .rev()
            .filter(|loan| loan.book_id() == book_id)
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl LoanTracker for InMemoryLoanRepository {
    type Transaction = InMemoryConnection;

    async fn open_loan(
        &self,
        con: &mut InMemoryConnection,
        book_id: &BookId,
        borrower: &BorrowerName,
    ) -> error_stack::Result<Loan, KernelError> {
        con.trip(FaultPoint::OpenLoan)?;
        let store = &mut con.working;
        if !store.books.contains_key(book_id) {
            return Err(Report::new(KernelError::Internal)
                .attach_printable(format!("Loan references missing book {}", book_id)));
        }
        store.last_loan_id += 1;
        let loan = Loan::open(
            LoanId::new(store.last_loan_id),
            *book_id,
            borrower.clone(),
            BorrowedAt::now(),
        );
        store.loans.insert(*loan.id(), loan.clone());
        Ok(loan)
    }

    async fn close_oldest_open_loan(
        &self,
        con: &mut InMemoryConnection,
        book_id: &BookId,
    ) -> error_stack::Result<Option<Loan>, KernelError> {
        con.trip(FaultPoint::CloseLoan)?;
        let store = &mut con.working;
        let oldest = store
            .loans
            .values()
            .filter(|loan| loan.book_id() == book_id && loan.is_open())
            .min_by(|a, b| (a.borrowed_at(), a.id()).cmp(&(b.borrowed_at(), b.id())))
            .map(|loan| *loan.id());
        let Some(loan_id) = oldest else {
            return Ok(None);
        };
        let Some(loan) = store.loans.remove(&loan_id) else {
            return Ok(None);
        };
        let closed = loan.returned(ReturnedAt::now());
        store.loans.insert(loan_id, closed.clone());
        Ok(Some(closed))
    }

    async fn retire_history(
        &self,
        con: &mut InMemoryConnection,
        book_id: &BookId,
    ) -> error_stack::Result<u64, KernelError> {
        con.trip(FaultPoint::RetireHistory)?;
        let loans = &mut con.working.loans;
        let before = loans.len();
        loans.retain(|_, loan| loan.book_id() != book_id);
        Ok((before - loans.len()) as u64)
    }
}

impl DependOnBookQuery for InMemoryDatabase {
    type BookQuery = InMemoryBookRepository;
    fn book_query(&self) -> &Self::BookQuery {
        &InMemoryBookRepository
    }
}

impl DependOnBookModifier for InMemoryDatabase {
    type BookModifier = InMemoryBookRepository;
    fn book_modifier(&self) -> &Self::BookModifier {
        &InMemoryBookRepository
    }
}

impl DependOnInventoryLedger for InMemoryDatabase {
    type InventoryLedger = InMemoryBookRepository;
    fn inventory_ledger(&self) -> &Self::InventoryLedger {
        &InMemoryBookRepository
    }
}

impl DependOnLoanQuery for InMemoryDatabase {
    type LoanQuery = InMemoryLoanRepository;
    fn loan_query(&self) -> &Self::LoanQuery {
        &InMemoryLoanRepository
    }
}

impl DependOnLoanTracker for InMemoryDatabase {
    type LoanTracker = InMemoryLoanRepository;
    fn loan_tracker(&self) -> &Self::LoanTracker {
        &InMemoryLoanRepository
    }
}
