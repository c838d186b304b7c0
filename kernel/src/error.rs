use std::fmt::Display;

use error_stack::Context;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum KernelError {
    NotFound,
    OutOfStockOrNotFound,
    NoActiveLoan,
    DuplicateTitle,
    InvalidInput,
    StoreUnavailable,
    Internal,
}

impl Display for KernelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KernelError::NotFound => write!(f, "Book not found"),
            KernelError::OutOfStockOrNotFound => write!(f, "Book is out of stock or not found"),
            KernelError::NoActiveLoan => write!(f, "Book has no active loan"),
            KernelError::DuplicateTitle => write!(f, "Book title already exists"),
            KernelError::InvalidInput => write!(f, "Invalid input"),
            KernelError::StoreUnavailable => write!(f, "Store unavailable"),
            KernelError::Internal => write!(f, "Internal kernel error"),
        }
    }
}

impl Context for KernelError {}
