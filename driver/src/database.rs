#[cfg(feature = "in-memory")]
mod memory;
mod postgres;

#[cfg(feature = "in-memory")]
pub use self::memory::*;
pub use self::postgres::*;
