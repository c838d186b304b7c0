use serde::{Deserialize, Serialize};
use vodca::{AsRefln, Fromln};

/// Copies currently on the shelf. Lent copies are not counted.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize, Fromln, AsRefln)]
pub struct BookStock(i32);

impl BookStock {
    pub fn new(stock: impl Into<i32>) -> Self {
        Self(stock.into())
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn is_available(&self) -> bool {
        self.0 > 0
    }
}
