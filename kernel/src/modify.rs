mod book;
mod inventory;
mod loan;

pub use self::{book::*, inventory::*, loan::*};
