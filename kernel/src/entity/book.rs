mod author;
mod id;
mod stock;
mod title;

pub use self::{author::*, id::*, stock::*, title::*};
use destructure::Destructure;
use vodca::References;

#[derive(Debug, Clone, Eq, PartialEq, References, Destructure)]
pub struct Book {
    id: BookId,
    title: BookTitle,
    author: BookAuthor,
    stock: BookStock,
}

impl Book {
    pub fn new(id: BookId, title: BookTitle, author: BookAuthor, stock: BookStock) -> Self {
        Self {
            id,
            title,
            author,
            stock,
        }
    }
}

/// A catalog entry that has not been stored yet. The store assigns its id.
#[derive(Debug, Clone, Eq, PartialEq, References, Destructure)]
pub struct NewBook {
    title: BookTitle,
    author: BookAuthor,
    stock: BookStock,
}

impl NewBook {
    pub fn new(title: BookTitle, author: BookAuthor, stock: BookStock) -> Self {
        Self {
            title,
            author,
            stock,
        }
    }

    pub fn into_book(self, id: BookId) -> Book {
        Book::new(id, self.title, self.author, self.stock)
    }
}

/// Partial catalog update. Fields left as `None` keep their stored value.
#[derive(Debug, Clone, Default, Eq, PartialEq, References, Destructure)]
pub struct BookPatch {
    title: Option<BookTitle>,
    author: Option<BookAuthor>,
    stock: Option<BookStock>,
}

impl BookPatch {
    pub fn new(
        title: Option<BookTitle>,
        author: Option<BookAuthor>,
        stock: Option<BookStock>,
    ) -> Self {
        Self {
            title,
            author,
            stock,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.author.is_none() && self.stock.is_none()
    }

    pub fn apply(&self, book: Book) -> Book {
        book.reconstruct(|book| {
            if let Some(title) = &self.title {
                book.title = title.clone();
            }
            if let Some(author) = &self.author {
                book.author = author.clone();
            }
            if let Some(stock) = &self.stock {
                book.stock = *stock;
            }
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn dune() -> Book {
        Book::new(
            BookId::new(1),
            BookTitle::new("Dune"),
            BookAuthor::new("Frank Herbert"),
            BookStock::new(2),
        )
    }

    #[test]
    fn patch_keeps_unset_fields() {
        let patch = BookPatch::new(None, None, Some(BookStock::new(5)));
        let book = patch.apply(dune());
        assert_eq!(book.title(), &BookTitle::new("Dune"));
        assert_eq!(book.author(), &BookAuthor::new("Frank Herbert"));
        assert_eq!(book.stock(), &BookStock::new(5));
    }

    #[test]
    fn empty_patch_is_noop() {
        let patch = BookPatch::default();
        assert!(patch.is_empty());
        assert_eq!(patch.apply(dune()), dune());
    }
}
