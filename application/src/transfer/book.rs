use kernel::prelude::entity::{Book, DestructBook};

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BookDto {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub stock: i32,
}

impl From<Book> for BookDto {
    fn from(value: Book) -> Self {
        let DestructBook {
            id,
            title,
            author,
            stock,
        } = value.into_destruct();
        Self {
            id: id.into(),
            title: title.into(),
            author: author.into(),
            stock: stock.into(),
        }
    }
}

pub struct GetBookDto {
    pub id: i32,
}

pub struct CreateBookDto {
    pub title: String,
    pub author: String,
    pub stock: i32,
}

pub struct UpdateBookDto {
    pub id: i32,
    pub title: Option<String>,
    pub author: Option<String>,
    pub stock: Option<i32>,
}

pub struct DeleteBookDto {
    pub id: i32,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DeletedBookDto {
    pub id: i32,
    pub retired_loans: u64,
}
