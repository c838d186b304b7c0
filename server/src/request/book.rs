use crate::controller::Intake;
use application::transfer::{
    CreateBookDto, DeleteBookDto, GetBookDto, GetLoansFromBookIdDto, UpdateBookDto,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreateBookRequest {
    title: String,
    #[serde(default)]
    author: String,
    stock: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBookRequest {
    title: Option<String>,
    author: Option<String>,
    stock: Option<i32>,
}

#[derive(Debug)]
pub struct GetBookRequest {
    id: i32,
}

impl GetBookRequest {
    pub fn new(id: i32) -> Self {
        Self { id }
    }
}

#[derive(Debug)]
pub struct DeleteBookRequest {
    id: i32,
}

impl DeleteBookRequest {
    pub fn new(id: i32) -> Self {
        Self { id }
    }
}

#[derive(Debug)]
pub struct GetLoansRequest {
    book_id: i32,
}

impl GetLoansRequest {
    pub fn new(book_id: i32) -> Self {
        Self { book_id }
    }
}

pub struct BookTransformer;

impl Intake<CreateBookRequest> for BookTransformer {
    type To = CreateBookDto;
    fn emit(&self, input: CreateBookRequest) -> Self::To {
        CreateBookDto {
            title: input.title,
            author: input.author,
            stock: input.stock,
        }
    }
}

impl Intake<(i32, UpdateBookRequest)> for BookTransformer {
    type To = UpdateBookDto;
    fn emit(&self, input: (i32, UpdateBookRequest)) -> Self::To {
        let (id, input) = input;
        UpdateBookDto {
            id,
            title: input.title,
            author: input.author,
            stock: input.stock,
        }
    }
}

impl Intake<GetBookRequest> for BookTransformer {
    type To = GetBookDto;
    fn emit(&self, input: GetBookRequest) -> Self::To {
        GetBookDto { id: input.id }
    }
}

impl Intake<DeleteBookRequest> for BookTransformer {
    type To = DeleteBookDto;
    fn emit(&self, input: DeleteBookRequest) -> Self::To {
        DeleteBookDto { id: input.id }
    }
}

impl Intake<GetLoansRequest> for BookTransformer {
    type To = GetLoansFromBookIdDto;
    fn emit(&self, input: GetLoansRequest) -> Self::To {
        GetLoansFromBookIdDto {
            book_id: input.book_id,
        }
    }
}
