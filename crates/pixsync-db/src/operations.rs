//! Database CRUD operations.

pub mod records;
