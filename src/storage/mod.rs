pub mod cache;
pub mod db;
pub mod error;
pub mod fs;
pub mod index;
pub(crate) mod schema;
