pub mod delete;
pub mod discover;
pub mod kinds;
pub mod validate;
