//! # User Service
//!
//! Registration and profile lookups. `user:<id>` is cached; lookups by email
//! always hit the store.

mod usecase;

pub use usecase::UserUsecase;
