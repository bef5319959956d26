//! HTTP request handlers
//!
//! Handlers stay thin: extract, call the storage or core module, shape the
//! JSON. Every failure travels as an `AppError` and is rendered by its
//! `IntoResponse` impl.

pub mod catalog;
pub mod links;
pub mod recipes;
pub mod users;

use crate::model::Page;

/// Wraps one page of results in the list envelope.
pub(crate) fn page<T>(page: usize, limit: usize, count: usize, results: Vec<T>) -> Page<T> {
    Page {
        page,
        limit,
        count,
        results,
    }
}
