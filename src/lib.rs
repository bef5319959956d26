//! Library exports for the recipe sharing service
//!
//! The two cores are [`aggregator`], which merges cart recipes into a
//! shopping list, and [`shortener`], which hands out stable short links.
//! Everything else is storage and HTTP plumbing around them.

pub mod aggregator;
pub mod catalog;
pub mod config;
pub mod database;
pub mod error;
pub mod extract;
pub mod handler;
pub mod import;
pub mod link_store;
pub mod middleware;
pub mod model;
pub mod recipes;
pub mod relations;
pub mod route;
pub mod shortener;
