//! Core modules for kepfix's repair-and-reconcile pipeline.

pub mod config;
pub mod document;
pub mod error;
pub mod fix;
pub mod history;
pub mod locator;
pub mod output;
pub mod parse;
pub mod reconcile;
pub mod repair;
pub mod schema;
