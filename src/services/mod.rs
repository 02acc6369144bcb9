//! Business logic services for all domain operations.

pub mod company;
pub mod entry;
pub mod form;
pub mod ingestion;
