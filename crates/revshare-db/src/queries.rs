//! Database query functions organized by domain.

pub mod claims;
pub mod splits;
pub mod transactions;
