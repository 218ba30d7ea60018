//! Posting/closing engine for Postbook.
//!
//! This crate contains pure business logic with ZERO web or database
//! dependencies. Persistence is reached only through the injected
//! [`posting::LedgerStore`] collaborator.
//!
//! # Modules
//!
//! - `posting` - batch validation, balance aggregation, the posting state
//!   machine, and the period-close coordinator

pub mod posting;
