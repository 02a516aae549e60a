//! Personal betting ledger.
//!
//! The [`ledger`] module is the engine: odds conversion, the bet log with its
//! derived bankroll history, and period performance metrics. [`db`] and
//! [`api`] are the collaborators the binary wires around it.

pub mod api;
pub mod config;
pub mod db;
pub mod ledger;
