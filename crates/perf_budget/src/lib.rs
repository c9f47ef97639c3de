//! Performance Budgets
//!
//! This crate holds the pieces of performance measurement that do not depend
//! on where a sample came from:
//! - A read-only budget table mapping metric names to thresholds
//! - Budget violations with severity grading and percentage-over-budget
//! - Budget reports for batch checks
//! - An RAII timer for measuring wall-clock intervals
//!
//! # Example
//!
//! ```rust
//! use perf_budget::BudgetTable;
//!
//! let budgets = BudgetTable::standard();
//! assert!(budgets.check("LCP", 2000.0).is_none());
//!
//! let violation = budgets.check("LCP", 5000.0).unwrap();
//! assert_eq!(violation.percent_over(), 100.0);
//! ```

mod budget;
mod timing;

pub use budget::*;
pub use timing::*;
