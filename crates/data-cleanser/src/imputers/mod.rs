//! Imputation module for handling missing values.
//!
//! Numeric, text and datetime columns each get their own fill policy; see
//! [`MissingStrategy`](crate::config::MissingStrategy).

mod statistical;

pub use statistical::MissingDataResolver;
