//! Quality Gate Engine.
//!
//! Evaluates a draft against five independent rule categories and folds the
//! results into one [`GateStatus`](seoflow_core::GateStatus): any
//! fail-severity issue anywhere fails the draft; otherwise any warning warns
//! it; otherwise it passes. Evaluation is pure and infallible.

mod antispam;
mod category;
mod content;
mod context;
mod evaluate;
mod image;
mod technical;
mod text;
mod ux;

pub mod thresholds;

pub use context::GateContext;
pub use evaluate::{aggregate, evaluate};
