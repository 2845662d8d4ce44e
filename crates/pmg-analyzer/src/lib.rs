//! The malware analyzer (C5): query/active-scan modes against the external analysis
//! service, and the per-run verdict cache shared by guard aggregation and proxy
//! interception alike.

pub mod cache;
pub mod client;
pub mod error;

pub use cache::VerdictCache;
pub use client::{AnalysisMode, AnalyzerClient};
pub use error::{AnalyzerError, AnalyzerResult};
