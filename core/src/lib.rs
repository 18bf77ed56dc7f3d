//! # Verglas Core
//!
//! Building blocks shared by the Verglas graphics layer: the generational
//! handle pool, the diagnostic channel and the profiling macros.

pub mod diagnostics;
pub mod pool;
pub mod profiling;

pub use diagnostics::{Diagnostic, DiagnosticCatcher, DiagnosticSink, Severity};
pub use pool::{GenHandle, GenerationalPool};

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
