//! Diagnostic reporting channel.
//!
//! Every failed validation in the graphics layer ends up here instead of
//! unwinding through return values. The layer itself only ever hands back a
//! sentinel (`Invalid` handle, `false`, `None`); the human readable reason goes
//! through the installed [`DiagnosticSink`].
//!
//! # Routing
//!
//! ```text
//!   verify!(cond, "...")  ──►  dispatch()
//!                                 │
//!                 ┌───────────────┴────────────────┐
//!        catcher active on thread?          no catcher
//!                 │                                │
//!                 ▼                                ▼
//!     DiagnosticCatcher (tests)        global DiagnosticSink (LogSink by default)
//! ```
//!
//! # Example
//!
//! ```
//! use verglas_core::diagnostics::DiagnosticCatcher;
//! use verglas_core::verify;
//!
//! let catcher = DiagnosticCatcher::new();
//! let size = 0u64;
//! if !verify!(size > 0, "buffer size must not be zero") {
//!     // return a sentinel here
//! }
//! catcher.expect_count(1);
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Recoverable, the call still did something sensible.
    Warning,
    /// The call failed and returned a sentinel.
    Error,
    /// The device or the layer state is no longer usable.
    Fatal,
}

/// A single diagnostic message with its source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub file: &'static str,
    pub line: u32,
    pub module: &'static str,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        message: String,
        file: &'static str,
        line: u32,
        module: &'static str,
    ) -> Self {
        Self {
            severity,
            message,
            file,
            line,
            module,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:?}] {} ({}:{} in {})",
            self.severity, self.message, self.file, self.line, self.module
        )
    }
}

/// Receiver for diagnostics that are not intercepted by a [`DiagnosticCatcher`].
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diagnostic: &Diagnostic);
}

/// Default sink: forwards everything to the `log` facade.
#[derive(Debug, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&self, diagnostic: &Diagnostic) {
        let level = match diagnostic.severity {
            Severity::Warning => log::Level::Warn,
            Severity::Error | Severity::Fatal => log::Level::Error,
        };
        log::log!(
            target: diagnostic.module,
            level,
            "{} ({}:{})",
            diagnostic.message,
            diagnostic.file,
            diagnostic.line
        );
    }
}

static SINK: RwLock<Option<Arc<dyn DiagnosticSink>>> = parking_lot::const_rwlock(None);
static PANIC_ON_ERROR: AtomicBool = AtomicBool::new(false);

thread_local! {
    static CATCHERS: RefCell<Vec<Rc<RefCell<Vec<Diagnostic>>>>> = const { RefCell::new(Vec::new()) };
}

/// Install a process-wide sink. Replaces the previous one.
pub fn set_sink(sink: Arc<dyn DiagnosticSink>) {
    *SINK.write() = Some(sink);
}

/// Restore the default [`LogSink`].
pub fn reset_sink() {
    *SINK.write() = None;
}

/// When enabled, `Error` and `Fatal` diagnostics that reach the global sink
/// panic after being reported. Caught diagnostics never panic.
pub fn set_panic_on_error(enabled: bool) {
    PANIC_ON_ERROR.store(enabled, Ordering::Relaxed);
}

/// Deliver a diagnostic to the innermost catcher of this thread, or to the
/// global sink.
pub fn dispatch(diagnostic: Diagnostic) {
    let caught = CATCHERS.with(|catchers| {
        if let Some(catcher) = catchers.borrow().last() {
            catcher.borrow_mut().push(diagnostic.clone());
            true
        } else {
            false
        }
    });
    if caught {
        return;
    }

    match SINK.read().as_ref() {
        Some(sink) => sink.report(&diagnostic),
        None => LogSink.report(&diagnostic),
    }

    if diagnostic.severity >= Severity::Error && PANIC_ON_ERROR.load(Ordering::Relaxed) {
        panic!("{diagnostic}");
    }
}

/// Scoped interceptor for the current thread.
///
/// While alive, every diagnostic dispatched on this thread is stored in the
/// catcher instead of reaching the global sink. Catchers nest; the innermost
/// one wins.
pub struct DiagnosticCatcher {
    caught: Rc<RefCell<Vec<Diagnostic>>>,
}

impl DiagnosticCatcher {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let caught = Rc::new(RefCell::new(Vec::new()));
        CATCHERS.with(|catchers| catchers.borrow_mut().push(caught.clone()));
        Self { caught }
    }

    pub fn count(&self) -> usize {
        self.caught.borrow().len()
    }

    pub fn messages(&self) -> Vec<Diagnostic> {
        self.caught.borrow().clone()
    }

    pub fn last_message(&self) -> Option<String> {
        self.caught.borrow().last().map(|d| d.message.clone())
    }

    pub fn clear(&self) {
        self.caught.borrow_mut().clear();
    }

    /// Assert the exact number of diagnostics caught so far.
    #[track_caller]
    pub fn expect_count(&self, expected: usize) {
        let caught = self.caught.borrow();
        assert_eq!(
            caught.len(),
            expected,
            "unexpected diagnostic count, caught: {:#?}",
            caught.iter().map(|d| d.message.as_str()).collect::<Vec<_>>()
        );
    }

    #[track_caller]
    pub fn expect_none(&self) {
        self.expect_count(0);
    }
}

impl Drop for DiagnosticCatcher {
    fn drop(&mut self) {
        CATCHERS.with(|catchers| {
            let mut catchers = catchers.borrow_mut();
            if let Some(position) = catchers.iter().rposition(|c| Rc::ptr_eq(c, &self.caught)) {
                catchers.remove(position);
            }
        });
    }
}

/// Report a diagnostic with an explicit severity.
#[macro_export]
macro_rules! report {
    ($severity:expr, $($arg:tt)+) => {
        $crate::diagnostics::dispatch($crate::diagnostics::Diagnostic::new(
            $severity,
            format!($($arg)+),
            file!(),
            line!(),
            module_path!(),
        ))
    };
}

/// Report an `Error` diagnostic.
#[macro_export]
macro_rules! report_error {
    ($($arg:tt)+) => {
        $crate::report!($crate::diagnostics::Severity::Error, $($arg)+)
    };
}

/// Report a `Warning` diagnostic.
#[macro_export]
macro_rules! report_warning {
    ($($arg:tt)+) => {
        $crate::report!($crate::diagnostics::Severity::Warning, $($arg)+)
    };
}

/// Evaluate a condition; on failure report an `Error` diagnostic.
///
/// Evaluates to the condition so it can guard an early return.
#[macro_export]
macro_rules! verify {
    ($cond:expr) => {
        $crate::verify!($cond, "verification failed: {}", stringify!($cond))
    };
    ($cond:expr, $($arg:tt)+) => {{
        let ok: bool = $cond;
        if !ok {
            $crate::report_error!($($arg)+);
        }
        ok
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_catcher_intercepts() {
        let catcher = DiagnosticCatcher::new();
        crate::report_error!("first {}", 1);
        crate::report_warning!("second");
        catcher.expect_count(2);
        assert_eq!(catcher.messages()[0].message, "first 1");
        assert_eq!(catcher.messages()[1].severity, Severity::Warning);
    }

    #[test]
    fn test_verify_returns_condition() {
        let catcher = DiagnosticCatcher::new();
        assert!(crate::verify!(1 + 1 == 2));
        catcher.expect_none();
        assert!(!crate::verify!(1 + 1 == 3, "math is broken"));
        catcher.expect_count(1);
        assert_eq!(catcher.last_message().as_deref(), Some("math is broken"));
    }

    #[test]
    fn test_verify_default_message() {
        let catcher = DiagnosticCatcher::new();
        let value = 3;
        crate::verify!(value < 2);
        assert!(catcher.messages()[0].message.contains("value < 2"));
    }

    #[test]
    fn test_nested_catchers() {
        let outer = DiagnosticCatcher::new();
        {
            let inner = DiagnosticCatcher::new();
            crate::report_error!("inner");
            inner.expect_count(1);
        }
        crate::report_error!("outer");
        outer.expect_count(1);
        assert_eq!(outer.last_message().as_deref(), Some("outer"));
    }

    #[test]
    fn test_catcher_is_thread_local() {
        let catcher = DiagnosticCatcher::new();
        std::thread::spawn(|| {
            let other = DiagnosticCatcher::new();
            crate::report_error!("other thread");
            other.expect_count(1);
        })
        .join()
        .unwrap();
        catcher.expect_none();
    }

    #[test]
    fn test_diagnostic_location() {
        let catcher = DiagnosticCatcher::new();
        crate::report_error!("located");
        let diagnostic = &catcher.messages()[0];
        assert!(diagnostic.file.ends_with("diagnostics.rs"));
        assert!(diagnostic.line > 0);
        assert!(diagnostic.module.contains("diagnostics"));
        assert!(diagnostic.to_string().contains("located"));
    }

    struct CountingSink(AtomicUsize);

    impl DiagnosticSink for CountingSink {
        fn report(&self, _diagnostic: &Diagnostic) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_custom_sink_receives_uncaught() {
        // Runs on its own thread so no catcher from this test binary is active.
        let sink = Arc::new(CountingSink(AtomicUsize::new(0)));
        set_sink(sink.clone());
        std::thread::spawn(|| crate::report_warning!("to the sink"))
            .join()
            .unwrap();
        reset_sink();
        assert!(sink.0.load(Ordering::Relaxed) >= 1);
    }
}
