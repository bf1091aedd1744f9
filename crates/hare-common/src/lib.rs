//! Shared types for the HareScript compiler: source positions, user
//! diagnostics, and the internal-fault signal.

pub mod error;
pub mod position;

pub use error::{Diagnostic, Diagnostics, ErrorKind, Severity};
pub use position::{LineIndex, Position};

#[doc(hidden)]
pub use tracing;

/// Abort compilation of the current unit on a broken contract between
/// passes.
///
/// An internal fault means an earlier pass let through something it
/// promised to reject; it is a compiler bug, never a user error, so it is
/// not recorded as a diagnostic.
#[macro_export]
macro_rules! ice {
    ($($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::tracing::error!(%message, "internal compiler error");
        panic!("internal compiler error: {}", message)
    }};
}
