//! # Kernel Console Output
//!
//! Logging and trace output for the simulated kernel. The crate is the only
//! place that knows where diagnostic text ends up; everything else logs
//! through the [`log`] facade.
//!
//! ## Output Path
//!
//! ```text
//! log::info!(..)           console_trace!(..)
//!        ↓                         ↓
//! ConsoleLogger (log::Log)         ↓
//!        ↓                         ↓
//!        └──────→ console_fmt::console_write
//!                          ↓
//!                 host stderr (locked per record)
//! ```
//!
//! ## Features
//!
//! * `enabled` (default): records and traces are written to the host's
//!   standard error. Requires `std`.
//! * Without `enabled` the crate is `no_std` and every write is a no-op, so
//!   kernels built for tests without output pay nothing.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use kernel_console::ConsoleLogger;
//! use log::{LevelFilter, info};
//!
//! ConsoleLogger::new(LevelFilter::Debug).init().expect("logger initialization");
//! info!("kernel started");
//! ```

#![cfg_attr(not(feature = "enabled"), no_std)]

mod logger;

pub use logger::ConsoleLogger;

#[cfg(feature = "enabled")]
#[doc(hidden)]
pub mod console_fmt {
    use std::fmt;
    use std::io::Write;

    #[doc(hidden)]
    #[inline]
    pub fn console_write(args: fmt::Arguments) {
        // Best effort; a closed stderr must not take the kernel down.
        let _ = std::io::stderr().lock().write_fmt(args);
    }
}

#[cfg(not(feature = "enabled"))]
#[doc(hidden)]
pub mod console_fmt {
    use core::fmt;

    #[doc(hidden)]
    #[inline(always)]
    #[allow(clippy::inline_always)]
    pub fn console_write(_: fmt::Arguments) {
        // no-op when feature disabled
    }
}

/// Write formatted text straight to the console, bypassing log filtering.
#[macro_export]
macro_rules! console_trace {
    ($($arg:tt)*) => {{
        $crate::console_fmt::console_write(core::format_args!($($arg)*));
    }};
}
