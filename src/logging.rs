//! Tracing macros for the three kinds of event this crate emits: lines
//! arriving from a client, replies going back, and everything else.

use tracing_subscriber::EnvFilter;

/// One line received from a client, tagged with the peer it came from.
#[macro_export]
macro_rules! incoming {
    ($peer:expr, $line:expr) => {
        $crate::tracing::trace!(target: "mailsink::session", peer = %$peer, ">>> {}", $line)
    };
}

/// One reply written to a client.
#[macro_export]
macro_rules! outgoing {
    ($peer:expr, $line:expr) => {
        $crate::tracing::trace!(target: "mailsink::session", peer = %$peer, "<<< {}", $line)
    };
}

/// Server-side events that are not protocol traffic.
#[macro_export]
macro_rules! internal {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::tracing::event!(
            target: "mailsink::server",
            $crate::tracing::Level::$level,
            $($msg),*
        )
    };

    ($($msg:expr),*) => {
        $crate::internal!(level = TRACE, $($msg),*)
    };
}

/// Installs the global subscriber. `MAILSINK_LOG` takes any tracing filter
/// directive; without it, debug builds trace and release builds stay at
/// info.
pub fn init() {
    let default = if cfg!(debug_assertions) {
        "mailsink=trace"
    } else {
        "mailsink=info"
    };

    let filter =
        EnvFilter::try_from_env("MAILSINK_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .compact()
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
        .with_env_filter(filter)
        .init();
}
