use slog::{Drain, Logger};

/// Terminal logger filtered by `RUST_LOG`.
pub fn init_logger() -> Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_envlogger::new(drain).fuse();
    let drain = slog_async::Async::new(drain).chan_size(0x2000).build().fuse();
    Logger::root(drain, slog::o!())
}

/// Logger that drops everything, for tests and library callers that do not
/// care.
pub fn discard() -> Logger {
    Logger::root(slog::Discard, slog::o!())
}
