//! Command line plumbing shared by the binaries in this workspace.

pub use clap;
pub use clap_verbosity_flag as verbose;

/// Colours used by every `--help` page in the workspace.
pub fn get_styles() -> clap::builder::Styles {
    use clap::builder::styling::{AnsiColor, Effects, Styles};

    Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Cyan.on_default())
        .error(AnsiColor::Red.on_default() | Effects::BOLD)
        .valid(AnsiColor::Green.on_default())
        .invalid(AnsiColor::Red.on_default())
}

/// Map the `-v`/`-q` count to a tracing level.
///
/// The default verbosity (errors only) still lets warnings through; every
/// extra `-v` opens one more level.
pub fn verbose_level_to_trace(level: Option<verbose::Level>) -> &'static tracing::Level {
    match level {
        Some(verbose::Level::Error) => &tracing::Level::WARN,
        Some(verbose::Level::Warn) => &tracing::Level::INFO,
        Some(verbose::Level::Info) => &tracing::Level::DEBUG,
        Some(verbose::Level::Debug) => &tracing::Level::TRACE,
        Some(verbose::Level::Trace) => &tracing::Level::TRACE,
        None => &tracing::Level::ERROR,
    }
}

/// Install the global tracing subscriber.
///
/// Logs go to stderr in the compact human format, or as JSON lines into
/// `log_file` when one is given. Calling this twice keeps the first
/// subscriber.
pub fn logging_setup<W>(level: &tracing::Level, log_file: Option<W>)
where
    W: std::io::Write + Send + 'static,
{
    let builder = tracing_subscriber::fmt()
        .with_max_level(*level)
        .with_target(false);

    let result = match log_file {
        Some(file) => builder
            .json()
            .with_writer(std::sync::Mutex::new(file))
            .try_init(),
        None => builder
            .without_time()
            .with_writer(std::io::stderr)
            .try_init(),
    };

    if let Err(err) = result {
        tracing::debug!("logging already initialized: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_mapping_is_monotone() {
        let levels = [
            None,
            Some(verbose::Level::Error),
            Some(verbose::Level::Warn),
            Some(verbose::Level::Info),
            Some(verbose::Level::Debug),
            Some(verbose::Level::Trace),
        ];
        // more verbose tracing levels compare greater
        let mapped: Vec<_> = levels.into_iter().map(verbose_level_to_trace).collect();
        for pair in mapped.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        assert_eq!(mapped[0], &tracing::Level::ERROR);
        assert_eq!(mapped[5], &tracing::Level::TRACE);
    }

    #[test]
    fn json_logs_land_in_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let writer = file.reopen().unwrap();
        logging_setup(&tracing::Level::INFO, Some(writer));
        tracing::info!(answer = 42, "hello from test");

        let content = std::fs::read_to_string(file.path()).unwrap();
        // another test in this binary may have installed the subscriber first
        if !content.is_empty() {
            assert!(content.contains("hello from test"));
            assert!(content.contains("\"answer\":42"));
        }
    }
}
