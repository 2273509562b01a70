/// Like `tracing::info!`, but can also report the time elapsed since a starting instant.
/// Pass in a `chrono::DateTime<Local>` as the first argument to get the runtime in seconds.
/// ```
/// use bookscrap::info_time;
/// use chrono::Local;
///
/// info_time!("str {}, {}", 1, 2);
/// let time = Local::now();
/// info_time!(time, "str {}, {}", 1, 2);
/// ```
#[macro_export]
macro_rules! info_time {
    ($strfm:literal $(,)? $($arg:expr),*) => {{
        ::tracing::info!("{}", format!($strfm, $($arg),*));
    }};
    ($time:expr, $strfm:literal $(,)? $($arg:expr),*) => {{
        let run_time = (::chrono::Local::now() - $time)
            .num_microseconds()
            .map(|n| n as f64 / 1_000_000.0)
            .unwrap_or(0.0);
        ::tracing::info!(runtime_secs = run_time, "{}", format!($strfm, $($arg),*));
    }};
}
