//! Logging setup utilities for the Kairan chat broker and server.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Crates whose log output is enabled by default.
const WORKSPACE_CRATES: [&str; 3] = ["kairan_shared", "kairan_broker", "kairan_server"];

/// Build the default filter directive used when `RUST_LOG` is not set.
///
/// Every workspace crate and the running binary log at `default_log_level`.
/// HTTP request spans from `tower_http` are logged at the same level.
pub fn default_filter(binary_name: &str, default_log_level: &str) -> String {
    let binary_target = binary_name.replace('-', "_");

    WORKSPACE_CRATES
        .iter()
        .copied()
        .chain([binary_target.as_str(), "tower_http"])
        .map(|target| format!("{}={}", target, default_log_level))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialize the tracing subscriber with the specified default log level.
///
/// The log level can be overridden using the `RUST_LOG` environment variable.
///
/// # Arguments
///
/// * `binary_name` - The name of the binary (e.g., "kairan-server")
/// * `default_log_level` - The default log level (e.g., "debug", "info", "warn", "error")
///
/// # Examples
///
/// ```no_run
/// use kairan_shared::logger::setup_logger;
///
/// setup_logger("kairan-server", "debug");
/// ```
pub fn setup_logger(binary_name: &str, default_log_level: &str) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(binary_name, default_log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Install a subscriber that writes through the test harness.
///
/// Safe to call from every test: only the first call installs anything.
pub fn setup_test_logger() {
    let _ = tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter("test", "debug").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_covers_workspace_and_binary() {
        // テスト項目: ワークスペースの全クレートとバイナリがフィルタに含まれる
        // given (前提条件):
        let binary_name = "kairan-server";

        // when (操作):
        let filter = default_filter(binary_name, "info");

        // then (期待する結果):
        assert!(filter.contains("kairan_broker=info"));
        assert!(filter.contains("kairan_server=info"));
        assert!(filter.contains("kairan_shared=info"));
        assert!(filter.contains("tower_http=info"));
        // バイナリ名のハイフンはアンダースコアに変換される
        assert!(!filter.contains("kairan-server"));
    }

    #[test]
    fn test_default_filter_is_parseable() {
        // テスト項目: 生成したフィルタ文字列が EnvFilter として解釈できる
        // given (前提条件):
        let filter = default_filter("server", "debug");

        // when (操作):
        let parsed = EnvFilter::try_new(&filter);

        // then (期待する結果):
        assert!(parsed.is_ok());
    }
}
