//! Tests for configuration

#[cfg(test)]
mod tests {
    use super::super::config::*;
    use super::super::types::{OrderKind, TransportChannel};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    #[test]
    fn test_benchmark_config_default() {
        let config = BenchmarkConfig::default();
        assert_eq!(config.symbol, "BTC");
        assert_eq!(config.order_kind, OrderKind::Market);
        assert_eq!(config.transport, TransportChannel::RequestResponse);
        assert_eq!(config.order_size, dec!(0.001));
        assert_eq!(config.order_count, 10);
        assert_eq!(config.inter_order_delay_ms, 1000);
        assert_eq!(config.order_timeout_ms, 10_000);
        assert_eq!(config.price_offset, dec!(0.01));
        assert_eq!(config.cancel_delay_ms, 500);
        assert_eq!(config.max_retry_attempts, 3);
        assert_eq!(config.retry_base_delay_ms, 250);
    }

    #[test]
    fn test_empty_toml_parses_to_defaults() {
        let config: BenchmarkConfig = toml::from_str("").unwrap();
        assert_eq!(config.symbol, "BTC");
        assert_eq!(config.order_count, 10);
    }

    #[test]
    fn test_partial_toml_overrides_defaults() {
        let toml_str = r#"
symbol = "ETH"
order_kind = "postOnly"
order_count = 25
cancel_delay_ms = 100
"#;
        let config: BenchmarkConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.symbol, "ETH");
        assert_eq!(config.order_kind, OrderKind::PostOnly);
        assert_eq!(config.order_count, 25);
        assert_eq!(config.cancel_delay_ms, 100);
        // Untouched fields keep defaults
        assert_eq!(config.order_timeout_ms, 10_000);
    }

    #[test]
    fn test_duration_accessors() {
        let config = BenchmarkConfig {
            inter_order_delay_ms: 1500,
            order_timeout_ms: 7000,
            cancel_delay_ms: 300,
            retry_base_delay_ms: 125,
            ..BenchmarkConfig::default()
        };
        assert_eq!(config.inter_order_delay(), Duration::from_millis(1500));
        assert_eq!(config.order_timeout(), Duration::from_millis(7000));
        assert_eq!(config.cancel_delay(), Duration::from_millis(300));
        assert_eq!(config.retry_base_delay(), Duration::from_millis(125));
    }

    #[test]
    fn test_builder_explicit_overrides_win() {
        let config = BenchmarkConfig::builder()
            .set("symbol", "SOL")
            .set("order_count", "3")
            .set("transport", "push")
            .build()
            .unwrap();
        assert_eq!(config.symbol, "SOL");
        assert_eq!(config.order_count, 3);
        assert_eq!(config.transport, TransportChannel::Push);
    }

    #[test]
    fn test_builder_missing_file_is_not_an_error() {
        let config = BenchmarkConfig::builder()
            .file("does-not-exist")
            .build()
            .unwrap();
        assert_eq!(config.symbol, "BTC");
    }
}
