//! Prometheus metrics (§4.L). One registry, created once at startup;
//! `GET /metrics` renders it in the text exposition format.

use prometheus::{IntCounterVec, Opts, Registry};

pub struct Metrics {
    pub registry: Registry,
    pub llm_calls_total: IntCounterVec,
    pub llm_calls_failures_total: IntCounterVec,
    pub llm_calls_validation_errors_total: IntCounterVec,
    pub llm_token_sent_total: IntCounterVec,
    pub llm_token_received_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let llm_calls_total = IntCounterVec::new(
            Opts::new("llm_calls_total", "Total LLM calls made"),
            &["provider", "model"],
        )
        .expect("static metric definition");
        let llm_calls_failures_total = IntCounterVec::new(
            Opts::new("llm_calls_failures_total", "Total failed LLM calls"),
            &["provider", "model"],
        )
        .expect("static metric definition");
        let llm_calls_validation_errors_total = IntCounterVec::new(
            Opts::new(
                "llm_calls_validation_errors_total",
                "Total LLM calls rejected by a shield/validator",
            ),
            &["provider", "model"],
        )
        .expect("static metric definition");
        let llm_token_sent_total = IntCounterVec::new(
            Opts::new("llm_token_sent_total", "Total input tokens sent to the upstream"),
            &["provider", "model"],
        )
        .expect("static metric definition");
        let llm_token_received_total = IntCounterVec::new(
            Opts::new("llm_token_received_total", "Total output tokens received from the upstream"),
            &["provider", "model"],
        )
        .expect("static metric definition");

        for collector in [
            &llm_calls_total,
            &llm_calls_failures_total,
            &llm_calls_validation_errors_total,
            &llm_token_sent_total,
            &llm_token_received_total,
        ] {
            registry
                .register(Box::new(collector.clone()))
                .expect("metric registered exactly once");
        }

        Self {
            registry,
            llm_calls_total,
            llm_calls_failures_total,
            llm_calls_validation_errors_total,
            llm_token_sent_total,
            llm_token_received_total,
        }
    }

    pub fn record_call(&self, provider: &str, model: &str, input_tokens: u64, output_tokens: u64) {
        self.llm_calls_total.with_label_values(&[provider, model]).inc();
        self.llm_token_sent_total
            .with_label_values(&[provider, model])
            .inc_by(input_tokens);
        self.llm_token_received_total
            .with_label_values(&[provider, model])
            .inc_by(output_tokens);
    }

    pub fn record_failure(&self, provider: &str, model: &str) {
        self.llm_calls_failures_total.with_label_values(&[provider, model]).inc();
    }

    pub fn record_validation_error(&self, provider: &str, model: &str) {
        self.llm_calls_validation_errors_total
            .with_label_values(&[provider, model])
            .inc();
    }

    pub fn render(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .expect("text encoding never fails for well-formed counters");
        String::from_utf8(buffer).expect("prometheus text encoding is always valid utf-8")
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_scrape_renders_zeroed_counters() {
        let metrics = Metrics::new();
        let text = metrics.render();
        assert!(text.contains("llm_calls_total"));
    }

    #[test]
    fn record_call_increments_labeled_series() {
        let metrics = Metrics::new();
        metrics.record_call("openai", "gpt-4o", 10, 20);
        let text = metrics.render();
        assert!(text.contains("llm_token_sent_total"));
        assert!(text.contains("llm_token_received_total"));
    }
}
