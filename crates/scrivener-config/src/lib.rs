//! Environment-driven configuration, built once at process start and
//! shared (via `Arc`) by every worker and stage processor.

use std::collections::HashMap;
use std::env;
use std::io::IsTerminal;

use scrivener_types::QueueName;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Per-agent batch sizes for the review sub-scheduler (§4.8), in the order
/// the review queues run: general, style, cohesion, summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewBatchSizes {
    pub general: usize,
    pub style: usize,
    pub cohesion: usize,
    pub summary: usize,
}

impl Default for ReviewBatchSizes {
    fn default() -> Self {
        Self {
            general: 3,
            style: 5,
            cohesion: 5,
            summary: 5,
        }
    }
}

/// Process-wide configuration, assembled once from the environment.
///
/// Every item corresponds to an "Environment inputs" entry: connection
/// strings for the broker/store, table names, the thirteen queue name
/// overrides, and the numeric tunables governing batching, timeouts, and
/// lock renewal. All have the defaults the orchestrator describes.
#[derive(Debug, Clone)]
pub struct Config {
    pub queue_connection_string: String,
    pub blob_connection_string: String,
    pub blob_container: String,
    pub status_table_name: String,
    pub document_index_table_name: String,

    pub request_timeout_secs: u64,
    pub max_section_tokens: u32,
    pub write_batch_size: u32,
    pub review_batch_sizes: ReviewBatchSizes,
    pub review_max_prompt_tokens: u32,
    pub lock_renewal_secs: u64,
    pub streaming: bool,

    /// Per-queue pool size (handler concurrency), default 1 for every queue.
    pub queue_pool_size: u32,

    queue_name_overrides: HashMap<&'static str, String>,
    pub status_topic: String,
    pub status_topic_fallback: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue_connection_string: String::new(),
            blob_connection_string: String::new(),
            blob_container: "aidocwriter".to_string(),
            status_table_name: "jobstatus".to_string(),
            document_index_table_name: "documentindex".to_string(),
            request_timeout_secs: 120,
            max_section_tokens: 2500,
            write_batch_size: 5,
            review_batch_sizes: ReviewBatchSizes::default(),
            review_max_prompt_tokens: 15_000,
            lock_renewal_secs: 900,
            streaming: false,
            queue_pool_size: 1,
            queue_name_overrides: HashMap::new(),
            status_topic: scrivener_types::DEFAULT_STATUS_TOPIC.to_string(),
            status_topic_fallback: scrivener_types::FALLBACK_STATUS_TOPIC.to_string(),
        }
    }
}

impl Config {
    /// Build configuration from `SCRIVENER_*` environment variables,
    /// falling back to the defaults named above for anything unset or
    /// unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = env::var("SCRIVENER_QUEUE_CONNECTION_STRING") {
            config.queue_connection_string = v;
        }
        if let Ok(v) = env::var("SCRIVENER_BLOB_CONNECTION_STRING") {
            config.blob_connection_string = v;
        }
        if let Ok(v) = env::var("SCRIVENER_BLOB_CONTAINER") {
            config.blob_container = v;
        }
        if let Ok(v) = env::var("SCRIVENER_STATUS_TABLE_NAME") {
            config.status_table_name = v;
        }
        if let Ok(v) = env::var("SCRIVENER_DOCUMENT_INDEX_TABLE_NAME") {
            config.document_index_table_name = v;
        }
        if let Ok(v) = env_u64("SCRIVENER_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = v;
        }
        if let Ok(v) = env_u32("SCRIVENER_MAX_SECTION_TOKENS") {
            config.max_section_tokens = v;
        }
        if let Ok(v) = env_u32("SCRIVENER_WRITE_BATCH_SIZE") {
            config.write_batch_size = v;
        }
        if let Ok(v) = env_usize("SCRIVENER_REVIEW_BATCH_GENERAL") {
            config.review_batch_sizes.general = v;
        }
        if let Ok(v) = env_usize("SCRIVENER_REVIEW_BATCH_STYLE") {
            config.review_batch_sizes.style = v;
        }
        if let Ok(v) = env_usize("SCRIVENER_REVIEW_BATCH_COHESION") {
            config.review_batch_sizes.cohesion = v;
        }
        if let Ok(v) = env_usize("SCRIVENER_REVIEW_BATCH_SUMMARY") {
            config.review_batch_sizes.summary = v;
        }
        if let Ok(v) = env_u32("SCRIVENER_REVIEW_MAX_PROMPT_TOKENS") {
            config.review_max_prompt_tokens = v;
        }
        if let Ok(v) = env_u64("SCRIVENER_LOCK_RENEWAL_SECS") {
            config.lock_renewal_secs = v;
        }
        if let Ok(v) = env::var("SCRIVENER_STREAMING") {
            config.streaming = matches!(v.trim(), "1" | "true" | "TRUE" | "yes");
        }
        if let Ok(v) = env_u32("SCRIVENER_QUEUE_POOL_SIZE") {
            config.queue_pool_size = v;
        }
        if let Ok(v) = env::var("SCRIVENER_STATUS_TOPIC") {
            config.status_topic = v;
        }
        if let Ok(v) = env::var("SCRIVENER_STATUS_TOPIC_FALLBACK") {
            config.status_topic_fallback = v;
        }

        for queue in QueueName::ALL {
            let var = format!("SCRIVENER_QUEUE_{}", queue.stage_label());
            if let Ok(v) = env::var(&var) {
                config.queue_name_overrides.insert(queue.as_default_str(), v);
            }
        }

        config
    }

    /// The configured wire name for a queue, or its default.
    #[must_use]
    pub fn queue_name(&self, queue: QueueName) -> &str {
        self.queue_name_overrides
            .get(queue.as_default_str())
            .map(String::as_str)
            .unwrap_or_else(|| queue.as_default_str())
    }

    /// Status topics to try, in order: the configured primary, then the
    /// configured fallback, then both literal defaults — so a deployment
    /// that only overrides the primary still has the two default topics
    /// as a last resort.
    #[must_use]
    pub fn status_topics(&self) -> Vec<String> {
        let mut topics = vec![self.status_topic.clone(), self.status_topic_fallback.clone()];
        for default in [
            scrivener_types::DEFAULT_STATUS_TOPIC,
            scrivener_types::FALLBACK_STATUS_TOPIC,
        ] {
            if !topics.iter().any(|t| t == default) {
                topics.push(default.to_string());
            }
        }
        topics
    }
}

fn env_u64(key: &str) -> Result<u64, ()> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok()).ok_or(())
}

fn env_u32(key: &str) -> Result<u32, ()> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok()).ok_or(())
}

fn env_usize(key: &str) -> Result<usize, ()> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok()).ok_or(())
}

/// Initialize the global `tracing` subscriber.
///
/// Respects `RUST_LOG` if set; otherwise defaults to `scrivener=info,warn`,
/// or `scrivener=debug,info` when `verbose` is set.
pub fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| {
        if verbose {
            EnvFilter::try_new("scrivener=debug,info")
        } else {
            EnvFilter::try_new("scrivener=info,warn")
        }
    })?;

    let ansi = std::io::stdout().is_terminal() && env::var_os("NO_COLOR").is_none();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_ansi(ansi).with_target(true))
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_environment_inputs() {
        let config = Config::default();
        assert_eq!(config.request_timeout_secs, 120);
        assert_eq!(config.max_section_tokens, 2500);
        assert_eq!(config.write_batch_size, 5);
        assert_eq!(config.review_batch_sizes, ReviewBatchSizes {
            general: 3,
            style: 5,
            cohesion: 5,
            summary: 5,
        });
        assert_eq!(config.review_max_prompt_tokens, 15_000);
        assert_eq!(config.lock_renewal_secs, 900);
        assert!(!config.streaming);
    }

    #[test]
    fn status_topics_always_includes_both_literal_defaults() {
        let config = Config::default();
        let topics = config.status_topics();
        assert!(topics.contains(&"aidocwriter-status".to_string()));
        assert!(topics.contains(&"docwriter-status".to_string()));
    }

    #[test]
    fn unconfigured_queue_name_falls_back_to_default() {
        let config = Config::default();
        assert_eq!(config.queue_name(QueueName::Write), "write");
    }
}
