//! Board counters exposed at `GET /metrics`.

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct CommandLabels {
    pub command: String,
    pub outcome: String,
}

/// Registry plus the handles the handlers increment. Registration happens
/// once at construction; afterwards the registry is only read.
pub struct Metrics {
    registry: Registry,
    pub commands: Family<CommandLabels, Counter>,
    pub uploads: Counter,
    pub duplicate_uploads: Counter,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("tagboard");
        let commands = Family::<CommandLabels, Counter>::default();
        registry.register(
            "image_commands",
            "Image page commands processed, by verb and outcome",
            commands.clone(),
        );
        let uploads = Counter::default();
        registry.register("uploads", "Files ingested as new image rows", uploads.clone());
        let duplicate_uploads = Counter::default();
        registry.register(
            "duplicate_uploads",
            "Upload files skipped as exact duplicates",
            duplicate_uploads.clone(),
        );
        Metrics {
            registry,
            commands,
            uploads,
            duplicate_uploads,
        }
    }

    pub fn observe_command(&self, command: &str, ok: bool) {
        self.commands
            .get_or_create(&CommandLabels {
                command: command.to_string(),
                outcome: if ok { "ok" } else { "rejected" }.to_string(),
            })
            .inc();
    }

    /// The registry in OpenMetrics text form.
    pub fn encode_text(&self) -> Result<String, std::fmt::Error> {
        let mut out = String::new();
        encode(&mut out, &self.registry)?;
        Ok(out)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
