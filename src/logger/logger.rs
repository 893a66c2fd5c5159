use anyhow::{Result, anyhow};
use serde::Deserialize;
use tracing_subscriber::fmt::format::{Format, Json, JsonFields};
use tracing_subscriber::layer::Layered;
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

pub struct LogConfig {
    pub filter: String,
    pub format: LogFormat,
}

type Filtered = Layered<reload::Layer<EnvFilter, Registry>, Registry>;
type TextLayer = Option<fmt::Layer<Filtered>>;
type WithText = Layered<reload::Layer<TextLayer, Filtered>, Filtered>;
type JsonLayer = Option<fmt::Layer<WithText, JsonFields, Format<Json>>>;

/// Exactly one of the two fmt layers is active at a time.
pub struct Logger {
    filter_handle: reload::Handle<EnvFilter, Registry>,
    text_handle: reload::Handle<TextLayer, Filtered>,
    json_handle: reload::Handle<JsonLayer, WithText>,
}

impl Logger {
    pub fn new_bootstrap() -> Self {
        let filter = EnvFilter::new("info");
        let (filter, filter_handle) = reload::Layer::new(filter);
        let (text, text_handle) = reload::Layer::new(Some(fmt::layer()));
        let (json, json_handle) = reload::Layer::new(None);

        tracing_subscriber::registry()
            .with(filter)
            .with(text)
            .with(json)
            .init();

        Self {
            filter_handle,
            text_handle,
            json_handle,
        }
    }

    pub fn reload_from_config(&self, config: &LogConfig) -> Result<()> {
        let filter = EnvFilter::try_new(&config.filter).map_err(|e| anyhow!(e))?;
        self.filter_handle.reload(filter).map_err(|e| anyhow!(e))?;

        let (text, json) = match config.format {
            LogFormat::Text => (Some(fmt::layer()), None),
            LogFormat::Json => (None, Some(fmt::layer().json())),
        };
        self.text_handle.reload(text).map_err(|e| anyhow!(e))?;
        self.json_handle.reload(json).map_err(|e| anyhow!(e))?;
        Ok(())
    }
}
