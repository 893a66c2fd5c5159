use fintrack_auth::logger::*;

fn main() -> anyhow::Result<()> {
    let logger = Logger::new_bootstrap();
    trace!("bootstrap trace log");
    debug!("bootstrap debug log");
    info!("bootstrap info log");

    let config = LogConfig {
        filter: "debug".to_string(),
        format: LogFormat::Text,
    };
    logger.reload_from_config(&config)?;
    trace!("application trace log");
    debug!("application debug log");
    info!(username = "ana@example.com", "application info log");

    let config = LogConfig {
        filter: "info".to_string(),
        format: LogFormat::Json,
    };
    logger.reload_from_config(&config)?;
    debug!("hidden debug log");
    info!(username = "ana@example.com", "json info log");

    Ok(())
}
