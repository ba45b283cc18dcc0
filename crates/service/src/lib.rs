use config::{LoggingConfig, ServiceConfig};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Compact,
    Pretty,
}

impl LogFormat {
    /// Unknown names fall back to `Pretty`.
    pub fn parse(name: &str) -> Self {
        match name {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

pub fn init_tracing(logging_config: &LoggingConfig) {
    let filter = logging_config.filter();

    // Initialize tracing based on the format specified in config
    match LogFormat::parse(&logging_config.format) {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        }
        LogFormat::Compact => {
            tracing_subscriber::fmt()
                .compact()
                .with_env_filter(filter)
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(filter)
                .init();
        }
    }
}

/// Log the non-secret parts of the configuration.
pub fn log_startup_summary(config: &ServiceConfig) {
    tracing::info!(
        domain = %config.app.domain,
        environment = %config.app.environment,
        shutdown_timeout = ?config.app.shutdown_timeout,
        "Configuration loaded"
    );
    tracing::info!(address = %config.http.bind_address(), origins = ?config.http.origins, "HTTP server");
    tracing::info!(address = %config.grpc.bind_address(), "gRPC server");
    tracing::info!(address = %config.debug.bind_address(), "Debug server");
    tracing::info!(
        command_bus = config.command_bus.queue_size,
        event_bus = config.event_bus.queue_size,
        "Bus queue sizes"
    );

    if config.facebook.is_configured() {
        tracing::info!("Facebook OAuth configured");
    }
    if config.google.is_configured() {
        tracing::info!("Google OAuth configured");
    }
    if config.app.is_production() && config.app.secret == "secret" {
        tracing::warn!("USER_SECRET is the built-in default in production");
    }
}
