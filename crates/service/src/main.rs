use config::ServiceConfig;
use service::{init_tracing, log_startup_summary};

fn main() {
    // Load configuration first to get logging settings
    let config = ServiceConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Application cannot start without a valid configuration.");
        std::process::exit(1);
    });

    init_tracing(&config.logging);
    log_startup_summary(&config);
}
