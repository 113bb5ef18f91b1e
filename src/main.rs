//! FlashPaste server entry point.
//!
//! Reads configuration, sets up logging and serves the HTTP app until
//! Ctrl+C.

use flashpaste::config::{help_text, Command, Config};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn print_banner(config: &Config) {
    let store = match &config.store {
        flashpaste::StoreConfig::Memory => "memory".to_string(),
        flashpaste::StoreConfig::Redis(redis) => format!("redis {}", redis.addr),
        flashpaste::StoreConfig::Unconfigured => "none".to_string(),
    };

    println!(
        r#"
FlashPaste v{} - Expiring, view-limited text sharing
──────────────────────────────────────────────────────────────
Server started on http://{}
Store: {}{}

Use Ctrl+C to shutdown gracefully.
"#,
        flashpaste::VERSION,
        config.bind_address(),
        store,
        if config.test_mode { " (test mode)" } else { "" },
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match Config::load() {
        Ok(Command::Serve(config)) => config,
        Ok(Command::Help) => {
            println!("{}", help_text());
            return Ok(());
        }
        Ok(Command::Version) => {
            println!("FlashPaste version {}", flashpaste::VERSION);
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("{}", help_text());
            std::process::exit(1);
        }
    };

    // RUST_LOG wins, otherwise info
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    print_banner(&config);

    let app = flashpaste::app(&config);

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!("Listening on {}", config.bind_address());
    if config.test_mode {
        info!("Test mode enabled, honouring x-test-now-ms");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received, stopping server..."),
        Err(e) => {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await
        }
    }
}
