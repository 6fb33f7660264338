use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Log to stderr. `RUST_LOG` takes precedence over the defaults.
pub fn init(debug: bool, default_level: &str) {
    let default_filter = if debug {
        "calres_core=debug,calres=debug,info".to_string()
    } else {
        format!("calres_core={default_level},calres={default_level},warn")
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let terminal_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .compact();

    tracing_subscriber::registry()
        .with(terminal_layer)
        .with(env_filter)
        .init();
}
