//! Log output for the bridge binary.
//!
//! The configured level applies to the bridge crates (`restgraph_server`,
//! `restgraph_graphql`, `restgraph_openapi`) and to `tower_http`, whose
//! request spans carry the GraphQL endpoint traffic. Other crates stay at
//! `warn` so hyper and async-graphql internals do not drown synthesis
//! diagnostics. Setting `RUST_LOG` replaces the whole filter.
use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

const BRIDGE_TARGETS: &[&str] = &[
    "restgraph_server",
    "restgraph_graphql",
    "restgraph_openapi",
    "tower_http",
];

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, tracing_subscriber::Registry>> =
    OnceLock::new();

/// Filter directives for `level`, e.g. `warn,restgraph_graphql=debug,...`.
pub fn bridge_directives(level: &str) -> String {
    let mut directives = String::from("warn");
    for target in BRIDGE_TARGETS {
        directives.push(',');
        directives.push_str(target);
        directives.push('=');
        directives.push_str(level);
    }
    directives
}

fn bridge_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(bridge_directives(level)).unwrap_or_else(|e| {
        eprintln!("Warning: invalid log level {level:?} ({e}), using info");
        EnvFilter::new(bridge_directives("info"))
    })
}

pub fn init_tracing() {
    init_tracing_with_level("info");
}

pub fn init_tracing_with_level(level: &str) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| bridge_filter(level)),
        Err(_) => bridge_filter(level),
    };

    let (filter, handle) = reload::Layer::new(filter);
    let _ = FILTER_HANDLE.set(handle);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}

/// Switches the bridge targets to `level` once the config file is read.
///
/// Does nothing under `RUST_LOG` or before [`init_tracing`].
pub fn apply_logging_level(level: &str) {
    if std::env::var("RUST_LOG").is_ok() {
        return;
    }
    if let Some(handle) = FILTER_HANDLE.get() {
        let filter = bridge_filter(level);
        if let Err(e) = handle.modify(|current| *current = filter) {
            tracing::warn!(error = %e, "log level reload failed");
        }
    }
}
