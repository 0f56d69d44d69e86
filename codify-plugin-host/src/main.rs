//! Binary entrypoint: initializes logging, builds the resource-controller
//! registry, and runs the NDJSON request loop over stdio.

use std::sync::Arc;

use codify_core::ResourceController;
use codify_plugin_host::Plugin;

fn init_logging() {
    let debug = std::env::var("DEBUG").unwrap_or_default();
    let default_filter = if debug.contains("codify") { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

/// Controllers this binary exposes. A standalone plugin process links in
/// whichever provider crates it ships; this host has none of its own, so
/// the registry starts empty and is a hook for downstream binaries to
/// extend by swapping this function out.
fn controllers() -> Vec<Arc<dyn ResourceController>> {
    Vec::new()
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_logging();

    let plugin = Plugin::new(controllers());
    log::info!("codify-plugin-host ready");

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();
    let result = codify_plugin_host::run(&plugin, stdin, stdout).await;

    plugin.kill().await;
    result
}
