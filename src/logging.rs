use env_logger::Env;

/// Initialise env_logger. `RUST_LOG` still wins over the default filter.
pub fn init(verbose: bool) {
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter(verbose)))
        .format_target(false)
        .init();
}

fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "info,sunnybeam_aggregator=debug"
    } else {
        "info"
    }
}
