use env_logger::Env;

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "bourse=info,bourse_exchange=info";

/// Initialise `env_logger` from `RUST_LOG`. Safe to call more than once.
pub fn init() {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or(DEFAULT_LOG_FILTER))
        .try_init();
}
