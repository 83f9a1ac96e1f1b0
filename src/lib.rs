pub mod config;
pub mod pipeline;

pub use config::{ConfigError, RecognitionConfig};
pub use pipeline::{ProgressFn, RecognitionPipeline, TextInput};

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dcwc_assist=debug,dcwc_vision=debug,dcwc_capture=debug".into()),
        )
        .init();
}
