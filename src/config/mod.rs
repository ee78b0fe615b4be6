mod settings;

pub use settings::{LoggingConfig, RendererSettings, Settings};
