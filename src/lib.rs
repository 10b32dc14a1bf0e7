pub mod aggregate;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod manifest;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod scanner;
pub mod source;

pub use aggregate::aggregate;
pub use config::Config;
pub use dispatch::dispatch_all;
pub use error::{BuildError, ConfigError, PipelineError, ScanError};
pub use manifest::ManifestBuilder;
pub use model::{AggregateReport, DependencySet, Manifest, ScanOutcome, Target, VulnerabilityFinding};
pub use pipeline::Pipeline;
pub use scanner::Scanner;
