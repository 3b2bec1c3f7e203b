pub mod config;
pub mod error;
pub mod fit;
pub mod format;
pub mod hardware;
pub mod models;
pub mod monitor;

pub use config::Config;
pub use error::{Error, Result};
pub use fit::{
    CompatibilityStatus, EvaluationParameters, ModelCompatibility, StatusCounts,
    clamp_parallel_agents, context_length_multiplier, evaluate, evaluate_model,
    max_parallel_agents, rank_by_headroom,
};
pub use hardware::{
    DynamicSystemInfo, MemoryOverrides, MemoryPressure, MemoryReading, StaticSystemInfo,
};
pub use models::{CatalogModel, ModelCatalog};
pub use monitor::MemoryMonitor;
