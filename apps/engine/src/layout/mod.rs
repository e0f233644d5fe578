// Layout analysis and fitting.
// Everything here is synchronous and CPU-bound; async callers must go through
// tokio::task::spawn_blocking.

pub mod analyzer;
pub mod config;
pub mod fitting;
pub mod font_metrics;
pub mod geometry;
pub mod resolver;
pub mod spatial_map;
pub mod wrap;

// Re-export the public API consumed by the reconstruction pipeline and handlers.
pub use analyzer::{analyze, LayoutAnalysis};
pub use config::FittingConfig;
pub use fitting::{fit, fit_translation, AdjustedRegion, FitStrategy};
pub use geometry::BoundingBox;
pub use resolver::{resolve, Resolver, ResolverOutcome};
pub use spatial_map::SpatialMap;
