pub mod cache;
pub mod coalesce;
pub mod loader;
pub mod preloader;
pub mod source;
pub mod store;

// Re-exports for convenience
pub use cache::{CacheStats, TileCache};
pub use loader::TileFetcher;
pub use preloader::{PreloadProgress, TilePreloader};
pub use source::{OpenStreetMapSource, TileSource, UrlTemplate};
pub use store::{MemoryStore, TileStore};
