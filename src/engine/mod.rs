// Spread derivation: record types, the engine that produces them, volume enrichment.
pub mod spread;
pub mod types;
pub mod volume;

pub use spread::SpreadEngine;
pub use types::{DistributionSnapshot, SpreadOutcome, SpreadRecord};
pub use volume::{VolumeCache, VolumeSource};
