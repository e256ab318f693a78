pub mod config;
pub mod model;
pub mod normalize;
pub mod timefmt;
pub mod urls;

pub use config::{AppConfig, ConfigIntervals, DisplayConfig};
pub use model::{PlaybackMetrics, PlaybackState, PlayerFork, RawObservation, UnknownState};
pub use normalize::NormalizedTrack;
pub use timefmt::MalformedTime;
