mod backends;
mod engine;

pub use backends::{HistogramEngine, ScriptedEngine};
pub use engine::{FaceEngine, FaceRegion, MatchCandidate};
