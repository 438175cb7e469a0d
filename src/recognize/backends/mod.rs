mod histogram;
mod stub;

pub use histogram::HistogramEngine;
pub use stub::ScriptedEngine;
