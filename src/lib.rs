//! FaceGuard
//!
//! Face-recognition access control: watch a camera, resolve faces against a
//! folder-based reference database, classify each match against a fixed
//! role/alert policy, and persist alert-worthy detections to dated logs.
//!
//! # Architecture
//!
//! The session loop captures every frame and stays smooth; identity
//! resolution is slow and runs on a single background worker fed through a
//! capacity-1 channel (drop-if-busy, never queue more than one). Results
//! come back tagged with their frame index and are applied strictly in
//! order.
//!
//! Failure leans toward denial throughout: a resolver error, a corrupt
//! crop, or an empty database all classify as "No autorizado" — an error in
//! matching must never read as authorization.
//!
//! # Module Structure
//!
//! - `camera`: frame sources (V4L2 behind the `camera-v4l2` feature, plus a
//!   synthetic `stub://` source)
//! - `recognize`: the face detection/matching boundary and its backends
//! - `resolver` / `classify`: crop → identity → detection record
//! - `roles` / `roster`: role policy and the on-disk reference database
//! - `pipeline`: capture/worker coordination
//! - `alerts`: dated text + JSON Lines alert logs
//! - `session`: the per-run context object owning all of the above

pub mod alerts;
pub mod camera;
pub mod classify;
pub mod config;
pub mod frame;
pub mod pipeline;
pub mod recognize;
pub mod resolver;
pub mod roles;
pub mod roster;
pub mod session;
pub mod tempfiles;

pub use alerts::{AlertDayStats, AlertLog, AlertRecord};
pub use camera::{CameraConfig, CameraSource, CameraStats};
pub use classify::{classify, Detection, FrameAnalyzer, FrameOutcome};
pub use config::FaceguardConfig;
pub use frame::{Bbox, Frame};
pub use pipeline::{Coordinator, FrameResult, ResultGate};
pub use recognize::{FaceEngine, FaceRegion, HistogramEngine, MatchCandidate, ScriptedEngine};
pub use resolver::{IdentityResolver, Resolution};
pub use roles::{AlertFilter, AlertSeverity, RoleCategory};
pub use roster::Roster;
pub use session::{Session, SessionStats};
pub use tempfiles::TempStore;
