//! Deterministic harness pieces for tests, the CLI `simulate` command and
//! offline runs.
//!
//! Everything here implements the same seams the production code uses
//! (`Timer`, `Clock`, `ToneBackend`, `ResultSubmitter`), so a whole screening
//! session can be driven without audio hardware, wall-clock sleeps or a
//! scoring server.

mod backend;
mod http;
mod listener;
mod scoring;
mod time;

pub use backend::RecordingToneBackend;
pub use http::{refused_url, OneShotServer};
pub use listener::SimulatedListener;
pub use scoring::{OfflineScorer, ScriptedSubmitter, OFFLINE_DIAGNOSIS, OFFLINE_RECOMMENDATIONS};
pub use time::{ManualTimer, StubClock};
