pub mod locator;
pub mod parse;
pub mod phase;
pub mod state;

pub use locator::{select_candidate, LockOutcome, TimerLock, DEFAULT_GRACE_POLLS};
pub use parse::parse_time_to_seconds;
pub use phase::{BreakRule, PageMarkers, Phase, SessionKind, DEFAULT_BREAK_RULE};
pub use state::{Session, SessionTally};
