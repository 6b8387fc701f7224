pub mod buffer;
pub mod state;
pub mod switch;

pub use state::{ChangeDetector, TickOutcome};
pub use switch::DetectionSwitch;
