pub mod autopilot;
pub mod session;

pub use session::{Session, TickReport, TICKS_PER_SECOND};
