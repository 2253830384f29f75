//! Data models for AlertGate

mod alert;
mod notification;
mod quiet_hours;
mod throttle;

pub use alert::*;
pub use notification::*;
pub use quiet_hours::*;
pub use throttle::*;
