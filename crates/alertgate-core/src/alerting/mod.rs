//! Alert admission and the delivery seams around it
//!
//! Composes storm detection, throttling and quiet hours into a single
//! decision per alert, and defines the traits callers implement to receive
//! deferred notifications and summary events.

mod admission;
mod delivery;

pub use admission::{Admission, AdmissionController, Digest, Stage};
pub use delivery::{EventPublisher, LogSink, NotificationDelivery};
