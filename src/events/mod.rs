//! In-process event bus and the session lifecycle messages it carries
//!
//! The control-stream component publishes `ControlEvent`/`TerminateEvent`;
//! streaming sessions and app runners subscribe, each filtering by its own
//! session id.

pub mod bus;
pub mod messages;

pub use bus::{EventBus, HandlerRegistration};
pub use messages::{ControlEvent, ControlEventType, LaunchAppEvent, SessionId, TerminateEvent};
