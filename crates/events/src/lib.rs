//! Lifecycle event dispatch: per-class callbacks and process-wide listeners.

pub mod args;
pub mod dispatcher;
pub mod listener;

pub use args::EventArgs;
pub use dispatcher::EventDispatcher;
pub use listener::{EventListener, EventManager};
