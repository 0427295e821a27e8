//! Lua bridge that turns joystick and keyboard input into script callbacks
//! and lets those callbacks play preloaded samples and show preloaded images.

pub mod backend;
pub mod cli;
pub mod dispatch;
pub mod event_log;
pub mod events;
pub mod lua_host;
pub mod media;
pub mod mixer;
pub mod runtime;
pub mod slots;

pub use dispatch::{CallbackInvoker, DispatchLoop, DispatchStats, InvokeOutcome, LoopState};
pub use events::{Callback, EventRecord, InputEvent, QUIT_KEY};
pub use media::{MediaContext, MediaHandle};
pub use runtime::{RunSummary, Session};
pub use slots::{Handle, SlotError, SlotKind, SlotTable, SLOT_CAPACITY};
