//! Native input events, the records handed to Lua, and the mapping between them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Key that always ends the session instead of reaching `onkeydown`.
pub const QUIT_KEY: &str = "Escape";

/// Backend-neutral input event as produced by an [`crate::backend::EventSource`].
///
/// The serde form doubles as the replay file format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    ButtonDown {
        timestamp: u32,
        device_id: u32,
        button_id: u8,
    },
    ButtonUp {
        timestamp: u32,
        device_id: u32,
        button_id: u8,
    },
    AxisMotion {
        timestamp: u32,
        device_id: u32,
        axis_id: u8,
        value: i16,
    },
    KeyDown {
        timestamp: u32,
        key: String,
    },
    KeyUp {
        timestamp: u32,
        key: String,
    },
    Quit {
        timestamp: u32,
    },
    /// Anything the bridge has no callback for (mouse, window focus, ...).
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Callback {
    ButtonDown,
    ButtonUp,
    Axis,
    KeyDown,
    KeyUp,
    Quit,
}

impl Callback {
    pub const ALL: [Callback; 6] = [
        Callback::ButtonDown,
        Callback::ButtonUp,
        Callback::Axis,
        Callback::KeyDown,
        Callback::KeyUp,
        Callback::Quit,
    ];

    /// Name of the Lua global invoked for this callback.
    pub fn name(self) -> &'static str {
        match self {
            Callback::ButtonDown => "onbuttondown",
            Callback::ButtonUp => "onbuttonup",
            Callback::Axis => "onaxis",
            Callback::KeyDown => "onkeydown",
            Callback::KeyUp => "onkeyup",
            Callback::Quit => "onquit",
        }
    }
}

impl fmt::Display for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventRecord {
    Button {
        timestamp: u32,
        device_id: u32,
        button_id: u8,
        pressed: bool,
    },
    Axis {
        timestamp: u32,
        device_id: u32,
        axis_id: u8,
        value: i16,
    },
    Key {
        timestamp: u32,
        key_name: String,
        pressed: bool,
    },
    Quit {
        timestamp: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Integer(i64),
    Text(String),
}

impl EventRecord {
    pub fn timestamp(&self) -> u32 {
        match self {
            EventRecord::Button { timestamp, .. }
            | EventRecord::Axis { timestamp, .. }
            | EventRecord::Key { timestamp, .. }
            | EventRecord::Quit { timestamp } => *timestamp,
        }
    }

    /// Script-facing fields in declaration order, keyed by the names the Lua
    /// callbacks read (`which`, `button`, `axis`, `value`, `key`).
    pub fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        let mut fields = vec![("timestamp", FieldValue::Integer(i64::from(self.timestamp())))];
        match self {
            EventRecord::Button {
                device_id,
                button_id,
                ..
            } => {
                fields.push(("which", FieldValue::Integer(i64::from(*device_id))));
                fields.push(("button", FieldValue::Integer(i64::from(*button_id))));
            }
            EventRecord::Axis {
                device_id,
                axis_id,
                value,
                ..
            } => {
                fields.push(("which", FieldValue::Integer(i64::from(*device_id))));
                fields.push(("axis", FieldValue::Integer(i64::from(*axis_id))));
                fields.push(("value", FieldValue::Integer(i64::from(*value))));
            }
            EventRecord::Key { key_name, .. } => {
                fields.push(("key", FieldValue::Text(key_name.clone())));
            }
            EventRecord::Quit { .. } => {}
        }
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Translation {
    Dispatch {
        callback: Callback,
        record: EventRecord,
    },
    /// The reserved quit key was pressed; the loop turns this into a quit event.
    QuitRequest { timestamp: u32 },
    Ignore,
}

pub fn translate(event: &InputEvent) -> Translation {
    match event {
        InputEvent::ButtonDown {
            timestamp,
            device_id,
            button_id,
        } => button(Callback::ButtonDown, *timestamp, *device_id, *button_id, true),
        InputEvent::ButtonUp {
            timestamp,
            device_id,
            button_id,
        } => button(Callback::ButtonUp, *timestamp, *device_id, *button_id, false),
        InputEvent::AxisMotion {
            timestamp,
            device_id,
            axis_id,
            value,
        } => Translation::Dispatch {
            callback: Callback::Axis,
            record: EventRecord::Axis {
                timestamp: *timestamp,
                device_id: *device_id,
                axis_id: *axis_id,
                value: *value,
            },
        },
        InputEvent::KeyDown { timestamp, key } if key == QUIT_KEY => Translation::QuitRequest {
            timestamp: *timestamp,
        },
        InputEvent::KeyDown { timestamp, key } => key_record(Callback::KeyDown, *timestamp, key, true),
        // Releasing the quit key arrives after the session has already ended.
        InputEvent::KeyUp { key, .. } if key == QUIT_KEY => Translation::Ignore,
        InputEvent::KeyUp { timestamp, key } => key_record(Callback::KeyUp, *timestamp, key, false),
        InputEvent::Quit { timestamp } => Translation::Dispatch {
            callback: Callback::Quit,
            record: EventRecord::Quit {
                timestamp: *timestamp,
            },
        },
        InputEvent::Other => Translation::Ignore,
    }
}

fn button(callback: Callback, timestamp: u32, device_id: u32, button_id: u8, pressed: bool) -> Translation {
    Translation::Dispatch {
        callback,
        record: EventRecord::Button {
            timestamp,
            device_id,
            button_id,
            pressed,
        },
    }
}

fn key_record(callback: Callback, timestamp: u32, key: &str, pressed: bool) -> Translation {
    Translation::Dispatch {
        callback,
        record: EventRecord::Key {
            timestamp,
            key_name: key.to_string(),
            pressed,
        },
    }
}
