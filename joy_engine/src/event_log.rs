use std::{cell::RefCell, fs, path::Path, rc::Rc};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::dispatch::InvokeOutcome;
use crate::events::{Callback, EventRecord};
use crate::slots::Handle;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogEntry {
    Callback {
        callback: Callback,
        record: EventRecord,
        outcome: InvokeOutcome,
    },
    QuitKey {
        timestamp: u32,
    },
    Play {
        handle: Handle,
        looping: bool,
        accepted: bool,
        loaded: bool,
    },
    Stop {
        handle: Handle,
        accepted: bool,
    },
    Display {
        handle: Handle,
        accepted: bool,
        loaded: bool,
    },
}

/// Ordered journal of dispatched callbacks and the media requests they made.
///
/// Clones share the same journal so the dispatch loop and the media context
/// can both append to it.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: Rc<RefCell<Vec<LogEntry>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: LogEntry) {
        self.entries.borrow_mut().push(entry);
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&*self.entries.borrow())
            .context("serializing dispatch log to JSON")?;
        fs::write(path, json)
            .with_context(|| format!("writing dispatch log to {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clones_share_entries_and_serialize_tagged() {
        let log = EventLog::new();
        let writer = log.clone();
        writer.push(LogEntry::Callback {
            callback: Callback::ButtonDown,
            record: EventRecord::Button {
                timestamp: 1000,
                device_id: 0,
                button_id: 2,
                pressed: true,
            },
            outcome: InvokeOutcome::Called,
        });
        writer.push(LogEntry::Play {
            handle: 99,
            looping: false,
            accepted: false,
            loaded: false,
        });

        assert_eq!(log.len(), 2);
        let value = serde_json::to_value(log.entries()).unwrap();
        assert_eq!(
            value,
            json!([
                {
                    "kind": "callback",
                    "callback": "button_down",
                    "record": {
                        "kind": "button",
                        "timestamp": 1000,
                        "device_id": 0,
                        "button_id": 2,
                        "pressed": true
                    },
                    "outcome": "called"
                },
                {"kind": "play", "handle": 99, "looping": false, "accepted": false, "loaded": false}
            ])
        );
    }
}
