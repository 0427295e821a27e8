//! Single-threaded polling loop that routes input events to Lua callbacks.

use std::collections::VecDeque;
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;

use crate::backend::EventSource;
use crate::event_log::{EventLog, LogEntry};
use crate::events::{translate, Callback, EventRecord, InputEvent, Translation};

const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvokeOutcome {
    Called,
    /// The script does not define the callback.
    Skipped,
    Failed(String),
}

/// Calls a named script callback with one event record.
pub trait CallbackInvoker {
    fn invoke(&mut self, callback: Callback, record: &EventRecord) -> InvokeOutcome;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Terminated,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub called: u64,
    pub skipped: u64,
    pub failed: u64,
    pub ignored: u64,
}

pub struct DispatchLoop<S, I> {
    source: S,
    invoker: I,
    state: LoopState,
    resubmitted: VecDeque<InputEvent>,
    idle_interval: Duration,
    log: Option<EventLog>,
    stats: DispatchStats,
}

impl<S: EventSource, I: CallbackInvoker> DispatchLoop<S, I> {
    pub fn new(source: S, invoker: I) -> Self {
        Self {
            source,
            invoker,
            state: LoopState::Running,
            resubmitted: VecDeque::new(),
            idle_interval: DEFAULT_IDLE_INTERVAL,
            log: None,
            stats: DispatchStats::default(),
        }
    }

    pub fn with_idle_interval(mut self, interval: Duration) -> Self {
        self.idle_interval = interval;
        self
    }

    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn into_parts(self) -> (S, I) {
        (self.source, self.invoker)
    }

    /// Polls until a quit event has been dispatched.
    pub fn run(&mut self) -> DispatchStats {
        while self.state == LoopState::Running {
            if self.drain() == 0 && self.state == LoopState::Running {
                thread::sleep(self.idle_interval);
            }
        }
        info!(
            "dispatch loop terminated (called {}, skipped {}, failed {}, ignored {})",
            self.stats.called, self.stats.skipped, self.stats.failed, self.stats.ignored
        );
        self.stats
    }

    /// Handles every event that is pending right now, in arrival order, and
    /// returns how many were consumed. Stops early once the loop terminates.
    pub fn drain(&mut self) -> usize {
        let mut handled = 0;
        while self.state == LoopState::Running {
            let Some(event) = self.next_event() else {
                break;
            };
            self.handle(event);
            handled += 1;
        }
        handled
    }

    fn next_event(&mut self) -> Option<InputEvent> {
        self.resubmitted
            .pop_front()
            .or_else(|| self.source.poll_event())
    }

    fn handle(&mut self, event: InputEvent) {
        match translate(&event) {
            Translation::Ignore => {
                self.stats.ignored += 1;
            }
            Translation::QuitRequest { timestamp } => {
                debug!("quit key pressed at {timestamp}; requesting shutdown");
                if let Some(log) = &self.log {
                    log.push(LogEntry::QuitKey { timestamp });
                }
                // Goes ahead of anything else already pending so onquit runs next.
                self.resubmitted.push_front(InputEvent::Quit { timestamp });
            }
            Translation::Dispatch { callback, record } => {
                let outcome = self.invoker.invoke(callback, &record);
                match &outcome {
                    InvokeOutcome::Called => self.stats.called += 1,
                    InvokeOutcome::Skipped => {
                        self.stats.skipped += 1;
                        debug!("{callback} is not defined; skipping");
                    }
                    InvokeOutcome::Failed(message) => {
                        self.stats.failed += 1;
                        warn!("{callback} failed: {message}");
                    }
                }
                if let Some(log) = &self.log {
                    log.push(LogEntry::Callback {
                        callback,
                        record,
                        outcome,
                    });
                }
                if callback == Callback::Quit {
                    self.state = LoopState::Terminated;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::QUIT_KEY;
    use std::collections::VecDeque;

    /// Hands out one batch per poll round; `None` separates batches.
    struct BatchedSource {
        pending: VecDeque<Option<InputEvent>>,
        polls: usize,
    }

    impl BatchedSource {
        fn new(events: Vec<Option<InputEvent>>) -> Self {
            Self {
                pending: events.into(),
                polls: 0,
            }
        }
    }

    impl EventSource for BatchedSource {
        fn poll_event(&mut self) -> Option<InputEvent> {
            self.polls += 1;
            self.pending.pop_front().flatten()
        }
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<(Callback, EventRecord)>,
        fail_on: Option<Callback>,
    }

    impl CallbackInvoker for Recorder {
        fn invoke(&mut self, callback: Callback, record: &EventRecord) -> InvokeOutcome {
            self.calls.push((callback, record.clone()));
            if self.fail_on == Some(callback) {
                InvokeOutcome::Failed("boom".to_string())
            } else {
                InvokeOutcome::Called
            }
        }
    }

    fn key_down(timestamp: u32, key: &str) -> Option<InputEvent> {
        Some(InputEvent::KeyDown {
            timestamp,
            key: key.to_string(),
        })
    }

    fn button_down(timestamp: u32, button_id: u8) -> Option<InputEvent> {
        Some(InputEvent::ButtonDown {
            timestamp,
            device_id: 0,
            button_id,
        })
    }

    fn quit(timestamp: u32) -> Option<InputEvent> {
        Some(InputEvent::Quit { timestamp })
    }

    fn run(events: Vec<Option<InputEvent>>, recorder: Recorder) -> (Vec<Callback>, DispatchStats) {
        let mut dispatch = DispatchLoop::new(BatchedSource::new(events), recorder)
            .with_idle_interval(Duration::ZERO);
        let stats = dispatch.run();
        assert_eq!(dispatch.state(), LoopState::Terminated);
        let (_, recorder) = dispatch.into_parts();
        (recorder.calls.into_iter().map(|(cb, _)| cb).collect(), stats)
    }

    #[test]
    fn callbacks_follow_arrival_order_across_batches() {
        let events = vec![
            button_down(1, 0),
            Some(InputEvent::AxisMotion {
                timestamp: 2,
                device_id: 0,
                axis_id: 0,
                value: 10,
            }),
            None,
            key_down(3, "A"),
            Some(InputEvent::ButtonUp {
                timestamp: 4,
                device_id: 0,
                button_id: 0,
            }),
            None,
            quit(5),
        ];
        let (calls, stats) = run(events, Recorder::default());
        assert_eq!(
            calls,
            vec![
                Callback::ButtonDown,
                Callback::Axis,
                Callback::KeyDown,
                Callback::ButtonUp,
                Callback::Quit,
            ]
        );
        assert_eq!(stats.called, 5);
    }

    #[test]
    fn quit_key_fires_onquit_once_and_stops_the_batch() {
        let events = vec![
            button_down(1, 1),
            key_down(2, QUIT_KEY),
            button_down(3, 2),
            quit(4),
        ];
        let (calls, _) = run(events, Recorder::default());
        assert_eq!(calls, vec![Callback::ButtonDown, Callback::Quit]);
    }

    #[test]
    fn synthetic_quit_keeps_the_key_timestamp() {
        let mut dispatch = DispatchLoop::new(
            BatchedSource::new(vec![key_down(40, QUIT_KEY)]),
            Recorder::default(),
        );
        assert_eq!(dispatch.drain(), 2);
        let (_, recorder) = dispatch.into_parts();
        assert_eq!(
            recorder.calls,
            vec![(Callback::Quit, EventRecord::Quit { timestamp: 40 })]
        );
    }

    #[test]
    fn failing_callback_does_not_stop_later_events() {
        let recorder = Recorder {
            fail_on: Some(Callback::ButtonDown),
            ..Recorder::default()
        };
        let events = vec![button_down(1, 0), None, button_down(2, 1), key_down(3, "B"), quit(4)];
        let (calls, stats) = run(events, recorder);
        assert_eq!(
            calls,
            vec![
                Callback::ButtonDown,
                Callback::ButtonDown,
                Callback::KeyDown,
                Callback::Quit,
            ]
        );
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.called, 2);
    }

    #[test]
    fn no_polling_after_termination() {
        let mut dispatch = DispatchLoop::new(
            BatchedSource::new(vec![quit(1), button_down(2, 0)]),
            Recorder::default(),
        );
        dispatch.run();
        let (source, recorder) = dispatch.into_parts();
        assert_eq!(source.polls, 1);
        assert_eq!(recorder.calls.len(), 1);
    }

    #[test]
    fn ignored_events_are_counted_not_dispatched() {
        let (calls, stats) = run(vec![Some(InputEvent::Other), quit(1)], Recorder::default());
        assert_eq!(calls, vec![Callback::Quit]);
        assert_eq!(stats.ignored, 1);
    }

    #[test]
    fn log_records_quit_key_and_outcomes() {
        let log = EventLog::new();
        let mut dispatch = DispatchLoop::new(
            BatchedSource::new(vec![key_down(9, QUIT_KEY)]),
            Recorder::default(),
        )
        .with_log(log.clone());
        dispatch.run();
        assert_eq!(
            log.entries(),
            vec![
                LogEntry::QuitKey { timestamp: 9 },
                LogEntry::Callback {
                    callback: Callback::Quit,
                    record: EventRecord::Quit { timestamp: 9 },
                    outcome: InvokeOutcome::Called,
                },
            ]
        );
    }
}
