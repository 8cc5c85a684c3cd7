//! Diagnostics sink.
//!
//! Events go to the `log` facade under the `spindle::events` target and, when
//! one is installed, to a process-wide event hook. Nothing in the pool makes
//! decisions based on diagnostics.

use log::{Level, Record};
use parking_lot::RwLock;
use std::panic::Location;
use std::thread;

/// Longest payload forwarded as-is. Longer payloads are cut on a char
/// boundary and the cut is reported.
pub const MAX_PAYLOAD_LEN: usize = 512;

/// One diagnostic event as seen by the hook.
#[derive(Debug, Clone, Copy)]
pub struct Event<'a> {
    pub name: &'a str,
    pub level: Level,
    pub payload: &'a str,
    /// Call site of [`emit`].
    pub location: &'static Location<'static>,
    /// Name of the emitting thread, if it has one.
    pub thread: Option<&'a str>,
}

pub type EventHook = Box<dyn Fn(&Event<'_>) + Send + Sync>;

static EVENT_HOOK: RwLock<Option<EventHook>> = RwLock::new(None);

/// Install the hook called for every event. Replaces any previous hook.
pub fn install_event_hook<F>(hook: F)
where
    F: Fn(&Event<'_>) + Send + Sync + 'static,
{
    *EVENT_HOOK.write() = Some(Box::new(hook));
}

pub fn clear_event_hook() {
    *EVENT_HOOK.write() = None;
}

#[track_caller]
pub fn emit(event: &str, level: Level, payload: &str) {
    let location = Location::caller();
    let current = thread::current();
    let (payload, truncated) = truncate(payload, MAX_PAYLOAD_LEN);

    let event = Event {
        name: event,
        level,
        payload,
        location,
        thread: current.name(),
    };

    record(&event, format_args!("[{}] {}: {}", thread_label(&event), event.name, payload));
    if truncated {
        let warn = Event {
            level: Level::Warn,
            ..event
        };
        record(
            &warn,
            format_args!("payload of {} truncated to {} bytes", event.name, payload.len()),
        );
    }

    if let Some(hook) = EVENT_HOOK.read().as_ref() {
        hook(&event);
    }
}

// log with the caller's file and line rather than this module's
fn record(event: &Event<'_>, args: std::fmt::Arguments<'_>) {
    if event.level > log::max_level() {
        return;
    }
    log::logger().log(
        &Record::builder()
            .args(args)
            .level(event.level)
            .target("spindle::events")
            .file(Some(event.location.file()))
            .line(Some(event.location.line()))
            .build(),
    );
}

fn thread_label<'a>(event: &Event<'a>) -> &'a str {
    event.thread.unwrap_or("<unnamed>")
}

fn truncate(s: &str, max: usize) -> (&str, bool) {
    if s.len() <= max {
        return (s, false);
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    (&s[..end], true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), ("short", false));

        let s = "aé"; // 'é' is two bytes
        assert_eq!(truncate(s, 2), ("a", true));

        let long = "x".repeat(MAX_PAYLOAD_LEN + 5);
        let (cut, truncated) = truncate(&long, MAX_PAYLOAD_LEN);
        assert!(truncated);
        assert_eq!(cut.len(), MAX_PAYLOAD_LEN);
    }

    #[test]
    fn test_hook_receives_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        install_event_hook(move |event| {
            if event.name == "test.hook" {
                sink.lock().push((
                    event.level,
                    event.payload.to_string(),
                    event.location.file().to_string(),
                    event.location.line(),
                    event.thread.map(str::to_owned),
                ));
            }
        });

        let line = line!() + 1;
        emit("test.hook", Level::Info, "hello");
        emit("test.hook", Level::Warn, &"y".repeat(MAX_PAYLOAD_LEN * 2));

        let named = thread::Builder::new()
            .name("diag-emitter".into())
            .spawn(|| emit("test.hook", Level::Debug, "from a named thread"))
            .unwrap();
        named.join().unwrap();

        clear_event_hook();
        emit("test.hook", Level::Info, "after clear");

        let seen = seen.lock();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].0, Level::Info);
        assert_eq!(seen[0].1, "hello");
        assert!(seen[0].2.ends_with("diagnostics.rs"));
        assert_eq!(seen[0].3, line);
        assert_eq!(seen[1].1.len(), MAX_PAYLOAD_LEN);
        assert_eq!(seen[2].4.as_deref(), Some("diag-emitter"));
    }
}
