//! Property-based tests using proptest
//!
//! These pin the engine's quantified invariants: rendering never fails,
//! markup stripping is stable, colorization only adds ANSI escapes, JSON
//! output round-trips, and admission is exactly the level/filter predicate.

use std::sync::{Arc, Mutex};

use logpipe::core::{render_markup, LevelRegistry, MarkupMode};
use logpipe::prelude::*;
use logpipe::{FormatPlan, LogRecord};
use proptest::prelude::*;

fn record_with(message: &str, level_name: &str) -> LogRecord {
    let levels = LevelRegistry::new();
    LogRecord {
        level: levels.lookup_by_name(level_name).unwrap(),
        message: message.to_string(),
        timestamp: chrono::Local::now(),
        elapsed: None,
        caller: None,
        thread: None,
        process: None,
        exception: None,
        extra: logpipe::core::record::empty_extra(),
    }
}

/// Remove ANSI escape sequences of the form `ESC [ ... m`.
fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for follow in chars.by_ref() {
                if follow == 'm' {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

proptest! {
    /// Rendering any template over any message never panics, with or
    /// without color.
    #[test]
    fn render_never_fails(template in ".{0,80}", message in ".{0,120}") {
        let plan = FormatPlan::compile(&template);
        let record = record_with(&message, "INFO");
        let _ = plan.render(&record, false);
        let _ = plan.render(&record, true);
        let _ = plan.serialize(&record);
    }

    /// Stripping markup is idempotent: a stripped string strips to itself.
    #[test]
    fn markup_strip_idempotent(message in ".{0,120}") {
        let once = render_markup(&message, MarkupMode::Strip);
        let twice = render_markup(&once, MarkupMode::Strip);
        prop_assert_eq!(once, twice);
    }

    /// Colorizing inserts only ANSI escapes: removing them yields exactly
    /// the stripped rendering.
    #[test]
    fn markup_colorize_only_adds_escapes(message in "[a-zA-Z0-9 </>bru]{0,120}") {
        let colorized = render_markup(&message, MarkupMode::Colorize);
        let stripped = render_markup(&message, MarkupMode::Strip);
        prop_assert_eq!(strip_ansi(&colorized), stripped);
    }

    /// JSON serialization round-trips the documented fields.
    #[test]
    fn json_round_trip(message in "[^\u{0}]{0,120}", level_idx in 0usize..8) {
        let names = ["TRACE", "DEBUG", "INFO", "SUCCESS", "WARNING", "ERROR", "FAIL", "CRITICAL"];
        let record = record_with(&message, names[level_idx]);
        let plan = FormatPlan::default();

        let parsed: serde_json::Value = serde_json::from_str(&plan.serialize(&record)).unwrap();
        prop_assert_eq!(parsed["message"].as_str().unwrap(), message.as_str());
        prop_assert_eq!(parsed["level"].as_str().unwrap(), names[level_idx]);
        prop_assert!(parsed["extra"].is_object());
    }

    /// A handler receives a record iff `level_no >= handler level` and the
    /// filter passes.
    #[test]
    fn admission_matches_predicate(
        handler_level in 0usize..8,
        emissions in proptest::collection::vec((0usize..8, "[a-z]{1,12}"), 1..20),
        reject_marker in "[a-z]{2}",
    ) {
        let names = ["TRACE", "DEBUG", "INFO", "SUCCESS", "WARNING", "ERROR", "FAIL", "CRITICAL"];
        let numbers = [5u16, 10, 20, 25, 30, 40, 45, 50];

        let engine = Engine::new();
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let marker = reject_marker.clone();
        engine
            .callable(move |line| seen_clone.lock().unwrap().push(line.to_string()))
            .level(names[handler_level])
            .format("{message}")
            .filter({
                let marker = marker.clone();
                move |record: &LogRecord| !record.message.contains(&marker)
            })
            .add()
            .unwrap();

        let mut expected = Vec::new();
        for (level_idx, message) in &emissions {
            engine.emit(names[*level_idx], message.clone(), EmitOptions::new());
            if numbers[*level_idx] >= numbers[handler_level] && !message.contains(&reject_marker) {
                expected.push(message.clone());
            }
        }

        prop_assert_eq!(&*seen.lock().unwrap(), &expected);
    }
}
