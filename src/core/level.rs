//! Severity level registry
//!
//! Built-in levels are always present and cannot be removed or renumbered.
//! Custom levels are registered at runtime. Lookups happen on every emission
//! that resolves a level by name or number, so the registry keeps its tables
//! behind an [`ArcSwap`]: registration clones the tables, mutates the copy and
//! swaps it in atomically; the hot path never takes a lock.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use colored::Color;
use parking_lot::Mutex;

use super::error::{EngineError, Result};

/// A severity level: numeric value, display name, optional color and icon.
#[derive(Clone, Debug)]
pub struct Level {
    pub name: String,
    pub no: u16,
    pub color: Option<Color>,
    pub icon: Option<String>,
}

impl Level {
    fn new(name: &str, no: u16, color: Option<Color>, icon: Option<String>) -> Self {
        Level {
            name: name.to_string(),
            no,
            color,
            icon,
        }
    }

    /// Color used when rendering this level, falling back to white.
    pub fn color_or_default(&self) -> Color {
        self.color.unwrap_or(Color::White)
    }
}

/// Numeric values of the built-in levels.
pub mod builtin {
    pub const TRACE: u16 = 5;
    pub const DEBUG: u16 = 10;
    pub const INFO: u16 = 20;
    pub const SUCCESS: u16 = 25;
    pub const WARNING: u16 = 30;
    pub const ERROR: u16 = 40;
    pub const FAIL: u16 = 45;
    pub const CRITICAL: u16 = 50;
}

fn builtin_levels() -> Vec<Level> {
    vec![
        Level::new("TRACE", builtin::TRACE, Some(Color::Cyan), None),
        Level::new("DEBUG", builtin::DEBUG, Some(Color::Blue), None),
        Level::new("INFO", builtin::INFO, Some(Color::Green), None),
        Level::new("SUCCESS", builtin::SUCCESS, Some(Color::BrightGreen), None),
        Level::new("WARNING", builtin::WARNING, Some(Color::Yellow), None),
        Level::new("ERROR", builtin::ERROR, Some(Color::Red), None),
        Level::new("FAIL", builtin::FAIL, Some(Color::Magenta), None),
        Level::new("CRITICAL", builtin::CRITICAL, Some(Color::BrightRed), None),
    ]
}

/// Convert a color name like `"bright_green"` to a [`Color`].
pub fn color_from_name(color_name: &str) -> Option<Color> {
    match color_name.to_ascii_lowercase().as_str() {
        "black" => Some(Color::Black),
        "red" => Some(Color::Red),
        "green" => Some(Color::Green),
        "yellow" => Some(Color::Yellow),
        "blue" => Some(Color::Blue),
        "magenta" => Some(Color::Magenta),
        "cyan" => Some(Color::Cyan),
        "white" => Some(Color::White),
        "bright_black" => Some(Color::BrightBlack),
        "bright_red" => Some(Color::BrightRed),
        "bright_green" => Some(Color::BrightGreen),
        "bright_yellow" => Some(Color::BrightYellow),
        "bright_blue" => Some(Color::BrightBlue),
        "bright_magenta" => Some(Color::BrightMagenta),
        "bright_cyan" => Some(Color::BrightCyan),
        "bright_white" => Some(Color::BrightWhite),
        _ => None,
    }
}

/// Immutable lookup tables published as one snapshot.
struct LevelTable {
    by_name: HashMap<String, Arc<Level>>,
    by_no: HashMap<u16, Arc<Level>>,
    min_no: u16,
}

impl LevelTable {
    fn seeded() -> Self {
        let mut by_name = HashMap::new();
        let mut by_no = HashMap::new();
        let mut min_no = u16::MAX;
        for level in builtin_levels() {
            min_no = min_no.min(level.no);
            let level = Arc::new(level);
            by_name.insert(level.name.clone(), Arc::clone(&level));
            by_no.insert(level.no, level);
        }
        LevelTable {
            by_name,
            by_no,
            min_no,
        }
    }
}

/// Registry of severity levels with lock-free lookups.
pub struct LevelRegistry {
    table: ArcSwap<LevelTable>,
    // Serializes registrations only; never touched on the lookup path.
    write: Mutex<()>,
}

impl LevelRegistry {
    pub fn new() -> Self {
        LevelRegistry {
            table: ArcSwap::from_pointee(LevelTable::seeded()),
            write: Mutex::new(()),
        }
    }

    /// Register a custom level.
    ///
    /// Re-registering an existing `(name, no)` pair is idempotent. The same
    /// name under a different number is rejected, which also protects the
    /// built-in levels from being renumbered, and a number already owned by
    /// another name is rejected so the two lookup tables can never disagree
    /// about a severity.
    pub fn register(
        &self,
        name: &str,
        no: u16,
        color: Option<&str>,
        icon: Option<&str>,
    ) -> Result<()> {
        let name = name.to_ascii_uppercase();
        let _guard = self.write.lock();

        let current = self.table.load();
        if let Some(existing) = current.by_name.get(&name) {
            if existing.no != no {
                return Err(EngineError::LevelConflict {
                    name,
                    existing: existing.no,
                    requested: no,
                });
            }
            return Ok(());
        }
        // Same-name cases returned above, so any owner here is another name.
        if let Some(owner) = current.by_no.get(&no) {
            return Err(EngineError::LevelNumberInUse {
                no,
                existing: owner.name.clone(),
                requested: name,
            });
        }

        let level = Arc::new(Level {
            name: name.clone(),
            no,
            color: color.and_then(color_from_name),
            icon: icon.map(String::from),
        });

        let mut by_name = current.by_name.clone();
        let mut by_no = current.by_no.clone();
        by_name.insert(name, Arc::clone(&level));
        by_no.insert(no, level);
        let min_no = current.min_no.min(no);

        self.table.store(Arc::new(LevelTable {
            by_name,
            by_no,
            min_no,
        }));
        Ok(())
    }

    /// Look up a level by name, case-insensitive.
    pub fn lookup_by_name(&self, name: &str) -> Option<Arc<Level>> {
        let table = self.table.load();
        if let Some(level) = table.by_name.get(name) {
            return Some(Arc::clone(level));
        }
        table
            .by_name
            .get(&name.to_ascii_uppercase())
            .map(Arc::clone)
    }

    /// Look up a level by numeric value.
    pub fn lookup_by_no(&self, no: u16) -> Option<Arc<Level>> {
        self.table.load().by_no.get(&no).map(Arc::clone)
    }

    /// Smallest registered level number.
    pub fn min_registered(&self) -> u16 {
        self.table.load().min_no
    }
}

impl Default for LevelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
