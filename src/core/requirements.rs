//! Collection requirements
//!
//! Capturing caller, thread, process identity or elapsed time on every
//! emission costs more than the emission itself when no sink consumes them.
//! Each handler derives at creation time which of these fields its format
//! plan and filter can observe; the engine aggregates the result across all
//! live handlers and callbacks and skips capture for everything else.

/// Which optional record fields must be populated at emission.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CollectionRequirements {
    pub caller: bool,
    pub thread: bool,
    pub process: bool,
    pub elapsed: bool,
}

impl CollectionRequirements {
    /// Nothing required.
    pub const fn none() -> Self {
        CollectionRequirements {
            caller: false,
            thread: false,
            process: false,
            elapsed: false,
        }
    }

    /// Everything required. Used for opaque consumers (filters, callbacks,
    /// JSON serialization) that may inspect any field.
    pub const fn all() -> Self {
        CollectionRequirements {
            caller: true,
            thread: true,
            process: true,
            elapsed: true,
        }
    }

    /// OR of two requirement sets.
    pub fn merge(self, other: CollectionRequirements) -> CollectionRequirements {
        CollectionRequirements {
            caller: self.caller || other.caller,
            thread: self.thread || other.thread,
            process: self.process || other.process,
            elapsed: self.elapsed || other.elapsed,
        }
    }
}

/// Per-field override mode for explicit `collect` configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CollectMode {
    /// Use whatever the format plan and filter detection decided.
    #[default]
    Auto,
    /// Collect regardless of detection.
    Always,
    /// Never collect, even if the format references the field.
    Never,
}

impl CollectMode {
    fn resolve(self, detected: bool) -> bool {
        match self {
            CollectMode::Auto => detected,
            CollectMode::Always => true,
            CollectMode::Never => false,
        }
    }
}

/// Explicit per-handler override of the detected requirements.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Collect {
    pub caller: CollectMode,
    pub thread: CollectMode,
    pub process: CollectMode,
    pub elapsed: CollectMode,
}

impl Collect {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn caller(mut self, mode: CollectMode) -> Self {
        self.caller = mode;
        self
    }

    #[must_use]
    pub fn thread(mut self, mode: CollectMode) -> Self {
        self.thread = mode;
        self
    }

    #[must_use]
    pub fn process(mut self, mode: CollectMode) -> Self {
        self.process = mode;
        self
    }

    #[must_use]
    pub fn elapsed(mut self, mode: CollectMode) -> Self {
        self.elapsed = mode;
        self
    }

    /// Apply this override on top of detected requirements.
    pub fn apply(&self, detected: CollectionRequirements) -> CollectionRequirements {
        CollectionRequirements {
            caller: self.caller.resolve(detected.caller),
            thread: self.thread.resolve(detected.thread),
            process: self.process.resolve(detected.process),
            elapsed: self.elapsed.resolve(detected.elapsed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_is_or() {
        let a = CollectionRequirements {
            caller: true,
            ..CollectionRequirements::none()
        };
        let b = CollectionRequirements {
            elapsed: true,
            ..CollectionRequirements::none()
        };
        let merged = a.merge(b);
        assert!(merged.caller);
        assert!(merged.elapsed);
        assert!(!merged.thread);
        assert!(!merged.process);
    }

    #[test]
    fn test_all_and_none() {
        assert_eq!(
            CollectionRequirements::none().merge(CollectionRequirements::all()),
            CollectionRequirements::all()
        );
    }

    #[test]
    fn test_collect_override() {
        let detected = CollectionRequirements {
            caller: true,
            thread: false,
            process: false,
            elapsed: true,
        };

        let collect = Collect::new()
            .caller(CollectMode::Never)
            .thread(CollectMode::Always);
        let resolved = collect.apply(detected);

        assert!(!resolved.caller, "Never wins over detection");
        assert!(resolved.thread, "Always wins over detection");
        assert!(!resolved.process, "Auto keeps detection");
        assert!(resolved.elapsed, "Auto keeps detection");
    }
}
