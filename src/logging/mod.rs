//! # Logging Collaborator
//!
//! An optional observer the membrane notifies at stable points: object
//! creation, wrapper creation, call entry/exit, and listener errors. Purely
//! observational — a logger never affects control flow.
//!
//! Every emission point also fires a `tracing` event, so a host subscriber
//! sees the same stream without attaching a collaborator.

use parking_lot::Mutex;

/// Message severity, ordered from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// The collaborator contract. Implementations must tolerate being called
/// from nested conversion frames.
pub trait MembraneLogger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);
}

// ============================================================================
// MemoryLogger
// ============================================================================

/// Collecting logger with a severity threshold.
///
/// Tests use it to assert ordering: listener callbacks and membrane emission
/// points land in one sequential record.
pub struct MemoryLogger {
    threshold: Mutex<LogLevel>,
    events: Mutex<Vec<(LogLevel, String)>>,
}

impl MemoryLogger {
    /// Threshold defaults to `Info`, keeping the membrane's own debug-level
    /// chatter out of recorded sequences.
    pub fn new() -> Self {
        Self {
            threshold: Mutex::new(LogLevel::Info),
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn set_threshold(&self, level: LogLevel) {
        *self.threshold.lock() = level;
    }

    /// Recorded messages, in emission order.
    pub fn messages(&self) -> Vec<String> {
        self.events.lock().iter().map(|(_, m)| m.clone()).collect()
    }

    /// Recorded (level, message) pairs, in emission order.
    pub fn events(&self) -> Vec<(LogLevel, String)> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Default for MemoryLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl MembraneLogger for MemoryLogger {
    fn log(&self, level: LogLevel, message: &str) {
        if level >= *self.threshold.lock() {
            self.events.lock().push((level, message.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_filters() {
        let logger = MemoryLogger::new();
        logger.log(LogLevel::Debug, "hidden");
        logger.log(LogLevel::Info, "kept");
        logger.log(LogLevel::Error, "also kept");
        assert_eq!(logger.messages(), vec!["kept", "also kept"]);
    }

    #[test]
    fn test_lowered_threshold() {
        let logger = MemoryLogger::new();
        logger.set_threshold(LogLevel::Trace);
        logger.log(LogLevel::Debug, "now visible");
        assert_eq!(logger.messages(), vec!["now visible"]);
    }

    #[test]
    fn test_clear() {
        let logger = MemoryLogger::new();
        logger.log(LogLevel::Info, "a");
        logger.clear();
        assert!(logger.messages().is_empty());
    }
}
