use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

/// One agent action or cycle transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub level: Level,
    pub source: String,
    pub action: String,
    pub message: String,
}

/// Where the workflow reports what it is doing. Nothing in the control flow
/// depends on it.
pub trait ActivitySink: Send + Sync {
    fn record(&self, activity: Activity);
}

/// Forwards activity to the `log` facade under `novelist::<source>`.
#[derive(Debug, Default)]
pub struct LogSink;

impl ActivitySink for LogSink {
    fn record(&self, activity: Activity) {
        let target = format!("novelist::{}", activity.source);
        let level = match activity.level {
            Level::Info => log::Level::Info,
            Level::Warn => log::Level::Warn,
            Level::Error => log::Level::Error,
        };
        log::log!(target: &target, level, "[{}] {}", activity.action, activity.message);
    }
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<Activity>>,
}

impl MemorySink {
    pub fn records(&self) -> Vec<Activity> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn count(&self, action: &str) -> usize {
        self.records().iter().filter(|a| a.action == action).count()
    }
}

impl ActivitySink for MemorySink {
    fn record(&self, activity: Activity) {
        if let Ok(mut records) = self.records.lock() {
            records.push(activity);
        }
    }
}
