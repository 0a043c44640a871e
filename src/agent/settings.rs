//! Normalized per-plugin scheduling settings.

use std::time::Duration;

use crate::config::PluginEntry;

/// Response token meaning "send an empty line".
pub const NOOP: &str = "noop";

/// Scheduling and response settings for one plugin instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginSettings {
    pub name: String,
    /// Zero means sample inline on every request.
    pub interval: Duration,
    /// Zero disables the staleness check.
    pub staleness_interval: Duration,
    pub staleness_response: String,
    pub stop_timeout: Duration,
    pub default_response: String,
}

impl PluginSettings {
    pub fn from_entry(entry: &PluginEntry) -> Self {
        Self {
            name: entry.name.clone(),
            interval: Duration::from_secs(entry.interval),
            staleness_interval: Duration::from_secs(entry.staleness_interval),
            staleness_response: normalize(&entry.staleness_response),
            stop_timeout: Duration::from_secs(entry.stop_timeout),
            default_response: normalize(&entry.default_response),
        }
    }

    pub fn is_synchronous(&self) -> bool {
        self.interval.is_zero()
    }
}

fn normalize(response: &str) -> String {
    if response == NOOP {
        String::new()
    } else {
        response.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_responses_become_empty() {
        let mut entry = PluginEntry::new("queue", "static");
        entry.default_response = "noop".into();
        entry.staleness_response = "noop".into();
        let settings = PluginSettings::from_entry(&entry);
        assert_eq!(settings.default_response, "");
        assert_eq!(settings.staleness_response, "");

        entry.default_response = "up".into();
        entry.staleness_response = "down".into();
        let settings = PluginSettings::from_entry(&entry);
        assert_eq!(settings.default_response, "up");
        assert_eq!(settings.staleness_response, "down");
    }

    #[test]
    fn defaults() {
        let settings = PluginSettings::from_entry(&PluginEntry::new("queue", "static"));
        assert!(settings.is_synchronous());
        assert_eq!(settings.stop_timeout, Duration::from_secs(10));
        assert!(settings.staleness_interval.is_zero());
    }
}
