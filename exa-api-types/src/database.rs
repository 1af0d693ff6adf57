use anyhow::{bail, Error};

use crate::CRON_FIELD_REGEX;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Periodic backup of a database, scheduled like a cron job.
pub struct BackupSchedule {
    pub name: String,
    /// Name of the target volume or remote volume.
    pub volume: String,
    pub level: u32,
    pub minute: String,
    pub hour: String,
    pub day: String,
    pub month: String,
    pub weekday: String,
    /// Seconds after which a backup expires, 0 means never.
    pub expire: u64,
    pub enabled: bool,
}

impl BackupSchedule {
    /// Check all cron fields of this schedule.
    pub fn verify_cron_fields(&self) -> Result<(), Error> {
        verify_cron_field("minute", &self.minute, 0, 59)?;
        verify_cron_field("hour", &self.hour, 0, 23)?;
        verify_cron_field("day", &self.day, 1, 31)?;
        verify_cron_field("month", &self.month, 1, 12)?;
        verify_cron_field("weekday", &self.weekday, 0, 7)?;
        Ok(())
    }
}

/// Check a cron field (`*`, `*/n`, `a`, `a-b`, `a-b/n`, comma separated) against its value range.
pub fn verify_cron_field(field: &str, value: &str, min: u32, max: u32) -> Result<(), Error> {
    if !CRON_FIELD_REGEX.is_match(value) {
        bail!("invalid cron {} value '{}'", field, value);
    }

    for item in value.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => (range, Some(step)),
            None => (item, None),
        };

        if let Some(step) = step {
            if step.parse::<u32>().map_or(true, |n| n == 0) {
                bail!("invalid step in cron {} value '{}'", field, value);
            }
        }

        if range == "*" {
            continue;
        }

        let (start, end) = range.split_once('-').unwrap_or((range, range));
        let start: u32 = start.parse()?;
        let end: u32 = end.parse()?;

        if start < min || end > max || start > end {
            bail!(
                "cron {} value '{}' out of range ({}-{})",
                field,
                value,
                min,
                max
            );
        }
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Database, as far as exaconf manages it. Databases are created elsewhere.
pub struct Database {
    pub name: String,
    pub data_volume: Option<String>,
    pub nodes: Vec<u64>,
    pub backups: Vec<BackupSchedule>,
}

impl Database {
    pub fn backup(&self, name: &str) -> Option<&BackupSchedule> {
        self.backups.iter().find(|b| b.name == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Settings of the storage service.
pub struct StorageConfig {
    /// Background recovery enabled.
    pub bg_rec_enabled: Option<bool>,
    /// Background recovery throughput limit in MiB/s.
    pub bg_rec_limit: Option<u64>,
    /// Per node space usage warning threshold in percent.
    pub space_warn_threshold: Option<u64>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_verify_cron_field() {
        assert!(verify_cron_field("minute", "*", 0, 59).is_ok());
        assert!(verify_cron_field("minute", "*/15", 0, 59).is_ok());
        assert!(verify_cron_field("minute", "0,30", 0, 59).is_ok());
        assert!(verify_cron_field("hour", "1-5/2", 0, 23).is_ok());
        assert!(verify_cron_field("weekday", "7", 0, 7).is_ok());

        assert!(verify_cron_field("minute", "60", 0, 59).is_err());
        assert!(verify_cron_field("day", "0", 1, 31).is_err());
        assert!(verify_cron_field("hour", "5-1", 0, 23).is_err());
        assert!(verify_cron_field("minute", "*/0", 0, 59).is_err());
        assert!(verify_cron_field("minute", "every", 0, 59).is_err());
        assert!(verify_cron_field("minute", "", 0, 59).is_err());
    }
}
