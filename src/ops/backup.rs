use exa_api_types::BackupSchedule;
use exa_config::{integrity_err, not_found, ConfigError, ExaConf};

use super::select_keys;

#[derive(Debug, Default, Clone)]
/// Cron fields of a backup schedule, unset fields are `*` for new schedules.
pub struct CronFields {
    pub minute: Option<String>,
    pub hour: Option<String>,
    pub day: Option<String>,
    pub month: Option<String>,
    pub weekday: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewBackupSchedule {
    pub name: String,
    pub volume: String,
    pub level: u32,
    /// Seconds, 0 means never.
    pub expire: u64,
    pub enabled: bool,
    pub cron: CronFields,
}

#[derive(Debug, Default, Clone)]
pub struct BackupScheduleUpdate {
    pub volume: Option<String>,
    pub level: Option<u32>,
    pub expire: Option<u64>,
    pub enabled: Option<bool>,
    pub cron: CronFields,
}

fn cron_field(value: Option<&String>) -> String {
    value.cloned().unwrap_or_else(|| "*".to_string())
}

pub fn add_backup_schedule(
    conf: &mut ExaConf,
    db: &str,
    param: NewBackupSchedule,
) -> Result<(), ConfigError> {
    if conf.database(db)?.backup(&param.name).is_some() {
        return Err(integrity_err!(
            "backup schedule '{}' of database '{}' already exists",
            param.name,
            db
        ));
    }

    let backup = BackupSchedule {
        minute: cron_field(param.cron.minute.as_ref()),
        hour: cron_field(param.cron.hour.as_ref()),
        day: cron_field(param.cron.day.as_ref()),
        month: cron_field(param.cron.month.as_ref()),
        weekday: cron_field(param.cron.weekday.as_ref()),
        name: param.name,
        volume: param.volume,
        level: param.level,
        expire: param.expire,
        enabled: param.enabled,
    };

    conf.upsert_backup(db, &backup)
}

/// Modify one backup schedule of a database, or all of them with `_all`.
pub fn modify_backup_schedule(
    conf: &mut ExaConf,
    db: &str,
    selector: &str,
    update: &BackupScheduleUpdate,
) -> Result<(), ConfigError> {
    let database = conf.database(db)?;
    let names: Vec<String> = database.backups.iter().map(|b| b.name.clone()).collect();

    for name in select_keys(names, selector, Some(selector.to_string()), "backup schedule")? {
        let mut backup = match database.backup(&name) {
            Some(backup) => backup.clone(),
            None => return Err(not_found!("backup schedule '{}' of database '{}'", name, db)),
        };

        if let Some(volume) = &update.volume {
            backup.volume = volume.clone();
        }
        if let Some(level) = update.level {
            backup.level = level;
        }
        if let Some(expire) = update.expire {
            backup.expire = expire;
        }
        if let Some(enabled) = update.enabled {
            backup.enabled = enabled;
        }

        let cron = &update.cron;
        for (field, value) in [
            (&mut backup.minute, &cron.minute),
            (&mut backup.hour, &cron.hour),
            (&mut backup.day, &cron.day),
            (&mut backup.month, &cron.month),
            (&mut backup.weekday, &cron.weekday),
        ] {
            if let Some(value) = value {
                *field = value.clone();
            }
        }

        conf.upsert_backup(db, &backup)?;
    }
    Ok(())
}

pub fn remove_backup_schedule(
    conf: &mut ExaConf,
    db: &str,
    name: &str,
) -> Result<BackupSchedule, ConfigError> {
    conf.remove_backup(db, name)
}
