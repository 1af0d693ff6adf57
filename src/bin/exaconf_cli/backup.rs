use anyhow::{bail, Error};
use serde_json::Value;

use proxmox_router::cli::*;
use proxmox_schema::api;

use exa_api_types::{CRON_FIELD_SCHEMA, DURATION_SCHEMA, ENTITY_NAME_SCHEMA, EXACONF_PATH_SCHEMA};
use exa_tools::json::{bool_param, optional_string_param, required_string_param};

use exaconf::ops::{
    self,
    backup::{BackupScheduleUpdate, CronFields, NewBackupSchedule},
};

use super::{duration_param, exaconf_path, narrow_param};

fn cron_fields(param: &Value) -> Result<CronFields, Error> {
    let field = |name: &str| -> Result<Option<String>, Error> {
        Ok(optional_string_param(param, name)?.map(String::from))
    };
    Ok(CronFields {
        minute: field("minute")?,
        hour: field("hour")?,
        day: field("day")?,
        month: field("month")?,
        weekday: field("weekday")?,
    })
}

#[api(
    input: {
        properties: {
            exaconf: {
                schema: EXACONF_PATH_SCHEMA,
                optional: true,
            },
            "db-name": {
                schema: ENTITY_NAME_SCHEMA,
            },
            "backup-name": {
                schema: ENTITY_NAME_SCHEMA,
            },
            volume: {
                schema: ENTITY_NAME_SCHEMA,
            },
            level: {
                description: "Backup level (0 = full backup).",
                type: Integer,
                minimum: 0,
            },
            expire: {
                schema: DURATION_SCHEMA,
                optional: true,
            },
            disabled: {
                description: "Add the schedule disabled.",
                type: bool,
                optional: true,
                default: false,
            },
            minute: {
                schema: CRON_FIELD_SCHEMA,
                optional: true,
            },
            hour: {
                schema: CRON_FIELD_SCHEMA,
                optional: true,
            },
            day: {
                schema: CRON_FIELD_SCHEMA,
                optional: true,
            },
            month: {
                schema: CRON_FIELD_SCHEMA,
                optional: true,
            },
            weekday: {
                schema: CRON_FIELD_SCHEMA,
                optional: true,
            },
        },
    },
)]
/// Add a backup schedule to a database. Backups never expire unless `expire` is given.
fn add_backup_schedule(param: Value) -> Result<Value, Error> {
    let db = required_string_param(&param, "db-name")?;
    let level = match narrow_param(&param, "level")? {
        Some(level) => level,
        None => bail!("missing parameter 'level'"),
    };

    let schedule = NewBackupSchedule {
        name: required_string_param(&param, "backup-name")?.to_string(),
        volume: required_string_param(&param, "volume")?.to_string(),
        level,
        expire: duration_param(&param, "expire")?.unwrap_or(0),
        enabled: !bool_param(&param, "disabled")?,
        cron: cron_fields(&param)?,
    };

    ops::update_exaconf(exaconf_path(&param)?, |conf| {
        ops::backup::add_backup_schedule(conf, db, schedule)
    })?;

    Ok(Value::Null)
}

#[api(
    input: {
        properties: {
            exaconf: {
                schema: EXACONF_PATH_SCHEMA,
                optional: true,
            },
            "db-name": {
                schema: ENTITY_NAME_SCHEMA,
            },
            "backup-name": {
                description: "Backup schedule name or '_all'.",
                type: String,
            },
            volume: {
                schema: ENTITY_NAME_SCHEMA,
                optional: true,
            },
            level: {
                description: "Backup level (0 = full backup).",
                type: Integer,
                minimum: 0,
                optional: true,
            },
            expire: {
                schema: DURATION_SCHEMA,
                optional: true,
            },
            disabled: {
                description: "Disable the schedule.",
                type: bool,
                optional: true,
                default: false,
            },
            enabled: {
                description: "Enable the schedule.",
                type: bool,
                optional: true,
                default: false,
            },
            minute: {
                schema: CRON_FIELD_SCHEMA,
                optional: true,
            },
            hour: {
                schema: CRON_FIELD_SCHEMA,
                optional: true,
            },
            day: {
                schema: CRON_FIELD_SCHEMA,
                optional: true,
            },
            month: {
                schema: CRON_FIELD_SCHEMA,
                optional: true,
            },
            weekday: {
                schema: CRON_FIELD_SCHEMA,
                optional: true,
            },
        },
    },
)]
/// Modify one or all backup schedules of a database.
fn modify_backup_schedule(param: Value) -> Result<Value, Error> {
    let db = required_string_param(&param, "db-name")?;
    let selector = required_string_param(&param, "backup-name")?;

    let enabled = match (bool_param(&param, "enabled")?, bool_param(&param, "disabled")?) {
        (true, true) => bail!("'enabled' and 'disabled' are mutually exclusive"),
        (true, false) => Some(true),
        (false, true) => Some(false),
        (false, false) => None,
    };

    let update = BackupScheduleUpdate {
        volume: optional_string_param(&param, "volume")?.map(String::from),
        level: narrow_param(&param, "level")?,
        expire: duration_param(&param, "expire")?,
        enabled,
        cron: cron_fields(&param)?,
    };

    ops::update_exaconf(exaconf_path(&param)?, |conf| {
        ops::backup::modify_backup_schedule(conf, db, selector, &update)
    })?;

    Ok(Value::Null)
}

#[api(
    input: {
        properties: {
            exaconf: {
                schema: EXACONF_PATH_SCHEMA,
                optional: true,
            },
            "db-name": {
                schema: ENTITY_NAME_SCHEMA,
            },
            "backup-name": {
                schema: ENTITY_NAME_SCHEMA,
            },
        },
    },
)]
/// Remove a backup schedule from a database.
fn remove_backup_schedule(param: Value) -> Result<Value, Error> {
    let db = required_string_param(&param, "db-name")?;
    let name = required_string_param(&param, "backup-name")?;

    ops::update_exaconf(exaconf_path(&param)?, |conf| {
        ops::backup::remove_backup_schedule(conf, db, name)
    })?;

    Ok(Value::Null)
}

pub fn backup_commands(cmd_def: CliCommandMap) -> CliCommandMap {
    cmd_def
        .insert(
            "add-backup-schedule",
            CliCommand::new(&API_METHOD_ADD_BACKUP_SCHEDULE).arg_param(&["exaconf"]),
        )
        .insert(
            "modify-backup-schedule",
            CliCommand::new(&API_METHOD_MODIFY_BACKUP_SCHEDULE).arg_param(&["exaconf"]),
        )
        .insert(
            "remove-backup-schedule",
            CliCommand::new(&API_METHOD_REMOVE_BACKUP_SCHEDULE).arg_param(&["exaconf"]),
        )
}
