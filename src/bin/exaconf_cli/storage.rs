use anyhow::Error;
use serde_json::Value;

use proxmox_router::cli::*;
use proxmox_schema::api;

use exa_api_types::{StorageConfig, EXACONF_PATH_SCHEMA};
use exa_tools::json::optional_u64_param;

use exaconf::ops;

use super::exaconf_path;

#[api(
    input: {
        properties: {
            exaconf: {
                schema: EXACONF_PATH_SCHEMA,
                optional: true,
            },
            "bg-rec-enabled": {
                description: "Enable or disable background recovery.",
                type: bool,
                optional: true,
            },
            "bg-rec-limit": {
                description: "Background recovery throughput limit in MiB/s.",
                type: Integer,
                minimum: 0,
                optional: true,
            },
            "space-warn-threshold": {
                description: "Per node space usage warning threshold in percent.",
                type: Integer,
                minimum: 0,
                maximum: 100,
                optional: true,
            },
        },
    },
)]
/// Change the storage settings. Omitted settings keep their current value.
fn set_storage_conf(param: Value) -> Result<Value, Error> {
    let update = StorageConfig {
        bg_rec_enabled: param["bg-rec-enabled"].as_bool(),
        bg_rec_limit: optional_u64_param(&param, "bg-rec-limit")?,
        space_warn_threshold: optional_u64_param(&param, "space-warn-threshold")?,
    };

    let (config, _) = ops::update_exaconf(exaconf_path(&param)?, |conf| {
        ops::storage::set_storage_conf(conf, &update)
    })?;
    log::debug!("storage settings: {:?}", config);

    Ok(Value::Null)
}

pub fn storage_commands(cmd_def: CliCommandMap) -> CliCommandMap {
    cmd_def.insert(
        "set-storage-conf",
        CliCommand::new(&API_METHOD_SET_STORAGE_CONF).arg_param(&["exaconf"]),
    )
}
