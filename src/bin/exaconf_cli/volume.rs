use anyhow::{format_err, Error};
use serde_json::Value;

use proxmox_router::cli::*;
use proxmox_schema::api;

use exa_api_types::{
    RemoteVolumeType, VolumeType, ENTITY_NAME_SCHEMA, EXACONF_PATH_SCHEMA, LIST_SCHEMA,
    OWNER_SCHEMA, PASSWORD_SCHEMA, SINGLE_LINE_TEXT_FORMAT, SIZE_SCHEMA, VOLUME_PERM_SCHEMA,
};
use exa_tools::json::{bool_param, optional_string_param, optional_u64_param, required_string_param};

use exaconf::ops::{
    self,
    remote_volume::NewRemoteVolume,
    volume::{NewVolume, VolumeUpdate},
};

use super::{exaconf_path, list_param, narrow_param, owner_param, size_param};

fn node_list(param: &Value) -> Result<Option<Vec<u64>>, Error> {
    match list_param(param, "nodes")? {
        Some(list) => list
            .iter()
            .map(|id| {
                id.parse()
                    .map_err(|_| format_err!("invalid node ID '{}'", id))
            })
            .collect::<Result<Vec<u64>, Error>>()
            .map(Some),
        None => Ok(None),
    }
}

fn required<T>(value: Option<T>, name: &str) -> Result<T, Error> {
    value.ok_or_else(|| format_err!("missing parameter '{}'", name))
}

#[api(
    input: {
        properties: {
            exaconf: {
                schema: EXACONF_PATH_SCHEMA,
                optional: true,
            },
            name: {
                schema: ENTITY_NAME_SCHEMA,
            },
            "type": {
                type: VolumeType,
            },
            size: {
                schema: SIZE_SCHEMA,
            },
            disk: {
                schema: ENTITY_NAME_SCHEMA,
            },
            redundancy: {
                description: "Redundancy level.",
                type: Integer,
                minimum: 1,
            },
            nodes: {
                schema: LIST_SCHEMA,
            },
            "num-master-nodes": {
                description: "Number of master nodes (default: all nodes).",
                type: Integer,
                minimum: 1,
                optional: true,
            },
            owner: {
                schema: OWNER_SCHEMA,
            },
            perm: {
                schema: VOLUME_PERM_SCHEMA,
                optional: true,
            },
            labels: {
                schema: LIST_SCHEMA,
                optional: true,
            },
            "block-size": {
                schema: SIZE_SCHEMA,
                optional: true,
            },
            "stripe-size": {
                schema: SIZE_SCHEMA,
                optional: true,
            },
        },
    },
)]
/// Add a storage volume.
fn add_volume(param: Value) -> Result<Value, Error> {
    let volume = NewVolume {
        name: required_string_param(&param, "name")?.to_string(),
        vol_type: required_string_param(&param, "type")?.parse()?,
        size: required(size_param(&param, "size")?, "size")?,
        disk: required_string_param(&param, "disk")?.to_string(),
        redundancy: required(narrow_param(&param, "redundancy")?, "redundancy")?,
        nodes: required(node_list(&param)?, "nodes")?,
        owner: required(owner_param(&param, "owner")?, "owner")?,
        num_master_nodes: narrow_param(&param, "num-master-nodes")?,
        perm: optional_string_param(&param, "perm")?.map(String::from),
        labels: list_param(&param, "labels")?.unwrap_or_default(),
        block_size: size_param(&param, "block-size")?,
        stripe_size: size_param(&param, "stripe-size")?,
    };

    ops::update_exaconf(exaconf_path(&param)?, |conf| {
        ops::volume::add_volume(conf, volume)
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
            name: {
                description: "Volume name or '_all'.",
                type: String,
            },
            owner: {
                schema: OWNER_SCHEMA,
                optional: true,
            },
            size: {
                schema: SIZE_SCHEMA,
                optional: true,
            },
            disk: {
                schema: ENTITY_NAME_SCHEMA,
                optional: true,
            },
            nodes: {
                schema: LIST_SCHEMA,
                optional: true,
            },
            "num-master-nodes": {
                description: "Number of master nodes.",
                type: Integer,
                minimum: 1,
                optional: true,
            },
            redundancy: {
                description: "Redundancy level.",
                type: Integer,
                minimum: 1,
                optional: true,
            },
            labels: {
                schema: LIST_SCHEMA,
                optional: true,
            },
        },
    },
)]
/// Modify one or all storage volumes.
fn modify_volume(param: Value) -> Result<Value, Error> {
    let selector = required_string_param(&param, "name")?;
    let update = VolumeUpdate {
        owner: owner_param(&param, "owner")?,
        size: size_param(&param, "size")?,
        disk: optional_string_param(&param, "disk")?.map(String::from),
        nodes: node_list(&param)?,
        num_master_nodes: narrow_param(&param, "num-master-nodes")?,
        redundancy: narrow_param(&param, "redundancy")?,
        labels: list_param(&param, "labels")?,
    };

    ops::update_exaconf(exaconf_path(&param)?, |conf| {
        ops::volume::modify_volume(conf, selector, &update)
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
            name: {
                schema: ENTITY_NAME_SCHEMA,
            },
            force: {
                description: "Remove the volume even if databases still use it.",
                type: bool,
                optional: true,
                default: false,
            },
        },
    },
)]
/// Remove a storage volume.
fn remove_volume(param: Value) -> Result<Value, Error> {
    let name = required_string_param(&param, "name")?;
    let force = bool_param(&param, "force")?;

    ops::update_exaconf(exaconf_path(&param)?, |conf| {
        ops::volume::remove_volume(conf, name, force)
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
            name: {
                schema: ENTITY_NAME_SCHEMA,
                optional: true,
            },
            "type": {
                type: RemoteVolumeType,
            },
            owner: {
                schema: OWNER_SCHEMA,
            },
            id: {
                description: "Remote volume ID (default: lowest unused ID).",
                type: Integer,
                minimum: 10000,
                optional: true,
            },
            url: {
                description: "URL of the remote storage.",
                type: String,
                format: &SINGLE_LINE_TEXT_FORMAT,
            },
            username: {
                description: "User name on the remote storage.",
                type: String,
                format: &SINGLE_LINE_TEXT_FORMAT,
                optional: true,
            },
            passwd: {
                schema: PASSWORD_SCHEMA,
                optional: true,
            },
            options: {
                description: "Type specific options.",
                type: String,
                format: &SINGLE_LINE_TEXT_FORMAT,
                optional: true,
            },
            labels: {
                schema: LIST_SCHEMA,
                optional: true,
            },
        },
    },
)]
/// Add a remote volume. A name is generated if none is given.
fn add_remote_volume(param: Value) -> Result<Value, Error> {
    let opt = |name: &str| -> Result<Option<String>, Error> {
        Ok(optional_string_param(&param, name)?.map(String::from))
    };
    let volume = NewRemoteVolume {
        name: opt("name")?,
        id: optional_u64_param(&param, "id")?,
        vol_type: required_string_param(&param, "type")?.parse()?,
        url: required_string_param(&param, "url")?.to_string(),
        owner: required(owner_param(&param, "owner")?, "owner")?,
        username: opt("username")?,
        password: opt("passwd")?,
        options: opt("options")?,
        labels: list_param(&param, "labels")?.unwrap_or_default(),
    };

    ops::update_exaconf(exaconf_path(&param)?, |conf| {
        ops::remote_volume::add_remote_volume(conf, volume)
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
            name: {
                schema: ENTITY_NAME_SCHEMA,
            },
            force: {
                description: "Remove the volume even if backup schedules still use it.",
                type: bool,
                optional: true,
                default: false,
            },
        },
    },
)]
/// Remove a remote volume.
fn remove_remote_volume(param: Value) -> Result<Value, Error> {
    let name = required_string_param(&param, "name")?;
    let force = bool_param(&param, "force")?;

    ops::update_exaconf(exaconf_path(&param)?, |conf| {
        ops::remote_volume::remove_remote_volume(conf, name, force)
    })?;

    Ok(Value::Null)
}

pub fn volume_commands(cmd_def: CliCommandMap) -> CliCommandMap {
    cmd_def
        .insert(
            "add-volume",
            CliCommand::new(&API_METHOD_ADD_VOLUME).arg_param(&["exaconf"]),
        )
        .insert(
            "modify-volume",
            CliCommand::new(&API_METHOD_MODIFY_VOLUME).arg_param(&["exaconf"]),
        )
        .insert(
            "remove-volume",
            CliCommand::new(&API_METHOD_REMOVE_VOLUME).arg_param(&["exaconf"]),
        )
        .insert(
            "add-remote-volume",
            CliCommand::new(&API_METHOD_ADD_REMOTE_VOLUME).arg_param(&["exaconf"]),
        )
        .insert(
            "remove-remote-volume",
            CliCommand::new(&API_METHOD_REMOVE_REMOTE_VOLUME).arg_param(&["exaconf"]),
        )
}
