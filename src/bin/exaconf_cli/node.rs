use anyhow::{format_err, Error};
use serde_json::Value;

use proxmox_router::cli::*;
use proxmox_schema::api;

use exa_api_types::{
    Disk, ENTITY_NAME_SCHEMA, EXACONF_PATH_SCHEMA, IP_ADDRESS_SCHEMA, LIST_SCHEMA, NETWORK_SCHEMA,
    SINGLE_LINE_TEXT_FORMAT,
};
use exa_buildcfg::DEFAULT_DISK_COMPONENT;
use exa_tools::json::{bool_param, optional_string_param, optional_u64_param, required_string_param};

use exaconf::ops::{self, node::NodeUpdate};

use super::{exaconf_path, list_param};

fn required_node_id(param: &Value) -> Result<u64, Error> {
    optional_u64_param(param, "node-id")?.ok_or_else(|| format_err!("missing parameter 'node-id'"))
}

#[api(
    input: {
        properties: {
            exaconf: {
                schema: EXACONF_PATH_SCHEMA,
                optional: true,
            },
            "priv-net": {
                schema: NETWORK_SCHEMA,
            },
            "pub-net": {
                schema: NETWORK_SCHEMA,
                optional: true,
            },
            "node-id": {
                description: "Node ID (default: lowest unused ID).",
                type: Integer,
                minimum: 1,
                optional: true,
            },
        },
    },
)]
/// Add a node.
fn add_node(param: Value) -> Result<Value, Error> {
    let priv_net = required_string_param(&param, "priv-net")?;
    let pub_net = optional_string_param(&param, "pub-net")?;
    let node_id = optional_u64_param(&param, "node-id")?;

    ops::update_exaconf(exaconf_path(&param)?, |conf| {
        ops::node::add_node(conf, node_id, priv_net, pub_net)
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
            "node-id": {
                description: "Node ID or '_all'.",
                type: String,
            },
            "priv-net": {
                schema: NETWORK_SCHEMA,
                optional: true,
            },
            "pub-net": {
                schema: NETWORK_SCHEMA,
                optional: true,
            },
            "priv-ip": {
                schema: IP_ADDRESS_SCHEMA,
                optional: true,
            },
            "pub-ip": {
                schema: IP_ADDRESS_SCHEMA,
                optional: true,
            },
        },
    },
)]
/// Modify the network configuration of one or all nodes.
fn modify_node(param: Value) -> Result<Value, Error> {
    let selector = required_string_param(&param, "node-id")?;
    let opt = |name: &str| -> Result<Option<String>, Error> {
        Ok(optional_string_param(&param, name)?.map(String::from))
    };
    let update = NodeUpdate {
        priv_net: opt("priv-net")?,
        priv_ip: opt("priv-ip")?,
        pub_net: opt("pub-net")?,
        pub_ip: opt("pub-ip")?,
    };

    ops::update_exaconf(exaconf_path(&param)?, |conf| {
        ops::node::modify_node(conf, selector, &update)
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
            "node-id": {
                description: "Node ID.",
                type: Integer,
                minimum: 1,
            },
            force: {
                description: "Remove the node even if volumes or databases still use it.",
                type: bool,
                optional: true,
                default: false,
            },
        },
    },
)]
/// Remove a node.
fn remove_node(param: Value) -> Result<Value, Error> {
    let node_id = required_node_id(&param)?;
    let force = bool_param(&param, "force")?;

    ops::update_exaconf(exaconf_path(&param)?, |conf| {
        ops::node::remove_node(conf, node_id, force)
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
            "node-id": {
                description: "Node ID.",
                type: Integer,
                minimum: 1,
            },
            disk: {
                schema: ENTITY_NAME_SCHEMA,
            },
            component: {
                description: "Storage component using the disk (default: 'exastorage').",
                type: String,
                format: &SINGLE_LINE_TEXT_FORMAT,
                optional: true,
            },
            devices: {
                schema: LIST_SCHEMA,
                optional: true,
            },
            drives: {
                schema: LIST_SCHEMA,
                optional: true,
            },
            "overwrite-existing": {
                description: "Replace an existing disk of the same name.",
                type: bool,
                optional: true,
                default: false,
            },
        },
    },
)]
/// Add a storage disk to a node.
fn add_node_disk(param: Value) -> Result<Value, Error> {
    let node_id = required_node_id(&param)?;
    let name = required_string_param(&param, "disk")?;
    let component = optional_string_param(&param, "component")?.unwrap_or(DEFAULT_DISK_COMPONENT);

    let mut disk = Disk::new(name, component);
    disk.devices = list_param(&param, "devices")?.unwrap_or_default();
    disk.drives = list_param(&param, "drives")?.unwrap_or_default();
    let overwrite_existing = bool_param(&param, "overwrite-existing")?;

    ops::update_exaconf(exaconf_path(&param)?, |conf| {
        ops::node::add_node_disk(conf, node_id, disk, overwrite_existing)
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
            "node-id": {
                description: "Node ID.",
                type: Integer,
                minimum: 1,
            },
            disk: {
                description: "Disk name or 'all'.",
                type: String,
            },
            force: {
                description: "Remove disks even if volumes still use them.",
                type: bool,
                optional: true,
                default: false,
            },
        },
    },
)]
/// Remove one or all storage disks of a node.
fn remove_node_disk(param: Value) -> Result<Value, Error> {
    let node_id = required_node_id(&param)?;
    let disk = required_string_param(&param, "disk")?;
    let force = bool_param(&param, "force")?;

    ops::update_exaconf(exaconf_path(&param)?, |conf| {
        ops::node::remove_node_disk(conf, node_id, disk, force)
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
            "node-id": {
                description: "Node ID.",
                type: Integer,
                minimum: 1,
            },
            disk: {
                schema: ENTITY_NAME_SCHEMA,
            },
            device: {
                schema: ENTITY_NAME_SCHEMA,
            },
            path: {
                description: "Directory of the device, if not located in the default storage directory.",
                type: String,
                format: &SINGLE_LINE_TEXT_FORMAT,
                optional: true,
            },
        },
    },
)]
/// Add a device to a storage disk of a node. The disk is created if it does not exist.
fn add_node_device(param: Value) -> Result<Value, Error> {
    let node_id = required_node_id(&param)?;
    let disk = required_string_param(&param, "disk")?;
    let device = required_string_param(&param, "device")?;
    let path = optional_string_param(&param, "path")?;

    ops::update_exaconf(exaconf_path(&param)?, |conf| {
        ops::node::add_node_device(conf, node_id, disk, device, path)
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
            "node-id": {
                description: "Node ID.",
                type: Integer,
                minimum: 1,
            },
            disk: {
                schema: ENTITY_NAME_SCHEMA,
            },
            device: {
                schema: ENTITY_NAME_SCHEMA,
            },
        },
    },
)]
/// Remove a device from a storage disk of a node. A disk without devices is removed.
fn remove_node_device(param: Value) -> Result<Value, Error> {
    let node_id = required_node_id(&param)?;
    let disk = required_string_param(&param, "disk")?;
    let device = required_string_param(&param, "device")?;

    ops::update_exaconf(exaconf_path(&param)?, |conf| {
        ops::node::remove_node_device(conf, node_id, disk, device)
    })?;

    Ok(Value::Null)
}

pub fn node_commands(cmd_def: CliCommandMap) -> CliCommandMap {
    cmd_def
        .insert(
            "add-node",
            CliCommand::new(&API_METHOD_ADD_NODE).arg_param(&["exaconf"]),
        )
        .insert(
            "modify-node",
            CliCommand::new(&API_METHOD_MODIFY_NODE).arg_param(&["exaconf"]),
        )
        .insert(
            "remove-node",
            CliCommand::new(&API_METHOD_REMOVE_NODE).arg_param(&["exaconf"]),
        )
        .insert(
            "add-node-disk",
            CliCommand::new(&API_METHOD_ADD_NODE_DISK).arg_param(&["exaconf"]),
        )
        .insert(
            "remove-node-disk",
            CliCommand::new(&API_METHOD_REMOVE_NODE_DISK).arg_param(&["exaconf"]),
        )
        .insert(
            "add-node-device",
            CliCommand::new(&API_METHOD_ADD_NODE_DEVICE).arg_param(&["exaconf"]),
        )
        .insert(
            "remove-node-device",
            CliCommand::new(&API_METHOD_REMOVE_NODE_DEVICE).arg_param(&["exaconf"]),
        )
}
