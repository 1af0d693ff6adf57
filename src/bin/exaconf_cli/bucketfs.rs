use anyhow::{format_err, Error};
use serde_json::Value;

use proxmox_router::cli::*;
use proxmox_schema::api;

use exa_api_types::{
    ENTITY_NAME_SCHEMA, EXACONF_PATH_SCHEMA, LIST_SCHEMA, OWNER_SCHEMA, PASSWORD_SCHEMA,
    PORT_SCHEMA, SINGLE_LINE_TEXT_FORMAT,
};
use exa_tools::json::{bool_param, optional_string_param, optional_u64_param, required_string_param};

use exaconf::ops::{
    self,
    bucketfs::{BucketFsUpdate, BucketUpdate, NewBucket, NewBucketFs},
};

use super::{exaconf_path, list_param, narrow_param, owner_param};

fn port_param(param: &Value, name: &str) -> Result<Option<u16>, Error> {
    narrow_param(param, name)
}

fn opt_string(param: &Value, name: &str) -> Result<Option<String>, Error> {
    Ok(optional_string_param(param, name)?.map(String::from))
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
            owner: {
                schema: OWNER_SCHEMA,
            },
            "http-port": {
                schema: PORT_SCHEMA,
                optional: true,
            },
            "https-port": {
                schema: PORT_SCHEMA,
                optional: true,
            },
            "sync-period": {
                description: "Synchronization period in milliseconds.",
                type: Integer,
                minimum: 1,
                optional: true,
            },
            "sync-key": {
                schema: PASSWORD_SCHEMA,
                optional: true,
            },
            path: {
                description: "Storage directory of the BucketFS.",
                type: String,
                format: &SINGLE_LINE_TEXT_FORMAT,
                optional: true,
            },
        },
    },
)]
/// Add a BucketFS. Omitted ports are disabled, a sync key is generated if none is given.
fn add_bucketfs(param: Value) -> Result<Value, Error> {
    let bucketfs = NewBucketFs {
        name: required_string_param(&param, "name")?.to_string(),
        owner: owner_param(&param, "owner")?
            .ok_or_else(|| format_err!("missing parameter 'owner'"))?,
        http_port: port_param(&param, "http-port")?.unwrap_or(0),
        https_port: port_param(&param, "https-port")?.unwrap_or(0),
        sync_key: opt_string(&param, "sync-key")?,
        sync_period: optional_u64_param(&param, "sync-period")?,
        path: opt_string(&param, "path")?,
    };

    ops::update_exaconf(exaconf_path(&param)?, |conf| {
        ops::bucketfs::add_bucketfs(conf, bucketfs)
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
                description: "BucketFS name or '_all'.",
                type: String,
            },
            owner: {
                schema: OWNER_SCHEMA,
                optional: true,
            },
            "http-port": {
                schema: PORT_SCHEMA,
                optional: true,
            },
            "https-port": {
                schema: PORT_SCHEMA,
                optional: true,
            },
            "sync-period": {
                description: "Synchronization period in milliseconds.",
                type: Integer,
                minimum: 1,
                optional: true,
            },
        },
    },
)]
/// Modify one or all BucketFS.
fn modify_bucketfs(param: Value) -> Result<Value, Error> {
    let selector = required_string_param(&param, "name")?;
    let update = BucketFsUpdate {
        owner: owner_param(&param, "owner")?,
        http_port: port_param(&param, "http-port")?,
        https_port: port_param(&param, "https-port")?,
        sync_period: optional_u64_param(&param, "sync-period")?,
    };

    ops::update_exaconf(exaconf_path(&param)?, |conf| {
        ops::bucketfs::modify_bucketfs(conf, selector, &update)
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
                description: "Remove the BucketFS together with its buckets.",
                type: bool,
                optional: true,
                default: false,
            },
        },
    },
)]
/// Remove a BucketFS.
fn remove_bucketfs(param: Value) -> Result<Value, Error> {
    let name = required_string_param(&param, "name")?;
    let force = bool_param(&param, "force")?;

    ops::update_exaconf(exaconf_path(&param)?, |conf| {
        ops::bucketfs::remove_bucketfs(conf, name, force)
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
            "bfs-name": {
                schema: ENTITY_NAME_SCHEMA,
            },
            public: {
                description: "Allow reading without password.",
                type: bool,
                optional: true,
                default: false,
            },
            "read-passwd": {
                schema: PASSWORD_SCHEMA,
                optional: true,
            },
            "write-passwd": {
                schema: PASSWORD_SCHEMA,
                optional: true,
            },
            "additional-files": {
                schema: LIST_SCHEMA,
                optional: true,
            },
        },
    },
)]
/// Add a bucket to a BucketFS. Omitted passwords are generated.
fn add_bucket(param: Value) -> Result<Value, Error> {
    let bucketfs = required_string_param(&param, "bfs-name")?;
    let bucket = NewBucket {
        name: required_string_param(&param, "name")?.to_string(),
        public: bool_param(&param, "public")?,
        read_passwd: opt_string(&param, "read-passwd")?,
        write_passwd: opt_string(&param, "write-passwd")?,
        additional_files: list_param(&param, "additional-files")?.unwrap_or_default(),
    };

    ops::update_exaconf(exaconf_path(&param)?, |conf| {
        ops::bucketfs::add_bucket(conf, bucketfs, bucket)
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
                description: "Bucket name or '_all'.",
                type: String,
            },
            "bfs-name": {
                schema: ENTITY_NAME_SCHEMA,
            },
            public: {
                description: "Allow reading without password.",
                type: bool,
                optional: true,
            },
            "read-passwd": {
                schema: PASSWORD_SCHEMA,
                optional: true,
            },
            "write-passwd": {
                schema: PASSWORD_SCHEMA,
                optional: true,
            },
            "additional-files": {
                schema: LIST_SCHEMA,
                optional: true,
            },
        },
    },
)]
/// Modify one or all buckets of a BucketFS.
fn modify_bucket(param: Value) -> Result<Value, Error> {
    let selector = required_string_param(&param, "name")?;
    let bucketfs = required_string_param(&param, "bfs-name")?;
    let update = BucketUpdate {
        public: param["public"].as_bool(),
        read_passwd: opt_string(&param, "read-passwd")?,
        write_passwd: opt_string(&param, "write-passwd")?,
        additional_files: list_param(&param, "additional-files")?,
    };

    ops::update_exaconf(exaconf_path(&param)?, |conf| {
        ops::bucketfs::modify_bucket(conf, bucketfs, selector, &update)
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
            "bfs-name": {
                schema: ENTITY_NAME_SCHEMA,
            },
        },
    },
)]
/// Remove a bucket from a BucketFS.
fn remove_bucket(param: Value) -> Result<Value, Error> {
    let name = required_string_param(&param, "name")?;
    let bucketfs = required_string_param(&param, "bfs-name")?;

    ops::update_exaconf(exaconf_path(&param)?, |conf| {
        ops::bucketfs::remove_bucket(conf, bucketfs, name)
    })?;

    Ok(Value::Null)
}

pub fn bucketfs_commands(cmd_def: CliCommandMap) -> CliCommandMap {
    cmd_def
        .insert(
            "add-bucketfs",
            CliCommand::new(&API_METHOD_ADD_BUCKETFS).arg_param(&["exaconf"]),
        )
        .insert(
            "modify-bucketfs",
            CliCommand::new(&API_METHOD_MODIFY_BUCKETFS).arg_param(&["exaconf"]),
        )
        .insert(
            "remove-bucketfs",
            CliCommand::new(&API_METHOD_REMOVE_BUCKETFS).arg_param(&["exaconf"]),
        )
        .insert(
            "add-bucket",
            CliCommand::new(&API_METHOD_ADD_BUCKET).arg_param(&["exaconf"]),
        )
        .insert(
            "modify-bucket",
            CliCommand::new(&API_METHOD_MODIFY_BUCKET).arg_param(&["exaconf"]),
        )
        .insert(
            "remove-bucket",
            CliCommand::new(&API_METHOD_REMOVE_BUCKET).arg_param(&["exaconf"]),
        )
}
