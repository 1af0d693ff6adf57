use std::sync::Arc;

use anyhow::Error;
use serde_json::Value;

use proxmox_router::cli::*;
use proxmox_schema::api;

use exa_buildcfg::{EXACONF_PKG_RELEASE, EXACONF_PKG_VERSION};

mod exaconf_cli;
use exaconf_cli::*;

#[api]
/// Print the version of this tool.
fn version() -> Result<Value, Error> {
    println!("{}-{}", EXACONF_PKG_VERSION, EXACONF_PKG_RELEASE);
    Ok(Value::Null)
}

fn cli_definition() -> CommandLineInterface {
    let cmd_def = CliCommandMap::new().insert("version", CliCommand::new(&API_METHOD_VERSION));

    let cmd_def = node_commands(cmd_def);
    let cmd_def = volume_commands(cmd_def);
    let cmd_def = storage_commands(cmd_def);
    let cmd_def = user_commands(cmd_def);
    let cmd_def = bucketfs_commands(cmd_def);
    let cmd_def = backup_commands(cmd_def);

    cmd_def.into()
}

fn main() {
    init_cli_logger("EXACONF_LOG", "info");

    let mut args = std::env::args();
    let prefix = args
        .next()
        .and_then(|arg0| {
            std::path::Path::new(&arg0)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| String::from("exaconf"));
    let args: Vec<String> = args.collect();

    // secrets are never logged
    let cmdline = strip_secrets(&args).join(" ");

    let rpcenv = CliEnvironment::new();
    match handle_command(Arc::new(cli_definition()), &prefix, args, rpcenv, None) {
        Ok(()) => log::info!("{} {} - OK", prefix, cmdline),
        Err(err) => {
            log::error!("{} {} - failed: {}", prefix, cmdline, err);
            std::process::exit(1);
        }
    }
}
