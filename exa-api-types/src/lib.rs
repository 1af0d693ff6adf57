//! Entity records and API schemas shared by the exaconf crates.

use proxmox_schema::{const_regex, ApiStringFormat, IntegerSchema, Schema, StringSchema};

use exa_tools::units;

#[rustfmt::skip]
#[macro_export]
macro_rules! EXA_SAFE_ID_REGEX_STR { () => { r"(?:[A-Za-z0-9_][A-Za-z0-9._\-]*)" }; }

#[rustfmt::skip]
#[macro_use]
mod local_macros {
    macro_rules! NETWORK_ADDR_STR { () => (r"(?:[0-9a-fA-FxX.:]+)") }
    macro_rules! CRON_ITEM_STR { () => (r"(?:\*|[0-9]+(?:-[0-9]+)?)(?:/[0-9]+)?") }
}

mod bucketfs;
pub use bucketfs::*;

mod database;
pub use database::*;

mod node;
pub use node::*;

mod user;
pub use user::*;

mod volume;
pub use volume::*;

/// Selector accepted by the modify operations to address every entity.
pub const ALL_SELECTOR: &str = "_all";

const_regex! {
    /// Names of volumes, users, groups, BucketFS, buckets, databases, disks and devices.
    pub EXA_SAFE_ID_REGEX = concat!(r"^", EXA_SAFE_ID_REGEX_STR!(), r"$");

    /// Network with an optional `x` placeholder for the node id, e.g. `10.10.10.x/24`.
    pub NETWORK_TEMPLATE_REGEX = concat!(r"^", NETWORK_ADDR_STR!(), r"/[0-9]{1,3}$");

    pub CRON_FIELD_REGEX = concat!(r"^", CRON_ITEM_STR!(), r"(?:,", CRON_ITEM_STR!(), r")*$");

    pub VOLUME_PERM_REGEX = r"^[r-][w-][x-][r-][w-][x-][r-][w-][x-]$";

    pub PASSWORD_REGEX = r"^[[:^cntrl:]]*$"; // everything but control characters

    pub LIST_REGEX = r"^[[:^cntrl:]]*$";

    pub SINGLE_LINE_TEXT_REGEX = r"^[[:^cntrl:]]*$";
}

pub const EXA_SAFE_ID_FORMAT: ApiStringFormat = ApiStringFormat::Pattern(&EXA_SAFE_ID_REGEX);
pub const NETWORK_TEMPLATE_FORMAT: ApiStringFormat =
    ApiStringFormat::Pattern(&NETWORK_TEMPLATE_REGEX);
pub const CRON_FIELD_FORMAT: ApiStringFormat = ApiStringFormat::Pattern(&CRON_FIELD_REGEX);
pub const VOLUME_PERM_FORMAT: ApiStringFormat = ApiStringFormat::Pattern(&VOLUME_PERM_REGEX);
pub const PASSWORD_FORMAT: ApiStringFormat = ApiStringFormat::Pattern(&PASSWORD_REGEX);
pub const LIST_FORMAT: ApiStringFormat = ApiStringFormat::Pattern(&LIST_REGEX);
pub const SINGLE_LINE_TEXT_FORMAT: ApiStringFormat =
    ApiStringFormat::Pattern(&SINGLE_LINE_TEXT_REGEX);

pub const IP_ADDRESS_FORMAT: ApiStringFormat =
    ApiStringFormat::VerifyFn(|s| s.parse::<std::net::IpAddr>().map(drop).map_err(Into::into));
pub const SIZE_FORMAT: ApiStringFormat =
    ApiStringFormat::VerifyFn(|s| units::bytes_from_quantity(s).map(drop).map_err(Into::into));
pub const DURATION_FORMAT: ApiStringFormat =
    ApiStringFormat::VerifyFn(|s| units::seconds_from_duration(s).map(drop).map_err(Into::into));
pub const OWNER_FORMAT: ApiStringFormat =
    ApiStringFormat::VerifyFn(|s| units::parse_owner(s).map(drop).map_err(Into::into));

pub const EXACONF_PATH_SCHEMA: Schema = StringSchema::new(concat!(
    "The EXAConf file (default: '",
    exa_buildcfg::etcdir!("/EXAConf"),
    "')."
))
.min_length(1)
.schema();

pub const ENTITY_NAME_SCHEMA: Schema = StringSchema::new("Entity name.")
    .format(&EXA_SAFE_ID_FORMAT)
    .min_length(1)
    .max_length(128)
    .schema();

pub const NETWORK_SCHEMA: Schema = StringSchema::new(
    "Network in CIDR notation (e.g. '10.10.10.12/24'). Characters 'x' and 'X' in the IP are replaced with the node ID.",
)
.format(&NETWORK_TEMPLATE_FORMAT)
.schema();

pub const IP_ADDRESS_SCHEMA: Schema =
    StringSchema::new("IP address (e.g. '10.10.10.12'). The netmask is not modified.")
        .format(&IP_ADDRESS_FORMAT)
        .schema();

pub const OWNER_SCHEMA: Schema = StringSchema::new("User and group ID, e.g. '1000:1001'.")
    .format(&OWNER_FORMAT)
    .schema();

pub const SIZE_SCHEMA: Schema =
    StringSchema::new("Size, e.g. 1TiB, 20GiB, 20000000B, etc.")
        .format(&SIZE_FORMAT)
        .schema();

pub const DURATION_SCHEMA: Schema =
    StringSchema::new("Duration, e.g. '1w 2d 5m 10s' or plain seconds.")
        .format(&DURATION_FORMAT)
        .schema();

pub const LIST_SCHEMA: Schema = StringSchema::new("Comma-separated list.")
    .format(&LIST_FORMAT)
    .schema();

pub const PASSWORD_SCHEMA: Schema = StringSchema::new("Password.")
    .format(&PASSWORD_FORMAT)
    .min_length(1)
    .max_length(1024)
    .schema();

pub const PORT_SCHEMA: Schema = IntegerSchema::new("Port number (0 = disabled).")
    .minimum(0)
    .maximum(65535)
    .schema();

pub const VOLUME_PERM_SCHEMA: Schema =
    StringSchema::new("Permissions, e.g. 'rw-r--r--' (default: 'rwx------').")
        .format(&VOLUME_PERM_FORMAT)
        .schema();

pub const CRON_FIELD_SCHEMA: Schema = StringSchema::new("Cron job field (default: '*').")
    .format(&CRON_FIELD_FORMAT)
    .schema();
