use exa_api_types::StorageConfig;
use exa_config::{ConfigError, ExaConf};

/// Update the storage service settings. Unset fields keep their value.
pub fn set_storage_conf(conf: &mut ExaConf, update: &StorageConfig) -> Result<StorageConfig, ConfigError> {
    let mut config = conf.storage_config()?;

    if update.bg_rec_enabled.is_some() {
        config.bg_rec_enabled = update.bg_rec_enabled;
    }
    if update.bg_rec_limit.is_some() {
        config.bg_rec_limit = update.bg_rec_limit;
    }
    if update.space_warn_threshold.is_some() {
        config.space_warn_threshold = update.space_warn_threshold;
    }

    conf.set_storage_config(&config)?;
    Ok(config)
}
