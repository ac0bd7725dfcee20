use crate::monitor::thresholds::ThresholdConfig;
use crate::store::keys;
use crate::store::{Store, StoreError};

const THRESHOLDS: &str = "thresholds";

impl Store {
    pub fn load_threshold_config(&self) -> Result<Option<ThresholdConfig>, StoreError> {
        let key = keys::config_latest_key(THRESHOLDS);
        match self.config_versions.get(key.as_bytes())? {
            Some(raw) => match Self::deserialize::<ThresholdConfig>(&raw) {
                Ok(parsed) => Ok(Some(parsed)),
                Err(error) => {
                    tracing::error!(error = %error, "Failed to deserialize threshold config");
                    Err(error)
                }
            },
            None => Ok(None),
        }
    }

    /// Persist `config` as the latest record and archive it under its version.
    pub fn save_threshold_config(&self, config: &ThresholdConfig) -> Result<(), StoreError> {
        let bytes = Self::serialize(config)?;
        let mut batch = sled::Batch::default();
        batch.insert(
            keys::config_version_key(THRESHOLDS, config.version).as_bytes(),
            bytes.clone(),
        );
        batch.insert(keys::config_latest_key(THRESHOLDS).as_bytes(), bytes);
        self.config_versions.apply_batch(batch)?;
        Ok(())
    }

    pub fn get_threshold_config_version(
        &self,
        version: u32,
    ) -> Result<ThresholdConfig, StoreError> {
        let key = keys::config_version_key(THRESHOLDS, version);
        match self.config_versions.get(key.as_bytes())? {
            Some(raw) => Self::deserialize(&raw),
            None => Err(StoreError::NotFound {
                entity: THRESHOLDS.to_string(),
                key,
            }),
        }
    }
}
