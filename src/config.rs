use crate::error::EdlockError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurabilityMode {
    Full,
    OsBuffered,
}

/// Runtime configuration for the lock subsystem.
#[derive(Debug, Clone)]
pub struct EdlockConfig {
    pub durability_mode: DurabilityMode,
    /// File name of the durable lock table inside the lock directory. The
    /// backup copy and the flock sidecar derive their names from it.
    pub table_file: String,
    pub max_snapshot_attributes: usize,
}

impl Default for EdlockConfig {
    fn default() -> Self {
        Self {
            durability_mode: DurabilityMode::Full,
            table_file: "locks.json".to_string(),
            max_snapshot_attributes: 512,
        }
    }
}

impl EdlockConfig {
    pub fn production() -> Self {
        Self {
            durability_mode: DurabilityMode::Full,
            ..Self::default()
        }
    }

    pub fn development() -> Self {
        Self {
            durability_mode: DurabilityMode::OsBuffered,
            ..Self::default()
        }
    }
}

pub(crate) fn validate_config(config: &EdlockConfig) -> Result<(), EdlockError> {
    if config.table_file.is_empty() {
        return Err(EdlockError::InvalidConfig {
            message: "table_file must not be empty".into(),
        });
    }
    if config.table_file.contains('/') || config.table_file.contains('\\') {
        return Err(EdlockError::InvalidConfig {
            message: format!(
                "table_file must be a plain file name, got '{}'",
                config.table_file
            ),
        });
    }
    if config.max_snapshot_attributes == 0 {
        return Err(EdlockError::InvalidConfig {
            message: "max_snapshot_attributes must be at least 1".into(),
        });
    }
    Ok(())
}
