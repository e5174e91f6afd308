//! Error types for tree mutations and settings loading.

use std::path::PathBuf;

/// Why a tree mutation was refused. No state is touched when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrowthError {
    #[error("not enough resources: need {needed_sun} sunlight / {needed_water} water, have {sunlight} / {water}")]
    InsufficientResources {
        needed_sun: u32,
        needed_water: u32,
        sunlight: u32,
        water: u32,
    },

    #[error("no node with id {0}")]
    UnknownNode(String),

    #[error("the seed prompt cannot be pruned")]
    RootIsPermanent,

    #[error("node {0} is already fully grown")]
    FullyGrown(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
