//! `config.toml`: defaults for options not given on the command line
use ::std::path::{Path, PathBuf};

use ::anyhow::{Context, Result};
use ::resampla_image::{
    scaling::{ScalingCondition, ScalingTarget},
    FilterType,
};
use ::serde::Deserialize;

/// Every key is optional, names are the kebab-case long option names
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct FileConfig {
    pub quiet: Option<u8>,
    pub filter: Option<FilterType>,
    pub auto_filter: Option<bool>,
    pub fit: Option<ScalingTarget>,
    pub condition: Option<ScalingCondition>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub scale: Option<f64>,
    pub threads: Option<usize>,
    pub ignore_color_space: Option<bool>,
    pub skip_premultiply: Option<bool>,
    pub linear: Option<bool>,
}

impl FileConfig {
    #[inline]
    pub fn from_toml(s: &str) -> Result<Self, ::toml::de::Error> { ::toml::from_str(s) }
    pub fn load(path: &Path) -> Result<Self> {
        let s = ::std::fs::read_to_string(path).with_context(|| format!("could not read {}", path.display()))?;
        Self::from_toml(&s).with_context(|| format!("could not parse {}", path.display()))
    }
}

/// `<config dir>/resampla/config.toml`, if it exists
pub fn default_config_path() -> Option<PathBuf> {
    let dirs = ::directories::ProjectDirs::from("", "", "resampla")?;
    Some(dirs.config_dir().join("config.toml")).filter(|p| p.is_file())
}
