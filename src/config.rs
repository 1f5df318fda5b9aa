use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::layout::{GridConfig, LayoutKind, Viewport};

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub viewport: Viewport,
    pub layout: LayoutSettings,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct LayoutSettings {
    /// Upper bound on how long a provider may take before its run is abandoned.
    pub timeout_ms: u64,
    pub default_kind: LayoutKind,
    /// Used when a hierarchical layout finds no eligible root.
    pub fallback: LayoutKind,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            default_kind: LayoutKind::default(),
            fallback: LayoutKind::Grid(GridConfig::default()),
        }
    }
}

impl LayoutSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("invalid settings in {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("settings are not valid TOML")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{ForceConfig, HierarchyConfig};

    #[test]
    fn empty_file_uses_defaults() {
        let settings = Settings::from_toml("").expect("settings");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.layout.timeout(), Duration::from_secs(10));
        assert_eq!(settings.viewport.width, 1200.0);
    }

    #[test]
    fn partial_tables_override_only_what_they_name() {
        let settings = Settings::from_toml(
            r#"
            [viewport]
            height = 600.0

            [layout]
            timeout_ms = 2500

            [layout.default_kind]
            name = "hierarchical-tree"
            min_level_height = 90.0

            [layout.fallback]
            name = "fcose"
            iterations = 50
            "#,
        )
        .expect("settings");

        assert_eq!(settings.viewport.width, 1200.0);
        assert_eq!(settings.viewport.height, 600.0);
        assert_eq!(settings.layout.timeout(), Duration::from_millis(2500));
        assert_eq!(
            settings.layout.default_kind,
            LayoutKind::HierarchicalTree(HierarchyConfig {
                root: None,
                min_level_height: 90.0,
            })
        );
        assert_eq!(
            settings.layout.fallback,
            LayoutKind::Fcose(ForceConfig::with_iterations(50))
        );
    }

    #[test]
    fn unknown_layout_name_is_an_error() {
        let error = Settings::from_toml("[layout.fallback]\nname = \"dagre\"\n").unwrap_err();
        assert!(format!("{error:#}").contains("dagre"));
    }
}
