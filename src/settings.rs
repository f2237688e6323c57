use std::path::{Path, PathBuf};

use crate::canvas::{DEFAULT_DIM, ResizeMode, clamp_dimension};
use crate::components::history::DEFAULT_HISTORY_CAPACITY;

/// Default export upscale factor.
pub const DEFAULT_EXPORT_SCALE: u32 = 8;

/// Editor settings that persist across sessions.
#[derive(Clone, Debug, PartialEq)]
pub struct EditorSettings {
    /// Maximum number of history snapshots.
    pub history_capacity: usize,
    /// Grid size used when no session can be restored.
    pub default_width: u32,
    pub default_height: u32,
    /// Nearest-neighbor export factor (1–64).
    pub export_scale: u32,
    /// Draw cell grid lines over the canvas.
    pub show_grid: bool,
    /// Opacity of the grid lines (0–1).
    pub grid_alpha: f32,
    /// How a resize carries existing artwork over.
    pub resize_mode: ResizeMode,
    /// Write the session record after every change.
    pub autosave: bool,
    /// Override for the session store directory.
    pub storage_dir: Option<PathBuf>,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            default_width: DEFAULT_DIM,
            default_height: DEFAULT_DIM,
            export_scale: DEFAULT_EXPORT_SCALE,
            show_grid: true,
            grid_alpha: 0.25,
            resize_mode: ResizeMode::Anchor,
            autosave: true,
            storage_dir: None,
        }
    }
}

impl EditorSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/pastelpix/pastelpix.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\PastelPix\pastelpix.cfg
    /// On macOS:   ~/Library/Application Support/PastelPix/pastelpix.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            return Some(PathBuf::from(appdata).join("PastelPix").join("pastelpix.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("PastelPix")
                    .join("pastelpix.cfg"),
            );
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
                .ok()?;
            Some(config_dir.join("pastelpix").join("pastelpix.cfg"))
        }
    }

    /// Load settings from the platform path (defaults if missing or corrupt).
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    /// Parse `key=value` lines. Unknown keys and unparsable values are skipped.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "history_capacity" => {
                    if let Ok(v) = val.parse::<usize>() {
                        s.history_capacity = v.max(1);
                    }
                }
                "default_width" => {
                    if let Ok(v) = val.parse::<i64>() {
                        s.default_width = clamp_dimension(v);
                    }
                }
                "default_height" => {
                    if let Ok(v) = val.parse::<i64>() {
                        s.default_height = clamp_dimension(v);
                    }
                }
                "export_scale" => {
                    if let Ok(v) = val.parse::<u32>() {
                        s.export_scale = v.clamp(1, 64);
                    }
                }
                "show_grid" => s.show_grid = val == "true",
                "grid_alpha" => {
                    if let Ok(v) = val.parse::<f32>() {
                        if v.is_finite() {
                            s.grid_alpha = v.clamp(0.0, 1.0);
                        }
                    }
                }
                "resize_mode" => {
                    if let Some(mode) = ResizeMode::parse(val) {
                        s.resize_mode = mode;
                    }
                }
                "autosave" => s.autosave = val != "false",
                "storage_dir" => {
                    s.storage_dir = (!val.is_empty()).then(|| PathBuf::from(val));
                }
                _ => {}
            }
        }
        s
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "history_capacity={}\n\
             default_width={}\n\
             default_height={}\n\
             export_scale={}\n\
             show_grid={}\n\
             grid_alpha={}\n\
             resize_mode={}\n\
             autosave={}\n\
             storage_dir={}\n",
            self.history_capacity,
            self.default_width,
            self.default_height,
            self.export_scale,
            self.show_grid,
            self.grid_alpha,
            self.resize_mode.as_str(),
            self.autosave,
            self.storage_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        )
    }

    /// Save settings to the platform path. Errors are ignored.
    pub fn save(&self) {
        if let Some(path) = Self::settings_path() {
            let _ = self.save_to(&path);
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())
    }

    /// Directory for the session store (override or platform default).
    pub fn resolved_storage_dir(&self) -> PathBuf {
        self.storage_dir
            .clone()
            .unwrap_or_else(crate::io::storage_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_clamps_and_skips_junk() {
        let s = EditorSettings::parse(
            "# comment\n\
             history_capacity=0\n\
             default_width=1000\n\
             default_height=abc\n\
             export_scale=99\n\
             show_grid=false\n\
             grid_alpha=3.5\n\
             resize_mode=scale\n\
             mystery=1\n\
             no equals sign\n",
        );
        assert_eq!(s.history_capacity, 1);
        assert_eq!(s.default_width, 256);
        assert_eq!(s.default_height, DEFAULT_DIM);
        assert_eq!(s.export_scale, 64);
        assert!(!s.show_grid);
        assert_eq!(s.grid_alpha, 1.0);
        assert_eq!(s.resize_mode, ResizeMode::Scale);
        assert!(s.autosave);
        assert_eq!(s.storage_dir, None);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg").join("pastelpix.cfg");
        let s = EditorSettings {
            history_capacity: 50,
            export_scale: 4,
            autosave: false,
            storage_dir: Some(dir.path().join("store")),
            ..EditorSettings::default()
        };
        s.save_to(&path).unwrap();
        assert_eq!(EditorSettings::load_from(&path), s);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            EditorSettings::load_from(&dir.path().join("nope.cfg")),
            EditorSettings::default()
        );
    }
}
