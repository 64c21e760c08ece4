use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};

use analysis as an;
use model::*;

/// Process-wide client state: what the map shows plus the user's display settings.
pub struct AppSession {
    pub inner: Mutex<Inner>,
}

pub struct Inner {
    pub view: ViewState,
    pub preferences: Preferences,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ViewState {
    pub streams: Vec<LiveStream>,
    pub groups: Vec<TrackerGroup>,
    pub center: LatLng,
}

impl ViewState {
    pub fn new(center: LatLng) -> Self {
        Self { streams: Vec::new(), groups: Vec::new(), center }
    }

    /// Swaps in a fresh snapshot. Streams win over groups when picking the map
    /// center; with neither live the center stays put. Returns whether it moved.
    pub fn replace(&mut self, streams: Vec<LiveStream>, groups: Vec<TrackerGroup>) -> bool {
        let from_groups = an::map_center(&groups, self.center);
        let center = an::map_center(&streams, from_groups);
        self.streams = streams;
        self.groups = groups;
        let moved = center != self.center;
        self.center = center;
        moved
    }

    pub fn live_count(&self) -> usize {
        self.streams.iter().filter(|s| s.live).count()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Imperial,
    Metric,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Preferences {
    pub theme: Theme,
    pub units: Units,
    pub show_chat: bool,
    pub share_location: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self { theme: Theme::Light, units: Units::Imperial, show_chat: true, share_location: true }
    }
}

impl Preferences {
    pub fn default_path() -> Option<PathBuf> {
        dirs_next::config_dir().map(|d| d.join("corsa").join("preferences.json"))
    }

    /// Missing file means defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(s) => serde_json::from_str(&s).with_context(|| format!("parse {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("write {}", path.display()))
    }
}

impl AppSession {
    pub fn new(center: LatLng, preferences: Preferences) -> Self {
        Self { inner: Mutex::new(Inner { view: ViewState::new(center), preferences }) }
    }

    pub fn apply_home(&self, streams: Vec<LiveStream>, groups: Vec<TrackerGroup>) -> bool {
        self.inner.lock().view.replace(streams, groups)
    }

    pub fn view(&self) -> ViewState {
        self.inner.lock().view.clone()
    }

    pub fn preferences(&self) -> Preferences {
        self.inner.lock().preferences.clone()
    }
}
