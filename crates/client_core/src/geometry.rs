//! Responsive sizing for the embedded video playback dialog.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DialogSize {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackGeometry {
    /// Viewport width beyond which the dialog stops growing.
    pub max_viewport_width: f64,
    /// Share of the (clamped) viewport the dialog takes, in percent.
    pub width_percent: f64,
    pub aspect_width: f64,
    pub aspect_height: f64,
    /// Vertical room reserved for the dialog's own action buttons.
    pub chrome_height: f64,
}

impl Default for PlaybackGeometry {
    fn default() -> Self {
        Self {
            max_viewport_width: 1500.0,
            width_percent: 80.0,
            aspect_width: 16.0,
            aspect_height: 9.0,
            chrome_height: 120.0,
        }
    }
}

impl PlaybackGeometry {
    pub fn size_for_viewport(&self, viewport_width: f64) -> DialogSize {
        // NaN and negative widths collapse to an empty viewport.
        let usable = viewport_width.max(0.0).min(self.max_viewport_width);
        let width = usable * self.width_percent / 100.0;
        let height = width * self.aspect_height / self.aspect_width + self.chrome_height;
        DialogSize { width, height }
    }
}

pub fn playback_dialog_size(viewport_width: f64) -> DialogSize {
    PlaybackGeometry::default().size_for_viewport(viewport_width)
}
