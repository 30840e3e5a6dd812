//! Foreground/background state of the host application.

use std::str::FromStr;

/// Host application state, as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppState {
    /// Visible and interactive.
    #[default]
    Active,
    /// Transitioning, e.g. the app switcher is open.
    Inactive,
    /// Not visible.
    Background,
}

impl AppState {
    /// Whether the app is in the foreground.
    pub fn is_foreground(&self) -> bool {
        *self == Self::Active
    }

    /// Whether moving from `self` to `next` brings the app to the foreground.
    pub fn enters_foreground(&self, next: AppState) -> bool {
        !self.is_foreground() && next.is_foreground()
    }
}

impl std::fmt::Display for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
            Self::Background => write!(f, "background"),
        }
    }
}

impl FromStr for AppState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" | "foreground" | "fg" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "background" | "bg" => Ok(Self::Background),
            other => Err(format!("unknown app state: {other}")),
        }
    }
}
