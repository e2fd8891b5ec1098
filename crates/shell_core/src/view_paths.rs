use shared::domain::{NavGroup, Persona, RouteMeta, ViewPath, VIEW_PREFIX};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewPathError {
    #[error("Invalid view ID: {0}")]
    InvalidViewId(String),
}

/// Maps a logical view id to the fragment that renders it.
pub trait ViewPathResolver: Send + Sync {
    fn view_path(&self, view_id: &str) -> Result<ViewPath, ViewPathError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StaticViewPaths;

impl ViewPathResolver for StaticViewPaths {
    fn view_path(&self, view_id: &str) -> Result<ViewPath, ViewPathError> {
        view_path(view_id)
    }
}

pub fn view_path(view_id: &str) -> Result<ViewPath, ViewPathError> {
    let Some(name) = view_id.strip_prefix(VIEW_PREFIX) else {
        return Err(ViewPathError::InvalidViewId(view_id.to_string()));
    };
    if name.is_empty() {
        return Err(ViewPathError::InvalidViewId(view_id.to_string()));
    }

    if let Some(song) = name.strip_prefix("song-") {
        return Ok(ViewPath::new(format!("views/songs/{song}.html")));
    }
    if let Some(game) = name.strip_prefix("game-") {
        return Ok(ViewPath::new(format!("views/games/{game}.html")));
    }
    Ok(ViewPath::new(format!("views/{name}.html")))
}

const fn meta(persona: Persona, primary_task: bool, nav_group: NavGroup) -> RouteMeta {
    RouteMeta {
        persona,
        primary_task,
        nav_group,
    }
}

const STATIC_ROUTE_META: &[(&str, RouteMeta)] = &[
    ("view-home", meta(Persona::Child, true, NavGroup::Practice)),
    ("view-onboarding", meta(Persona::Child, true, NavGroup::Practice)),
    ("view-coach", meta(Persona::Child, true, NavGroup::Practice)),
    ("view-trainer", meta(Persona::Child, false, NavGroup::Practice)),
    ("view-tuner", meta(Persona::Child, false, NavGroup::Practice)),
    ("view-bowing", meta(Persona::Child, false, NavGroup::Practice)),
    ("view-posture", meta(Persona::Child, false, NavGroup::Practice)),
    ("view-games", meta(Persona::Child, true, NavGroup::Games)),
    ("view-songs", meta(Persona::Child, true, NavGroup::Songs)),
    ("view-progress", meta(Persona::Child, true, NavGroup::Practice)),
    ("view-analysis", meta(Persona::Child, false, NavGroup::Practice)),
    ("view-help", meta(Persona::Child, false, NavGroup::Utility)),
    ("view-about", meta(Persona::Child, false, NavGroup::Utility)),
    ("view-backup", meta(Persona::Child, false, NavGroup::Utility)),
    ("view-settings", meta(Persona::Child, false, NavGroup::Utility)),
    ("view-parent", meta(Persona::Parent, false, NavGroup::Parent)),
];

pub fn route_meta(view_id: &str) -> RouteMeta {
    if !view_id.starts_with(VIEW_PREFIX) {
        return RouteMeta::CHILD_DEFAULT;
    }
    if view_id.starts_with("view-song-") {
        return meta(Persona::Child, false, NavGroup::Songs);
    }
    if view_id.starts_with("view-game-") {
        return meta(Persona::Child, false, NavGroup::Games);
    }
    STATIC_ROUTE_META
        .iter()
        .find(|(id, _)| *id == view_id)
        .map(|(_, meta)| *meta)
        .unwrap_or(RouteMeta::CHILD_DEFAULT)
}

#[cfg(test)]
#[path = "tests/view_paths_tests.rs"]
mod tests;
