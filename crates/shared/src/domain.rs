use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const VIEW_PREFIX: &str = "view-";

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub u64);
    };
}

id_newtype!(RegistrationId);

/// Correlates one worker request with its single response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewIdError {
    #[error("Invalid view ID: {0}")]
    MissingPrefix(String),
    #[error("Invalid view ID: {0} has no view name")]
    EmptyName(String),
}

/// Identifier of a logical screen, always of the form `view-<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ViewId(String);

impl ViewId {
    pub const HOME: &'static str = "view-home";
    pub const ONBOARDING: &'static str = "view-onboarding";

    pub fn parse(raw: &str) -> Result<Self, ViewIdError> {
        let Some(name) = raw.strip_prefix(VIEW_PREFIX) else {
            return Err(ViewIdError::MissingPrefix(raw.to_string()));
        };
        if name.is_empty() {
            return Err(ViewIdError::EmptyName(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn home() -> Self {
        Self(Self::HOME.to_string())
    }

    pub fn onboarding() -> Self {
        Self(Self::ONBOARDING.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part after `view-`.
    pub fn name(&self) -> &str {
        &self.0[VIEW_PREFIX.len()..]
    }

    pub fn is_home(&self) -> bool {
        self.0 == Self::HOME
    }
}

/// Cheap check used where a full parse is not needed.
pub fn is_view_id(raw: &str) -> bool {
    ViewId::parse(raw).is_ok()
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ViewId {
    type Err = ViewIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ViewId {
    type Error = ViewIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ViewId> for String {
    fn from(value: ViewId) -> Self {
        value.0
    }
}

impl PartialEq<str> for ViewId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ViewId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Resource locator of a view fragment, relative to the app root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewPath(String);

impl ViewPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ViewPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<&str> for ViewPath {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    Child,
    Parent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavGroup {
    Practice,
    Games,
    Songs,
    Utility,
    Parent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteMeta {
    pub persona: Persona,
    pub primary_task: bool,
    pub nav_group: NavGroup,
}

impl RouteMeta {
    pub const CHILD_DEFAULT: RouteMeta = RouteMeta {
        persona: Persona::Child,
        primary_task: false,
        nav_group: NavGroup::Utility,
    };
}

/// Tri-state answer of a platform capability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Supported,
    Unsupported,
    Unknown,
}

impl Capability {
    pub fn is_supported(self) -> bool {
        matches!(self, Capability::Supported)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformFeature {
    ServiceWorker,
    OriginPrivateFileSystem,
    PeriodicBackgroundSync,
    BackgroundSync,
    WebGpu,
}

impl PlatformFeature {
    pub const ALL: [PlatformFeature; 5] = [
        PlatformFeature::ServiceWorker,
        PlatformFeature::OriginPrivateFileSystem,
        PlatformFeature::PeriodicBackgroundSync,
        PlatformFeature::BackgroundSync,
        PlatformFeature::WebGpu,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SongLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl SongLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            SongLevel::Beginner => "beginner",
            SongLevel::Intermediate => "intermediate",
            SongLevel::Advanced => "advanced",
        }
    }
}
