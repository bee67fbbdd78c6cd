//! Camera selection across the primary and an optional secondary capture
//! backend.
//!
//! A camera is named by a 1-based index. A `P` prefix (`"P2"`) requires the
//! secondary backend; a bare number requires the primary one. Without an
//! explicit requirement the secondary backend is tried first when it is
//! available and preferred, and the primary backend is the fallback.

use std::fmt;
use std::str::FromStr;

use procam_core::ErrorKind;
use serde::{Deserialize, Serialize};

use crate::FrameSource;

const SECONDARY_PREFIX: char = 'P';

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("invalid camera selection {0:?}")]
    InvalidSelection(String),
    #[error("the {0} capture backend is not available")]
    BackendUnavailable(Backend),
    #[error("unable to open camera {index} on the {backend} backend")]
    OpenFailed { backend: Backend, index: u32 },
}

impl DeviceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeviceError::InvalidSelection(_) | DeviceError::BackendUnavailable(_) => {
                ErrorKind::InvalidState
            }
            DeviceError::OpenFailed { .. } => ErrorKind::Io,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Primary,
    Secondary,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Primary => f.write_str("primary"),
            Backend::Secondary => f.write_str("secondary"),
        }
    }
}

/// Backends present on this machine, computed once at startup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub secondary_backend: bool,
    /// Try the secondary backend first for unqualified selections.
    pub prefer_secondary: bool,
}

impl Capabilities {
    pub fn primary_only() -> Self {
        Self::default()
    }

    pub fn with_secondary() -> Self {
        Self {
            secondary_backend: true,
            prefer_secondary: true,
        }
    }
}

/// Camera as written in a session config: an index or a string such as `"P1"`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CameraSpec {
    Index(u32),
    Name(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendRequirement {
    Any,
    Primary,
    Secondary,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CameraSelection {
    /// 1-based camera number.
    pub index: u32,
    pub requirement: BackendRequirement,
}

impl Default for CameraSelection {
    fn default() -> Self {
        Self {
            index: 1,
            requirement: BackendRequirement::Any,
        }
    }
}

impl FromStr for CameraSelection {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || DeviceError::InvalidSelection(s.to_string());

        let (digits, requirement) = match trimmed.strip_prefix(SECONDARY_PREFIX) {
            Some(rest) => (rest, BackendRequirement::Secondary),
            None => match trimmed.strip_prefix(SECONDARY_PREFIX.to_ascii_lowercase()) {
                Some(rest) => (rest, BackendRequirement::Secondary),
                None => (trimmed, BackendRequirement::Primary),
            },
        };
        let index: u32 = digits.parse().map_err(|_| invalid())?;
        if index == 0 {
            return Err(invalid());
        }
        Ok(Self { index, requirement })
    }
}

impl fmt::Display for CameraSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.requirement {
            BackendRequirement::Secondary => write!(f, "{SECONDARY_PREFIX}{}", self.index),
            BackendRequirement::Primary | BackendRequirement::Any => write!(f, "{}", self.index),
        }
    }
}

impl TryFrom<&CameraSpec> for CameraSelection {
    type Error = DeviceError;

    fn try_from(spec: &CameraSpec) -> Result<Self, Self::Error> {
        match spec {
            CameraSpec::Index(0) => Err(DeviceError::InvalidSelection("0".into())),
            CameraSpec::Index(index) => Ok(Self {
                index: *index,
                requirement: BackendRequirement::Primary,
            }),
            CameraSpec::Name(name) => name.parse(),
        }
    }
}

impl CameraSelection {
    /// Backends to try, in order.
    pub fn open_order(&self, caps: &Capabilities) -> Result<Vec<Backend>, DeviceError> {
        match self.requirement {
            BackendRequirement::Primary => Ok(vec![Backend::Primary]),
            BackendRequirement::Secondary if caps.secondary_backend => {
                Ok(vec![Backend::Secondary])
            }
            BackendRequirement::Secondary => Err(DeviceError::BackendUnavailable(Backend::Secondary)),
            BackendRequirement::Any if caps.secondary_backend && caps.prefer_secondary => {
                Ok(vec![Backend::Secondary, Backend::Primary])
            }
            BackendRequirement::Any => Ok(vec![Backend::Primary]),
        }
    }
}

/// Opens frame sources on a concrete capture backend.
pub trait CameraBackend {
    type Source: FrameSource;

    fn open(&mut self, backend: Backend, index: u32) -> Result<Self::Source, DeviceError>;
}

/// Open the selected camera, falling back across backends in
/// [`CameraSelection::open_order`].
pub fn open_camera<B: CameraBackend>(
    selection: &CameraSelection,
    caps: &Capabilities,
    backends: &mut B,
) -> Result<(Backend, B::Source), DeviceError> {
    let order = selection.open_order(caps)?;
    let mut last_err = DeviceError::OpenFailed {
        backend: Backend::Primary,
        index: selection.index,
    };
    for backend in order {
        match backends.open(backend, selection.index) {
            Ok(source) => {
                log::info!("opened camera {} on the {backend} backend", selection.index);
                return Ok((backend, source));
            }
            Err(e) => {
                log::warn!("{e}");
                last_err = e;
            }
        }
    }
    Err(last_err)
}
