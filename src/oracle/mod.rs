//! The orientation oracle: an external service that looks at a page image and
//! says how far it is rotated.
//!
//! [`OrientationOracle`] is the only seam the pipeline talks to. The
//! production implementation is [`baidu::BaiduOracle`]; tests plug in
//! deterministic fakes.

pub mod baidu;

use crate::error::OracleError;
use crate::pipeline::render::PageImage;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A clockwise page rotation in quarter turns.
///
/// Serialises as integer degrees (`0`, `90`, `180`, `270`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Rotation in degrees: 0, 90, 180 or 270.
    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Normalise any multiple of 90 (negative included) to a rotation.
    pub fn from_degrees(degrees: i64) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    /// Apply `other` after `self`.
    pub fn then(self, other: Rotation) -> Rotation {
        let sum = i64::from(self.degrees()) + i64::from(other.degrees());
        Rotation::from_degrees(sum).unwrap_or_default()
    }

    pub fn is_identity(self) -> bool {
        self == Rotation::Deg0
    }
}

impl Serialize for Rotation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.degrees())
    }
}

impl<'de> Deserialize<'de> for Rotation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let degrees = i64::deserialize(deserializer)?;
        Rotation::from_degrees(degrees).ok_or_else(|| {
            serde::de::Error::custom(format!("rotation must be a multiple of 90, got {degrees}"))
        })
    }
}

/// What the oracle concluded about one page.
///
/// In JSON: `{"detected": 90}` or `"undetermined"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// The page needs this clockwise correction to be upright.
    Detected(Rotation),
    /// The oracle answered but could not tell.
    Undetermined,
}

impl Orientation {
    /// The correction to apply; undetermined pages are left as they are.
    pub fn correction(self) -> Rotation {
        match self {
            Orientation::Detected(r) => r,
            Orientation::Undetermined => Rotation::Deg0,
        }
    }
}

/// Detect the orientation of a page image.
///
/// Implementations must be `Send + Sync`: the pipeline shares one oracle
/// across concurrently processed files.
#[async_trait]
pub trait OrientationOracle: Send + Sync {
    /// Short name used in logs and reports.
    fn name(&self) -> &str;

    /// Ask the oracle how the page is oriented.
    async fn detect(&self, page: &PageImage) -> Result<Orientation, OracleError>;
}
