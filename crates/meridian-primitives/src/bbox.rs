use crate::COORDINATE_SCALE;
use std::fmt;

///
/// Bbox
///
/// Bounding box in scaled integer coordinates. A freshly constructed box is
/// inverted (min above any real coordinate, max below), so expanding it with
/// the first real point collapses it onto that point. The inverted sentinel
/// also doubles as "no bbox accumulated yet".
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Bbox {
    pub minlat: i64,
    pub minlon: i64,
    pub maxlat: i64,
    pub maxlon: i64,
}

impl Default for Bbox {
    fn default() -> Self {
        Self {
            minlat: 200 * COORDINATE_SCALE,
            minlon: 200 * COORDINATE_SCALE,
            maxlat: -200 * COORDINATE_SCALE,
            maxlon: -200 * COORDINATE_SCALE,
        }
    }
}

impl Bbox {
    /// Box covering exactly the given scaled-integer point.
    #[must_use]
    pub const fn from_point(lat: i64, lon: i64) -> Self {
        Self {
            minlat: lat,
            minlon: lon,
            maxlat: lat,
            maxlon: lon,
        }
    }

    /// Box covering the given corner coordinates in degrees.
    #[must_use]
    pub fn from_degrees(minlat: f64, minlon: f64, maxlat: f64, maxlon: f64) -> Self {
        Self {
            minlat: scale_coordinate(minlat),
            minlon: scale_coordinate(minlon),
            maxlat: scale_coordinate(maxlat),
            maxlon: scale_coordinate(maxlon),
        }
    }

    /// True while no point has been accumulated.
    #[must_use]
    pub fn is_unset(&self) -> bool {
        *self == Self::default()
    }

    /// Grow this box to cover `other`.
    pub fn expand(&mut self, other: Self) {
        self.minlat = self.minlat.min(other.minlat);
        self.minlon = self.minlon.min(other.minlon);
        self.maxlat = self.maxlat.max(other.maxlat);
        self.maxlon = self.maxlon.max(other.maxlon);
    }

    /// Grow this box to cover a single scaled-integer point.
    pub fn expand_point(&mut self, lat: i64, lon: i64) {
        self.expand(Self::from_point(lat, lon));
    }

    /// Sum of the box edge lengths, the quota measure for changeset growth.
    #[must_use]
    pub const fn linear_size(&self) -> i64 {
        (self.maxlon - self.minlon) + (self.maxlat - self.minlat)
    }

    /// True if the point lies inside the box (inclusive).
    #[must_use]
    pub const fn contains_point(&self, lat: i64, lon: i64) -> bool {
        lat >= self.minlat && lat <= self.maxlat && lon >= self.minlon && lon <= self.maxlon
    }
}

impl fmt::Display for Bbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{},{},{},{}]",
            self.minlat, self.minlon, self.maxlat, self.maxlon
        )
    }
}

/// Convert a coordinate in degrees to scaled integer representation.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn scale_coordinate(degrees: f64) -> i64 {
    #[allow(clippy::cast_precision_loss)]
    let scaled = degrees * COORDINATE_SCALE as f64;
    scaled.round() as i64
}
