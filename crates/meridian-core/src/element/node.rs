use crate::{
    config::UploadLimits,
    element::{ElementCore, payload_error},
    error::UploadError,
};
use meridian_primitives::{ObjectType, Operation};

///
/// Node
///
/// Parse-time node. Latitude and longitude are mandatory on create/modify
/// and ignored on delete.
///

#[derive(Clone, Debug)]
pub struct Node {
    core: ElementCore,
    lat: Option<f64>,
    lon: Option<f64>,
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

impl Node {
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: ElementCore::new(ObjectType::Node),
            lat: None,
            lon: None,
        }
    }

    #[must_use]
    pub const fn core(&self) -> &ElementCore {
        &self.core
    }

    pub const fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    #[must_use]
    pub const fn lat(&self) -> Option<f64> {
        self.lat
    }

    #[must_use]
    pub const fn lon(&self) -> Option<f64> {
        self.lon
    }

    pub fn set_lat(&mut self, lat: f64) -> Result<(), UploadError> {
        if lat < -90.0 || lat > 90.0 {
            return Err(payload_error("Latitude outside of valid range"));
        }
        if !lat.is_finite() {
            return Err(payload_error("Latitude not a valid finite number"));
        }
        self.lat = Some(lat);
        Ok(())
    }

    pub fn set_lon(&mut self, lon: f64) -> Result<(), UploadError> {
        if lon < -180.0 || lon > 180.0 {
            return Err(payload_error("Longitude outside of valid range"));
        }
        if !lon.is_finite() {
            return Err(payload_error("Longitude not a valid finite number"));
        }
        self.lon = Some(lon);
        Ok(())
    }

    pub fn set_lat_str(&mut self, lat: &str) -> Result<(), UploadError> {
        let value: f64 = lat
            .parse()
            .map_err(|_| payload_error("Latitude is not numeric"))?;
        self.set_lat(value)
    }

    pub fn set_lon_str(&mut self, lon: &str) -> Result<(), UploadError> {
        let value: f64 = lon
            .parse()
            .map_err(|_| payload_error("Longitude is not numeric"))?;
        self.set_lon(value)
    }

    /// Operation-specific completeness: `Ok(false)` means a mandatory field
    /// is missing, hard violations surface as errors.
    pub fn is_valid(&self, op: Operation, limits: &UploadLimits) -> Result<bool, UploadError> {
        self.core.check_core(limits)?;

        if op == Operation::Delete {
            return Ok(self.core.is_complete());
        }

        Ok(self.core.is_complete() && self.lat.is_some() && self.lon.is_some())
    }
}
