//! The seam between the detector and whatever spatial index holds the map
//! features.

use geo::Rect;
use house_locator_models::{FeatureId, LineFeature, PointFeature};

/// Errors reported by a [`FeatureSource`].
///
/// Unknown ids are not errors: sources skip them.
#[derive(Debug, thiserror::Error)]
pub enum FeatureSourceError {
    /// The backing store failed.
    #[error("Feature source error: {0}")]
    Backend(String),
}

/// Delivers street lines and house points to the detector.
///
/// Calls are synchronous; a source backed by slow storage blocks the
/// detector until the batch is returned.
pub trait FeatureSource {
    /// Loads line features by id. Ids that are not lines may be skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn load_lines(&self, ids: &[FeatureId]) -> Result<Vec<LineFeature>, FeatureSourceError>;

    /// Returns all point/area features whose representative point lies in
    /// `rect` (WGS84 degrees, `x` = longitude).
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn points_in_rect(&self, rect: &Rect<f64>) -> Result<Vec<PointFeature>, FeatureSourceError>;
}
