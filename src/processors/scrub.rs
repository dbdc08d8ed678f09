//! Exclusion-zone scrubbing of track records.

use log::{debug, info};
use thiserror::Error;

use crate::config::ExclusionZone;
use crate::core::record::{GeoPoint, RecordSet};

/// Errors that can occur during scrubbing.
#[derive(Debug, Error)]
pub enum ScrubError {
    #[error("exclusion zone {index} ({label}) is invalid: {reason}")]
    InvalidZone {
        index: usize,
        label: String,
        reason: String,
    },

    #[error("records have no Latitude/Longitude columns but {zones} exclusion zone(s) are configured")]
    MissingColumns { zones: usize },
}

/// Result type for scrub operations.
pub type Result<T> = std::result::Result<T, ScrubError>;

/// Records that survived scrubbing and how many were removed.
#[derive(Debug, Clone)]
pub struct ScrubOutcome {
    pub kept: RecordSet,
    pub excluded: usize,
}

/// Check that a zone describes a real circle on the globe.
pub fn validate_zone(index: usize, zone: &ExclusionZone) -> Result<()> {
    let reason = if !zone.center_latitude.is_finite() || zone.center_latitude.abs() > 90.0 {
        Some(format!("latitude {} outside [-90, 90]", zone.center_latitude))
    } else if !zone.center_longitude.is_finite() || zone.center_longitude.abs() > 180.0 {
        Some(format!("longitude {} outside [-180, 180]", zone.center_longitude))
    } else if !zone.radius_meters.is_finite() || zone.radius_meters < 0.0 {
        Some(format!("radius {} m must be a non-negative number", zone.radius_meters))
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ScrubError::InvalidZone {
            index,
            label: zone.label(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Whether a point lies inside any zone. The boundary counts as inside.
#[inline]
pub fn is_excluded(point: &GeoPoint, zones: &[ExclusionZone]) -> bool {
    zones.iter().any(|zone| {
        let center = GeoPoint {
            latitude: zone.center_latitude,
            longitude: zone.center_longitude,
        };
        point.distance_m(&center) <= zone.radius_meters
    })
}

/// Remove every record that falls inside any exclusion zone.
///
/// All zones are validated before any record is looked at. The relative
/// order of surviving records is preserved and the input is untouched.
///
/// # Arguments
///
/// * `set` - Records to scrub
/// * `zones` - Exclusion circles, combined with logical OR
///
/// # Errors
///
/// Returns an error if a zone is malformed, or if zones are configured
/// but the records carry no coordinates.
pub fn scrub_records(set: &RecordSet, zones: &[ExclusionZone]) -> Result<ScrubOutcome> {
    for (index, zone) in zones.iter().enumerate() {
        validate_zone(index, zone)?;
    }

    if zones.is_empty() {
        return Ok(ScrubOutcome {
            kept: set.clone(),
            excluded: 0,
        });
    }

    if !set.schema.has_position() {
        return Err(ScrubError::MissingColumns { zones: zones.len() });
    }

    let mut kept = Vec::with_capacity(set.len());
    let mut excluded = 0usize;

    for record in &set.records {
        // Rows without a position were rejected at load time
        let inside = record
            .position
            .as_ref()
            .map_or(false, |point| is_excluded(point, zones));

        if inside {
            excluded += 1;
        } else {
            kept.push(record.clone());
        }
    }

    for zone in zones {
        debug!(
            "Exclusion zone {}: radius {} m",
            zone.label(),
            zone.radius_meters
        );
    }
    info!(
        "Scrubbed {} records against {} zone(s): {} excluded, {} remaining",
        set.len(),
        zones.len(),
        excluded,
        kept.len()
    );

    Ok(ScrubOutcome {
        kept: RecordSet::with_records(set.schema.clone(), kept),
        excluded,
    })
}
