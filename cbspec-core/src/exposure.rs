//! Detector aperture and exposure from masked MC bin counts.
//!
//! ```text
//! acceptance(E) = N_reco(E) / N_thrown(E)
//! aperture(E)   = acceptance(E) * A_gen * Omega_gen      [m^2 sr]
//! exposure(E)   = aperture(E) * T                        [m^2 sr s]
//! ```
#![allow(clippy::cast_precision_loss)]

use crate::binning::MaskedBins;
use crate::config::GeneratedGeometry;
use crate::error::{Error, Result};
use serde::Serialize;

/// Fraction of thrown events reconstructed and accepted, per bin.
///
/// # Errors
/// Returns [`Error::ZeroThrownCount`] for a bin with no thrown events. Callers
/// are expected to mask such bins first; reaching this error is a defect in
/// the caller. Returns [`Error::LengthMismatch`] if the slices differ.
pub fn acceptance(mc_reconstructed: &[u64], mc_raw_truth: &[u64]) -> Result<Vec<f64>> {
    if mc_reconstructed.len() != mc_raw_truth.len() {
        return Err(Error::LengthMismatch {
            what: "thrown MC counts",
            expected: mc_reconstructed.len(),
            actual: mc_raw_truth.len(),
        });
    }
    mc_reconstructed
        .iter()
        .zip(mc_raw_truth)
        .enumerate()
        .map(|(bin, (&reco, &raw))| {
            if raw == 0 {
                Err(Error::ZeroThrownCount { bin })
            } else {
                Ok(reco as f64 / raw as f64)
            }
        })
        .collect()
}

/// Aperture per bin in m^2 sr.
///
/// # Errors
/// See [`acceptance`].
pub fn compute_aperture(
    mc_reconstructed: &[u64],
    mc_raw_truth: &[u64],
    geometry: &GeneratedGeometry,
) -> Result<Vec<f64>> {
    let area_solid_angle = geometry.area_solid_angle();
    Ok(acceptance(mc_reconstructed, mc_raw_truth)?
        .into_iter()
        .map(|fraction| fraction * area_solid_angle)
        .collect())
}

/// Exposure per bin: aperture times run time.
#[must_use]
pub fn compute_exposure(aperture: &[f64], run_time_s: f64) -> Vec<f64> {
    aperture.iter().map(|&a| a * run_time_s).collect()
}

/// Aperture and exposure over the masked bin set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApertureExposure {
    /// m^2 sr per masked bin.
    pub aperture: Vec<f64>,
    /// m^2 sr s per masked bin.
    pub exposure: Vec<f64>,
}

impl ApertureExposure {
    /// Compute from masked bins.
    ///
    /// # Errors
    /// See [`acceptance`].
    pub fn from_masked(
        bins: &MaskedBins,
        geometry: &GeneratedGeometry,
        run_time_s: f64,
    ) -> Result<Self> {
        let aperture = compute_aperture(&bins.mc_reconstructed, &bins.mc_raw_truth, geometry)?;
        let exposure = compute_exposure(&aperture, run_time_s);
        Ok(Self { aperture, exposure })
    }

    /// The same values over the full binning, zero where `mask` is false.
    ///
    /// # Errors
    /// Returns [`Error::LengthMismatch`] if `mask` does not have one `true`
    /// per masked bin.
    pub fn over_all_bins(&self, mask: &[bool]) -> Result<Self> {
        Ok(Self {
            aperture: scatter_to_bins(mask, &self.aperture)?,
            exposure: scatter_to_bins(mask, &self.exposure)?,
        })
    }
}

fn scatter_to_bins(mask: &[bool], values: &[f64]) -> Result<Vec<f64>> {
    let kept = mask.iter().filter(|&&keep| keep).count();
    if kept != values.len() {
        return Err(Error::LengthMismatch {
            what: "masked values",
            expected: kept,
            actual: values.len(),
        });
    }
    let mut values = values.iter().copied();
    Ok(mask
        .iter()
        .map(|&keep| if keep { values.next().unwrap_or(0.0) } else { 0.0 })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn geometry() -> GeneratedGeometry {
        GeneratedGeometry {
            generated_area_m2: 1.0e9,
            generated_solid_angle_sr: 2.0,
        }
    }

    #[test]
    fn test_aperture_is_scaled_acceptance() {
        let aperture = compute_aperture(&[1, 5, 0], &[4, 10, 3], &geometry()).unwrap();
        assert_relative_eq!(aperture[0], 0.25 * 2.0e9);
        assert_relative_eq!(aperture[1], 0.5 * 2.0e9);
        assert_relative_eq!(aperture[2], 0.0);
        assert!(aperture.iter().all(|&a| a >= 0.0));
    }

    #[test]
    fn test_zero_thrown_is_error() {
        let err = acceptance(&[1, 0], &[2, 0]).unwrap_err();
        assert!(matches!(err, Error::ZeroThrownCount { bin: 1 }));
    }

    #[test]
    fn test_length_mismatch_is_error() {
        assert!(matches!(
            acceptance(&[1, 2], &[3]),
            Err(Error::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_exposure_is_linear_in_time() {
        let aperture = [1.5e8, 3.0e8, 0.0];
        for time in [0.0, 1.0, 3.7e8] {
            let exposure = compute_exposure(&aperture, time);
            for (e, a) in exposure.iter().zip(&aperture) {
                assert_eq!(*e, a * time);
            }
        }
        let once = compute_exposure(&aperture, 2.0e8);
        let twice = compute_exposure(&aperture, 4.0e8);
        for (a, b) in once.iter().zip(&twice) {
            assert_relative_eq!(2.0 * a, *b);
        }
    }

    #[test]
    fn test_from_masked() {
        let bins = MaskedBins {
            bin_index: vec![3, 4],
            centers: vec![18.75, 18.85],
            widths: vec![0.1, 0.1],
            mc_reconstructed: vec![3, 8],
            data_reconstructed: vec![1, 1],
            mc_raw_truth: vec![6, 10],
        };
        let result = ApertureExposure::from_masked(&bins, &geometry(), 10.0).unwrap();
        assert_relative_eq!(result.aperture[0], 1.0e9);
        assert_relative_eq!(result.aperture[1], 1.6e9);
        assert_relative_eq!(result.exposure[1], 1.6e10);
    }

    #[test]
    fn test_over_all_bins_zero_outside_mask() {
        let masked = ApertureExposure {
            aperture: vec![2.0, 3.0],
            exposure: vec![20.0, 30.0],
        };
        let full = masked.over_all_bins(&[false, true, false, true]).unwrap();
        assert_eq!(full.aperture, vec![0.0, 2.0, 0.0, 3.0]);
        assert_eq!(full.exposure, vec![0.0, 20.0, 0.0, 30.0]);
        assert!(masked.over_all_bins(&[true, true, true]).is_err());
    }
}
