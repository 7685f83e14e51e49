//! Quality-cut selection.
//!
//! An event is accepted when all seven inequalities hold:
//!
//! | field            | test                     |
//! |------------------|--------------------------|
//! | good SD count    | `>= min_good_sd`         |
//! | zenith (offset)  | `<  max_theta_deg`       |
//! | border distance  | `>= min_border_dist_m`   |
//! | geometry chi2    | `<  max_geom_chi2`       |
//! | LDF chi2         | `<  max_ldf_chi2`        |
//! | Pedistool error  | `<  max_ped_err`         |
//! | fractional S800  | `<  max_frac_s800`       |
//!
//! NaN inputs fail every comparison, so rows with missing values are rejected.

use crate::config::QualityCuts;
use crate::derived::DerivedEvents;
use crate::error::{Error, Result};
use crate::soa::EventBatch;

/// Cut inputs of a single event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CutInputs {
    pub good_sd_count: f64,
    pub zenith_deg: f64,
    pub border_dist_m: f64,
    pub geom_chi2: f64,
    pub ldf_chi2: f64,
    pub ped_err: f64,
    pub frac_s800: f64,
}

impl QualityCuts {
    /// Apply all seven cuts to one event.
    #[inline]
    #[must_use]
    pub fn passes(&self, event: &CutInputs) -> bool {
        event.good_sd_count >= f64::from(self.min_good_sd)
            && event.zenith_deg < self.max_theta_deg
            && event.border_dist_m >= self.min_border_dist_m
            && event.geom_chi2 < self.max_geom_chi2
            && event.ldf_chi2 < self.max_ldf_chi2
            && event.ped_err < self.max_ped_err
            && event.frac_s800 < self.max_frac_s800
    }

    /// Acceptance flag for every row of a batch.
    ///
    /// # Errors
    /// Returns [`Error::LengthMismatch`] if `derived` was not computed from
    /// `batch`.
    pub fn mask(&self, batch: &EventBatch, derived: &DerivedEvents) -> Result<Vec<bool>> {
        if derived.len() != batch.len() {
            return Err(Error::LengthMismatch {
                what: "derived fields",
                expected: batch.len(),
                actual: derived.len(),
            });
        }
        batch.validate()?;

        Ok((0..batch.len())
            .map(|i| {
                self.passes(&CutInputs {
                    good_sd_count: batch.good_sd_count[i],
                    zenith_deg: derived.zenith_deg[i],
                    border_dist_m: batch.border_dist_m[i],
                    geom_chi2: batch.geom_chi2[i],
                    ldf_chi2: batch.ldf_chi2[i],
                    ped_err: batch.ped_err[i],
                    frac_s800: derived.frac_s800[i],
                })
            })
            .collect())
    }

    /// Indices of accepted rows, in row order.
    ///
    /// # Errors
    /// See [`QualityCuts::mask`].
    pub fn select(&self, batch: &EventBatch, derived: &DerivedEvents) -> Result<Vec<usize>> {
        Ok(self
            .mask(batch, derived)?
            .into_iter()
            .enumerate()
            .filter_map(|(i, keep)| keep.then_some(i))
            .collect())
    }
}
