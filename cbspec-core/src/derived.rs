//! Energy-scale, zenith and log-energy corrections.

use crate::config::{ArrayType, EEV_LOG_OFFSET, FD_ENERGY_CORRECTION};
use crate::soa::EventBatch;

/// Per-row derived values of one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedEvents {
    /// Reconstructed energy in EeV after the FD energy-scale correction.
    pub energy: Vec<f64>,
    /// log10 of the corrected reconstructed energy in eV.
    pub log_energy: Vec<f64>,
    /// Corrected thrown energy in EeV.
    pub mc_energy: Option<Vec<f64>>,
    /// log10 of the corrected thrown energy in eV.
    pub mc_log_energy: Option<Vec<f64>>,
    /// dsc / sc.
    pub frac_s800: Vec<f64>,
    /// Zenith angle in degrees with the array offset applied.
    pub zenith_deg: Vec<f64>,
}

impl DerivedEvents {
    /// Compute the derived fields for every row of `batch`.
    ///
    /// Non-positive energies are not filtered; they yield a non-finite
    /// logarithm that no energy bin accepts.
    #[must_use]
    pub fn compute(batch: &EventBatch, array: ArrayType) -> Self {
        let energy: Vec<f64> = batch.energy.iter().map(|&e| corrected_energy(e)).collect();
        let log_energy = energy.iter().map(|&e| log_energy_ev(e)).collect();
        let mc_energy: Option<Vec<f64>> = batch
            .mc_energy
            .as_ref()
            .map(|values| values.iter().map(|&e| corrected_energy(e)).collect());
        let mc_log_energy = mc_energy
            .as_ref()
            .map(|values| values.iter().map(|&e| log_energy_ev(e)).collect());
        let frac_s800 = batch
            .dsc
            .iter()
            .zip(&batch.sc)
            .map(|(&dsc, &sc)| dsc / sc)
            .collect();
        let offset = array.zenith_offset_deg();
        let zenith_deg = batch.zenith_deg.iter().map(|&theta| theta + offset).collect();

        Self {
            energy,
            log_energy,
            mc_energy,
            mc_log_energy,
            frac_s800,
            zenith_deg,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.energy.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.energy.is_empty()
    }

    /// Rows whose reconstructed log-energy is NaN or infinite.
    #[must_use]
    pub fn non_finite_count(&self) -> usize {
        self.log_energy.iter().filter(|v| !v.is_finite()).count()
    }

    /// Rows whose thrown log-energy is NaN or infinite; zero without truth.
    #[must_use]
    pub fn non_finite_truth_count(&self) -> usize {
        self.mc_log_energy
            .as_ref()
            .map_or(0, |values| values.iter().filter(|v| !v.is_finite()).count())
    }
}

/// Apply the FD energy-scale correction to an SD energy.
#[inline]
#[must_use]
pub fn corrected_energy(raw_eev: f64) -> f64 {
    raw_eev / FD_ENERGY_CORRECTION
}

/// log10(E/eV) of an energy in EeV.
#[inline]
#[must_use]
pub fn log_energy_ev(energy_eev: f64) -> f64 {
    energy_eev.log10() + EEV_LOG_OFFSET
}
