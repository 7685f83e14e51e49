//! Energy binning in log10(E/eV) and the statistical-validity mask.
#![allow(clippy::cast_precision_loss)]

use crate::error::{Error, Result};
use crate::streams::FinalStreams;
use serde::Serialize;

/// Bins at or below this center (log10 eV) are never reported.
pub const MIN_VALID_LOG_ENERGY: f64 = 18.5;
/// Bins need strictly more thrown events than this to be reported.
pub const MIN_THROWN_COUNT: u64 = 1;

/// Strictly increasing log10(E/eV) bin edges.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnergyBins {
    edges: Vec<f64>,
}

impl Default for EnergyBins {
    /// 16 bins of 0.1 decade from 10^18 to 10^19.6 eV.
    fn default() -> Self {
        Self {
            edges: (0..17).map(|i| 18.0 + 0.1 * f64::from(i)).collect(),
        }
    }
}

impl EnergyBins {
    /// Create bins from explicit edges.
    ///
    /// # Errors
    /// Returns [`Error::InvalidBinEdges`] unless there are at least two finite,
    /// strictly increasing edges.
    pub fn new(edges: Vec<f64>) -> Result<Self> {
        if edges.len() < 2 {
            return Err(Error::InvalidBinEdges(format!(
                "need at least 2 edges, got {}",
                edges.len()
            )));
        }
        if let Some(bad) = edges.iter().find(|e| !e.is_finite()) {
            return Err(Error::InvalidBinEdges(format!("edge {bad} is not finite")));
        }
        if let Some(i) = edges.windows(2).position(|w| w[1] <= w[0]) {
            return Err(Error::InvalidBinEdges(format!(
                "edges must be strictly increasing: {} then {}",
                edges[i],
                edges[i + 1]
            )));
        }
        Ok(Self { edges })
    }

    /// `n_edges` evenly spaced edges from `min` to `max` inclusive.
    ///
    /// # Errors
    /// Returns [`Error::InvalidBinEdges`] if the resulting edges are invalid.
    pub fn linspace(min: f64, max: f64, n_edges: usize) -> Result<Self> {
        if n_edges < 2 {
            return Err(Error::InvalidBinEdges(format!(
                "need at least 2 edges, got {n_edges}"
            )));
        }
        let step = (max - min) / (n_edges - 1) as f64;
        let edges = (0..n_edges)
            .map(|i| if i == n_edges - 1 { max } else { min + step * i as f64 })
            .collect();
        Self::new(edges)
    }

    #[must_use]
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Number of bins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len() - 1
    }

    /// Always false; construction guarantees at least one bin.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Midpoints of adjacent edges.
    #[must_use]
    pub fn centers(&self) -> Vec<f64> {
        self.edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
    }

    /// Edge differences.
    #[must_use]
    pub fn widths(&self) -> Vec<f64> {
        self.edges.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Bin holding `value`: `edge[i] <= value < edge[i + 1]`, with the last bin
    /// closed on the right. Values outside the edges, and NaN, have no bin.
    #[must_use]
    pub fn bin_index(&self, value: f64) -> Option<usize> {
        let first = self.edges[0];
        let last = self.edges[self.edges.len() - 1];
        if !(value >= first && value <= last) {
            return None;
        }
        let upper = self.edges.partition_point(|&edge| edge <= value);
        Some((upper - 1).min(self.len() - 1))
    }

    /// Count values per bin.
    #[must_use]
    pub fn histogram(&self, values: &[f64]) -> Vec<u64> {
        let mut counts = vec![0u64; self.len()];
        for &value in values {
            if let Some(i) = self.bin_index(value) {
                counts[i] += 1;
            }
        }
        counts
    }
}

/// Validity mask: center above [`MIN_VALID_LOG_ENERGY`] and more than
/// [`MIN_THROWN_COUNT`] thrown events.
///
/// # Errors
/// Returns [`Error::LengthMismatch`] if the slices differ in length.
pub fn validity_mask(centers: &[f64], raw_truth_counts: &[u64]) -> Result<Vec<bool>> {
    if centers.len() != raw_truth_counts.len() {
        return Err(Error::LengthMismatch {
            what: "raw truth counts",
            expected: centers.len(),
            actual: raw_truth_counts.len(),
        });
    }
    Ok(centers
        .iter()
        .zip(raw_truth_counts)
        .map(|(&center, &raw)| center > MIN_VALID_LOG_ENERGY && raw > MIN_THROWN_COUNT)
        .collect())
}

/// Keep only the entries where `mask` is true.
#[must_use]
pub fn apply_mask<T: Copy>(values: &[T], mask: &[bool]) -> Vec<T> {
    values
        .iter()
        .zip(mask)
        .filter_map(|(&value, &keep)| keep.then_some(value))
        .collect()
}

/// Per-bin counts of the three streams over every bin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinnedCounts {
    pub centers: Vec<f64>,
    pub widths: Vec<f64>,
    pub mc_reconstructed: Vec<u64>,
    pub data_reconstructed: Vec<u64>,
    pub mc_raw_truth: Vec<u64>,
    /// True for bins that carry statistical meaning.
    pub mask: Vec<bool>,
}

impl BinnedCounts {
    /// Histogram the finalised streams.
    ///
    /// # Errors
    /// Propagates mask construction errors (cannot happen for consistent bins).
    pub fn from_streams(bins: &EnergyBins, streams: &FinalStreams) -> Result<Self> {
        let centers = bins.centers();
        let mc_raw_truth = bins.histogram(&streams.mc_raw_truth);
        let mask = validity_mask(&centers, &mc_raw_truth)?;
        Ok(Self {
            widths: bins.widths(),
            mc_reconstructed: bins.histogram(&streams.mc_reconstructed),
            data_reconstructed: bins.histogram(&streams.data_reconstructed),
            mc_raw_truth,
            centers,
            mask,
        })
    }

    /// Number of bins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.centers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    /// Drop masked-out bins from every array.
    #[must_use]
    pub fn masked(&self) -> MaskedBins {
        let bin_index = (0..self.len()).collect::<Vec<_>>();
        MaskedBins {
            bin_index: apply_mask(&bin_index, &self.mask),
            centers: apply_mask(&self.centers, &self.mask),
            widths: apply_mask(&self.widths, &self.mask),
            mc_reconstructed: apply_mask(&self.mc_reconstructed, &self.mask),
            data_reconstructed: apply_mask(&self.data_reconstructed, &self.mask),
            mc_raw_truth: apply_mask(&self.mc_raw_truth, &self.mask),
        }
    }
}

/// Bins surviving the validity mask. Excluded bins are absent, not zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaskedBins {
    /// Position of each surviving bin in the full binning.
    pub bin_index: Vec<usize>,
    pub centers: Vec<f64>,
    pub widths: Vec<f64>,
    pub mc_reconstructed: Vec<u64>,
    pub data_reconstructed: Vec<u64>,
    pub mc_raw_truth: Vec<u64>,
}

impl MaskedBins {
    #[must_use]
    pub fn len(&self) -> usize {
        self.centers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn bins() -> EnergyBins {
        EnergyBins::new(vec![18.0, 18.4, 18.8, 19.2]).unwrap()
    }

    #[test]
    fn test_centers_and_widths() {
        let bins = bins();
        let centers = bins.centers();
        let widths = bins.widths();
        assert_eq!(bins.len(), 3);
        assert_relative_eq!(centers[0], 18.2, epsilon = 1e-12);
        assert_relative_eq!(centers[2], 19.0, epsilon = 1e-12);
        for w in widths {
            assert_relative_eq!(w, 0.4, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_default_bins() {
        let bins = EnergyBins::default();
        assert_eq!(bins.len(), 16);
        assert_relative_eq!(bins.edges()[0], 18.0);
        assert_relative_eq!(bins.edges()[16], 19.6, epsilon = 1e-12);
        let spaced = EnergyBins::linspace(18.0, 19.6, 17).unwrap();
        for (a, b) in bins.edges().iter().zip(spaced.edges()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_invalid_edges() {
        assert!(EnergyBins::new(vec![18.0]).is_err());
        assert!(EnergyBins::new(vec![18.0, 18.0]).is_err());
        assert!(EnergyBins::new(vec![19.0, 18.0]).is_err());
        assert!(EnergyBins::new(vec![18.0, f64::NAN]).is_err());
        assert!(EnergyBins::linspace(18.0, 19.0, 1).is_err());
    }

    #[test]
    fn test_histogram_edge_semantics() {
        let bins = bins();
        // Lower edges are inclusive, the final edge belongs to the last bin.
        let values = [18.0, 18.39, 18.4, 18.8, 19.2, 17.9, 19.21];
        assert_eq!(bins.histogram(&values), vec![2, 1, 2]);
        assert_eq!(bins.bin_index(19.2), Some(2));
        assert_eq!(bins.bin_index(19.2001), None);
        assert_eq!(bins.bin_index(17.999), None);
    }

    #[test]
    fn test_histogram_ignores_non_finite() {
        let bins = bins();
        let values = [f64::NAN, f64::NEG_INFINITY, f64::INFINITY, 18.5];
        assert_eq!(bins.histogram(&values), vec![0, 1, 0]);
    }

    #[test]
    fn test_histogram_total_counts_in_range() {
        let bins = EnergyBins::linspace(18.0, 20.0, 21).unwrap();
        let values: Vec<f64> = (0..500).map(|i| 17.5 + f64::from(i) * 0.006).collect();
        let in_range = values.iter().filter(|&&v| (18.0..=20.0).contains(&v)).count();
        let counts = bins.histogram(&values);
        assert_eq!(counts.iter().sum::<u64>(), in_range as u64);
        for &v in &values {
            if let Some(i) = bins.bin_index(v) {
                let edges = bins.edges();
                assert!(edges[i] <= v);
                assert!(v < edges[i + 1] || (i == bins.len() - 1 && v <= edges[i + 1]));
            }
        }
    }

    #[test]
    fn test_mask_is_conjunction() {
        let centers = [18.4, 18.5, 18.6, 18.7, 18.8];
        let raw = [10, 10, 1, 2, 0];
        let mask = validity_mask(&centers, &raw).unwrap();
        assert_eq!(mask, vec![false, false, false, true, false]);

        // Flipping one condition alone flips only that bin.
        let mask_low_center = validity_mask(&[18.5, 18.7], &[2, 2]).unwrap();
        assert_eq!(mask_low_center, vec![false, true]);
        let mask_low_raw = validity_mask(&[18.7, 18.7], &[1, 2]).unwrap();
        assert_eq!(mask_low_raw, vec![false, true]);
    }

    #[test]
    fn test_mask_length_mismatch() {
        assert!(matches!(
            validity_mask(&[18.6, 18.7], &[3]),
            Err(Error::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_binned_counts_drop_masked_bins() {
        let bins = EnergyBins::new(vec![18.0, 18.4, 18.8, 19.2, 19.6]).unwrap();
        let streams = FinalStreams {
            mc_reconstructed: vec![18.1, 18.5, 18.6, 19.0, 19.3],
            data_reconstructed: vec![18.9, 19.0, 19.5],
            mc_raw_truth: vec![18.1, 18.2, 18.5, 18.6, 18.7, 19.0, 19.1, 19.4],
        };
        let counts = BinnedCounts::from_streams(&bins, &streams).unwrap();
        assert_eq!(counts.mc_raw_truth, vec![2, 3, 2, 1]);
        assert_eq!(counts.mask, vec![false, true, true, false]);

        let masked = counts.masked();
        assert_eq!(masked.bin_index, vec![1, 2]);
        assert_eq!(masked.mc_reconstructed, vec![2, 1]);
        assert_eq!(masked.data_reconstructed, vec![0, 2]);
        assert_eq!(masked.mc_raw_truth, vec![3, 2]);
        assert_relative_eq!(masked.centers[0], 18.6, epsilon = 1e-12);
        assert_eq!(masked.len(), 2);
    }
}
