//! Run-wide accumulation of log-energy streams.

use serde::Serialize;

/// Which input file a batch came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRole {
    /// Simulation result file, processed first.
    MonteCarlo,
    /// Real-detector result file, processed second.
    Data,
}

impl FileRole {
    /// Processing order of both files.
    pub const ORDER: [FileRole; 2] = [FileRole::MonteCarlo, FileRole::Data];

    /// Position in the processing order (0 = MC, 1 = data).
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            FileRole::MonteCarlo => 0,
            FileRole::Data => 1,
        }
    }
}

/// The three growing log10(E/eV) streams of a run.
///
/// Fields are private; appends go through the named methods so a stream is
/// never addressed by position.
#[derive(Debug, Clone, Default)]
pub struct AccumulatedStreams {
    mc_reconstructed: Vec<f64>,
    data_reconstructed: Vec<f64>,
    mc_raw_truth: Vec<f64>,
}

impl AccumulatedStreams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append accepted MC reconstructed energies.
    pub fn append_mc_reconstructed(&mut self, log_energy: &[f64]) {
        self.mc_reconstructed.extend_from_slice(log_energy);
    }

    /// Append accepted data reconstructed energies.
    pub fn append_data_reconstructed(&mut self, log_energy: &[f64]) {
        self.data_reconstructed.extend_from_slice(log_energy);
    }

    /// Append thrown MC energies (no cuts).
    pub fn append_raw_truth(&mut self, log_energy: &[f64]) {
        self.mc_raw_truth.extend_from_slice(log_energy);
    }

    /// Append accepted energies to the stream owned by `role`.
    pub fn append_reconstructed(&mut self, role: FileRole, log_energy: &[f64]) {
        match role {
            FileRole::MonteCarlo => self.append_mc_reconstructed(log_energy),
            FileRole::Data => self.append_data_reconstructed(log_energy),
        }
    }

    /// Current stream lengths: (MC reconstructed, data reconstructed, raw truth).
    #[must_use]
    pub fn lens(&self) -> (usize, usize, usize) {
        (
            self.mc_reconstructed.len(),
            self.data_reconstructed.len(),
            self.mc_raw_truth.len(),
        )
    }

    /// Close the run and hand the streams out as plain sequences.
    #[must_use]
    pub fn finalize(self) -> FinalStreams {
        FinalStreams {
            mc_reconstructed: self.mc_reconstructed,
            data_reconstructed: self.data_reconstructed,
            mc_raw_truth: self.mc_raw_truth,
        }
    }
}

/// Finalised log10(E/eV) sequences. Order within a stream carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FinalStreams {
    pub mc_reconstructed: Vec<f64>,
    pub data_reconstructed: Vec<f64>,
    pub mc_raw_truth: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_appends() {
        let mut streams = AccumulatedStreams::new();
        streams.append_raw_truth(&[18.1, 18.2, 18.3]);
        streams.append_reconstructed(FileRole::MonteCarlo, &[18.2]);
        streams.append_reconstructed(FileRole::Data, &[19.0, 19.1]);
        streams.append_mc_reconstructed(&[18.3]);
        assert_eq!(streams.lens(), (2, 2, 3));

        let done = streams.finalize();
        assert_eq!(done.mc_reconstructed, vec![18.2, 18.3]);
        assert_eq!(done.data_reconstructed, vec![19.0, 19.1]);
        assert_eq!(done.mc_raw_truth.len(), 3);
    }

    #[test]
    fn test_role_order() {
        assert_eq!(FileRole::ORDER[0].index(), 0);
        assert_eq!(FileRole::ORDER[1].index(), 1);
    }
}
