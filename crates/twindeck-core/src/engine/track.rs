//! Decoded track data ready to be copied into a deck

use super::error::{DeckError, DeckResult};
use crate::types::Sample;

/// Two equal-length channels of decoded samples
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    left: Vec<Sample>,
    right: Vec<Sample>,
}

impl Track {
    /// Build a track from separate channels
    ///
    /// Both channels must be non-empty, equally long and contain only finite
    /// samples.
    pub fn new(left: Vec<Sample>, right: Vec<Sample>) -> DeckResult<Self> {
        if left.is_empty() {
            return Err(DeckError::invalid("track has no samples"));
        }
        if left.len() != right.len() {
            return Err(DeckError::invalid(format!(
                "channel lengths differ: left {} vs right {}",
                left.len(),
                right.len()
            )));
        }
        if let Some(index) = left
            .iter()
            .chain(right.iter())
            .position(|sample| !sample.is_finite())
        {
            return Err(DeckError::invalid(format!(
                "non-finite sample at index {index}"
            )));
        }
        Ok(Self { left, right })
    }

    /// Build a track from interleaved samples
    ///
    /// Mono is duplicated to both channels; for more than two channels only
    /// the first two are kept.
    pub fn from_interleaved(samples: &[Sample], channels: usize) -> DeckResult<Self> {
        if channels == 0 {
            return Err(DeckError::invalid("channel count must be non-zero"));
        }
        if samples.len() % channels != 0 {
            return Err(DeckError::invalid(format!(
                "{} samples is not a whole number of {}-channel frames",
                samples.len(),
                channels
            )));
        }

        let (left, right) = if channels == 1 {
            (samples.to_vec(), samples.to_vec())
        } else {
            samples
                .chunks_exact(channels)
                .map(|frame| (frame[0], frame[1]))
                .unzip()
        };
        Self::new(left, right)
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        self.left.len()
    }

    /// Always false for a constructed track
    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Duration in seconds at `sample_rate`
    pub fn duration_secs(&self, sample_rate: u32) -> f64 {
        self.len() as f64 / sample_rate as f64
    }

    pub fn left(&self) -> &[Sample] {
        &self.left
    }

    pub fn right(&self) -> &[Sample] {
        &self.right
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_mismatched_channels() {
        assert!(Track::new(vec![0.0; 4], vec![0.0; 3]).is_err());
        assert!(Track::new(vec![], vec![]).is_err());
    }

    #[test]
    fn test_rejects_non_finite_samples() {
        let err = Track::new(vec![0.0, f32::NAN], vec![0.0, 0.0]).unwrap_err();
        assert!(matches!(err, DeckError::InvalidArgument(_)));
        assert!(Track::new(vec![0.0, 0.0], vec![f32::INFINITY, 0.0]).is_err());
    }

    #[test]
    fn test_deinterleaves_stereo_and_mono() {
        let stereo = Track::from_interleaved(&[0.1, -0.1, 0.2, -0.2, 0.3, -0.3], 2).unwrap();
        assert_eq!(stereo.len(), 3);
        assert_eq!(stereo.left(), &[0.1, 0.2, 0.3]);
        assert_eq!(stereo.right(), &[-0.1, -0.2, -0.3]);

        let mono = Track::from_interleaved(&[0.5, 0.25], 1).unwrap();
        assert_eq!(mono.left(), mono.right());

        let quad = Track::from_interleaved(&[1.0, 2.0, 3.0, 4.0], 4).unwrap();
        assert_eq!(quad.left(), &[1.0]);
        assert_eq!(quad.right(), &[2.0]);
    }

    #[test]
    fn test_rejects_partial_frames() {
        assert!(Track::from_interleaved(&[0.0, 0.0, 0.0], 2).is_err());
        assert!(Track::from_interleaved(&[0.0], 0).is_err());
    }

    #[test]
    fn test_duration() {
        let track = Track::new(vec![0.0; 44_100], vec![0.0; 44_100]).unwrap();
        assert_eq!(track.duration_secs(44_100), 1.0);
    }
}
