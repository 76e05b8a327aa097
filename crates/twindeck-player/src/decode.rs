//! WAV decoding into deck tracks
//!
//! Integer (8 to 32 bit) and float WAV files are converted to f32, split
//! into left/right channels and resampled to the decks' rate when needed.

use std::path::Path;

use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader};
use rubato::{FftFixedIn, Resampler};
use twindeck_core::engine::Track;

/// Input frames per resampler chunk
const RESAMPLE_CHUNK: usize = 1024;
/// FFT sub-chunks per chunk (higher = less latency, more CPU)
const RESAMPLE_SUB_CHUNKS: usize = 2;

/// Decode a WAV file into a [`Track`]
pub fn read_wav(path: &Path, sample_rate: u32) -> Result<Track> {
    let mut reader =
        WavReader::open(path).with_context(|| format!("Failed to open WAV file {:?}", path))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .with_context(|| format!("Failed to decode {:?}", path))?,
        SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()
                .with_context(|| format!("Failed to decode {:?}", path))?
        }
    };

    log::debug!(
        "Decoded {:?}: {} channels, {} bits, {} samples",
        path,
        spec.channels,
        spec.bits_per_sample,
        samples.len()
    );

    let track = Track::from_interleaved(&samples, spec.channels as usize)
        .with_context(|| format!("{:?} is not a playable track", path))?;

    if spec.sample_rate == sample_rate {
        return Ok(track);
    }
    log::info!(
        "Resampling {:?} from {}Hz to {}Hz",
        path,
        spec.sample_rate,
        sample_rate
    );
    resample(&track, spec.sample_rate, sample_rate)
        .with_context(|| format!("Failed to resample {:?}", path))
}

/// Convert a track between sample rates
///
/// The last chunk is zero-padded and the output is cut to the exact
/// converted length.
fn resample(track: &Track, from: u32, to: u32) -> Result<Track> {
    let mut resampler = FftFixedIn::<f32>::new(
        from as usize,
        to as usize,
        RESAMPLE_CHUNK,
        RESAMPLE_SUB_CHUNKS,
        2,
    )?;
    let chunk = resampler.input_frames_next();

    let frames = track.len();
    let expected = (frames as f64 * to as f64 / from as f64).ceil() as usize;
    let mut left = Vec::with_capacity(expected + chunk);
    let mut right = Vec::with_capacity(expected + chunk);

    let mut input = vec![vec![0.0f32; chunk]; 2];
    for start in (0..frames).step_by(chunk) {
        let end = (start + chunk).min(frames);
        for (buffer, channel) in input.iter_mut().zip([track.left(), track.right()]) {
            buffer.fill(0.0);
            buffer[..end - start].copy_from_slice(&channel[start..end]);
        }

        let output = resampler.process(&input, None)?;
        left.extend_from_slice(&output[0]);
        right.extend_from_slice(&output[1]);
    }

    left.truncate(expected);
    right.truncate(expected);
    Ok(Track::new(left, right)?)
}
