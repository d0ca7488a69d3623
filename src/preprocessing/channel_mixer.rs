//! Channel mixing utilities (multichannel to mono conversion)

use crate::error::AnalysisError;

/// Average planar channels into a single mono buffer
///
/// # Arguments
///
/// * `channels` - One slice per channel, all of equal length
///
/// # Returns
///
/// Mono samples. A single channel is returned as a copy.
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` if no channels are given or the
/// channel lengths differ.
pub fn downmix(channels: &[&[f32]]) -> Result<Vec<f32>, AnalysisError> {
    let first = channels
        .first()
        .ok_or_else(|| AnalysisError::InvalidInput("No channels to mix".to_string()))?;

    if channels.len() == 1 {
        return Ok(first.to_vec());
    }

    let len = first.len();
    if let Some(bad) = channels.iter().position(|c| c.len() != len) {
        return Err(AnalysisError::InvalidInput(format!(
            "Channel {} has {} samples, expected {}",
            bad,
            channels[bad].len(),
            len
        )));
    }

    log::debug!("Downmixing {} channels of {} samples", channels.len(), len);

    let scale = 1.0 / channels.len() as f32;
    let mut out = vec![0.0f32; len];
    for channel in channels {
        for (acc, &s) in out.iter_mut().zip(channel.iter()) {
            *acc += s;
        }
    }
    for s in &mut out {
        *s *= scale;
    }
    Ok(out)
}

/// Average interleaved PCM frames into a mono buffer
///
/// A trailing partial frame is ignored.
pub fn deinterleave_to_mono(
    interleaved: &[f32],
    channel_count: usize,
) -> Result<Vec<f32>, AnalysisError> {
    if channel_count == 0 {
        return Err(AnalysisError::InvalidInput(
            "Channel count must be > 0".to_string(),
        ));
    }
    if channel_count == 1 {
        return Ok(interleaved.to_vec());
    }

    let scale = 1.0 / channel_count as f32;
    Ok(interleaved
        .chunks_exact(channel_count)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect())
}
