use std::io::Cursor;

use symphonia::core::{
    codecs::CODEC_TYPE_NULL, errors::Error as SymphoniaError, formats::FormatOptions,
    io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("\"{0}\" is not a valid source location")]
    InvalidLocation(String),

    #[error("Failed to fetch source: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("Fetching source failed with status {0}")]
    Status(reqwest::StatusCode),

    #[error("Failed to read source: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode source: {0}")]
    Decode(#[from] SymphoniaError),

    #[error("Source contains no supported audio track")]
    NoAudioTrack,

    #[error("Length of the source could not be determined")]
    UnknownLength,

    #[error("Probe task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Reads the length in seconds of an encoded audio file.
///
/// The extension, if given, helps Symphonia pick the right format reader.
pub fn probe_duration(bytes: Vec<u8>, extension: Option<&str>) -> Result<f32, ProbeError> {
    let mut hint = Hint::new();

    if let Some(extension) = extension {
        hint.with_extension(extension);
    }

    let stream = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let probed = symphonia::default::get_probe().format(
        &hint,
        stream,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let track = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(ProbeError::NoAudioTrack)?;

    let params = &track.codec_params;
    let time = params
        .time_base
        .zip(params.n_frames)
        .map(|(time_base, n_frames)| time_base.calc_time(n_frames))
        .ok_or(ProbeError::UnknownLength)?;

    Ok(time.seconds as f32 + time.frac as f32)
}

/// Encodes silent 16-bit mono PCM as a WAV file.
#[cfg(test)]
pub(crate) fn silent_wav(sample_rate: u32, samples: u32) -> Vec<u8> {
    let data_len = samples * 2;
    let mut bytes = Vec::with_capacity(44 + data_len as usize);

    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");

    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&1u16.to_le_bytes()); // mono
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());

    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    bytes.resize(44 + data_len as usize, 0);

    bytes
}
