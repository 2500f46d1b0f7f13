//! Synthesized audio to 16 kHz mono s16 PCM.
//!
//! Raw `pcm_*` output is read directly; anything else is probed and decoded
//! with symphonia, mixed to mono and resampled with rubato.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use amencast_core::SAMPLE_RATE;
use amencast_core::audio::le_bytes_to_samples;

use crate::errors::SynthesisError;
use crate::synthesizer::{AudioEncoding, SynthesizedAudio};

/// Decode `audio` to pipeline-rate mono samples.
pub fn decode_to_pcm(audio: &SynthesizedAudio) -> Result<Vec<i16>, SynthesisError> {
    match &audio.encoding {
        AudioEncoding::Pcm { sample_rate } => {
            let samples = le_bytes_to_samples(&audio.data)
                .map_err(|e| SynthesisError::Decode(e.to_string()))?;
            if *sample_rate == SAMPLE_RATE {
                return Ok(samples);
            }
            let float: Vec<f32> = samples.iter().map(|s| f32::from(*s) / 32_768.0).collect();
            Ok(to_i16(&resample(&float, *sample_rate, SAMPLE_RATE)?))
        }
        AudioEncoding::Compressed { extension } => {
            let (samples, source_rate) = decode_compressed(&audio.data, extension)?;
            if source_rate == SAMPLE_RATE {
                return Ok(to_i16(&samples));
            }
            Ok(to_i16(&resample(&samples, source_rate, SAMPLE_RATE)?))
        }
    }
}

/// Decode a container to mono f32 at its native rate.
fn decode_compressed(data: &[u8], extension: &str) -> Result<(Vec<f32>, u32), SynthesisError> {
    let cursor = Cursor::new(data.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut hint = Hint::new();
    let _ = hint.with_extension(extension);

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| SynthesisError::Decode(format!("probe failed: {e}")))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| SynthesisError::Decode("no audio track found".into()))?;

    let codec_params = track.codec_params.clone();
    let track_id = track.id;
    let mut source_rate = codec_params.sample_rate.unwrap_or(SAMPLE_RATE);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| SynthesisError::Decode(format!("codec init failed: {e}")))?;

    let mut mono: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(SynthesisError::Decode(format!("packet read: {e}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            // A corrupt MP3 frame is skipped, not fatal.
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(SynthesisError::Decode(format!("decode: {e}"))),
        };

        let spec = *decoded.spec();
        source_rate = spec.rate;
        let channels = spec.channels.count().max(1);
        let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        let samples = sample_buf.samples();

        if channels > 1 {
            #[allow(clippy::cast_precision_loss)]
            let scale = channels as f32;
            for frame in samples.chunks(channels) {
                mono.push(frame.iter().sum::<f32>() / scale);
            }
        } else {
            mono.extend_from_slice(samples);
        }
    }

    if mono.is_empty() {
        return Err(SynthesisError::Decode("no audio samples decoded".into()));
    }

    Ok((mono, source_rate))
}

/// Resample mono audio from `from_rate` to `to_rate`.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, SynthesisError> {
    use rubato::{
        Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
    };

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = f64::from(to_rate) / f64::from(from_rate);
    let chunk_size = 1024;

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, chunk_size, 1)
        .map_err(|e| SynthesisError::Resample(format!("init: {e}")))?;

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let expected = (samples.len() as f64 * ratio).round() as usize;
    let mut output = Vec::with_capacity(expected + chunk_size);

    for chunk in samples.chunks(chunk_size) {
        let input = if chunk.len() < chunk_size {
            let mut padded = chunk.to_vec();
            padded.resize(chunk_size, 0.0);
            vec![padded]
        } else {
            vec![chunk.to_vec()]
        };

        let resampled = resampler
            .process(&input, None)
            .map_err(|e| SynthesisError::Resample(format!("process: {e}")))?;

        if let Some(channel) = resampled.first() {
            output.extend_from_slice(channel);
        }
    }

    // Drop what the zero padding of the last chunk produced.
    output.truncate(expected);
    Ok(output)
}

#[allow(clippy::cast_possible_truncation)]
fn to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|s| (s.clamp(-1.0, 1.0) * 32_767.0).round() as i16)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    use amencast_core::audio::samples_to_le_bytes;

    fn pcm(samples: &[i16], sample_rate: u32) -> SynthesizedAudio {
        SynthesizedAudio {
            data: samples_to_le_bytes(samples),
            encoding: AudioEncoding::Pcm { sample_rate },
        }
    }

    fn wav(sample_rate: u32, channels: u16, frames: usize) -> Bytes {
        let data_len = frames * usize::from(channels) * 2;
        let mut buf = Vec::with_capacity(44 + data_len);
        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&(36 + data_len as u32).to_le_bytes());
        buf.extend_from_slice(b"WAVEfmt ");
        buf.extend_from_slice(&16u32.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes());
        buf.extend_from_slice(&channels.to_le_bytes());
        buf.extend_from_slice(&sample_rate.to_le_bytes());
        buf.extend_from_slice(&(sample_rate * u32::from(channels) * 2).to_le_bytes());
        buf.extend_from_slice(&(channels * 2).to_le_bytes());
        buf.extend_from_slice(&16u16.to_le_bytes());
        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&(data_len as u32).to_le_bytes());
        for i in 0..frames * usize::from(channels) {
            let v = ((i % 64) as i16 - 32) * 256;
            buf.extend_from_slice(&v.to_le_bytes());
        }
        Bytes::from(buf)
    }

    #[test]
    fn pcm_at_pipeline_rate_is_passed_through() {
        let samples: Vec<i16> = (0..1000).map(|i| (i % 300) as i16).collect();
        let out = decode_to_pcm(&pcm(&samples, 16_000)).unwrap();
        assert_eq!(out, samples);
    }

    #[test]
    fn odd_length_pcm_is_rejected() {
        let audio = SynthesizedAudio {
            data: Bytes::from_static(&[1, 2, 3]),
            encoding: AudioEncoding::Pcm { sample_rate: 16_000 },
        };
        assert!(matches!(decode_to_pcm(&audio), Err(SynthesisError::Decode(_))));
    }

    #[test]
    fn pcm_is_resampled_to_pipeline_rate() {
        let samples = vec![0i16; 48_000];
        let out = decode_to_pcm(&pcm(&samples, 48_000)).unwrap();
        assert_eq!(out.len(), 16_000);
    }

    #[test]
    fn wav_at_pipeline_rate_keeps_sample_count() {
        let audio = SynthesizedAudio {
            data: wav(16_000, 1, 1600),
            encoding: AudioEncoding::Compressed {
                extension: "wav".into(),
            },
        };
        let out = decode_to_pcm(&audio).unwrap();
        assert_eq!(out.len(), 1600);
    }

    #[test]
    fn stereo_wav_is_mixed_down() {
        let audio = SynthesizedAudio {
            data: wav(16_000, 2, 800),
            encoding: AudioEncoding::Compressed {
                extension: "wav".into(),
            },
        };
        assert_eq!(decode_to_pcm(&audio).unwrap().len(), 800);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let audio = SynthesizedAudio {
            data: Bytes::from_static(b"not audio data"),
            encoding: AudioEncoding::Compressed {
                extension: "mp3".into(),
            },
        };
        assert!(matches!(decode_to_pcm(&audio), Err(SynthesisError::Decode(_))));
    }

    #[test]
    fn clamps_on_conversion() {
        assert_eq!(to_i16(&[2.0, -2.0, 0.0]), vec![32_767, -32_767, 0]);
    }
}
