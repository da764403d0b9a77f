use std::io::Cursor;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::engine::AudioBuffer;

const BITS_PER_SAMPLE: u16 = 16;
const HEADER_LEN: usize = 44;

/// Encode `audio` as 16-bit PCM WAV.
///
/// The output depends on the samples, channel count and sample rate only:
/// no timestamps or other chunks are written, so identical buffers always
/// produce identical bytes.
pub fn encode(audio: &AudioBuffer) -> Result<Vec<u8>, hound::Error> {
    let spec = WavSpec {
        channels: audio.channels,
        sample_rate: audio.sample_rate,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(HEADER_LEN + audio.samples.len() * 2));
    let mut writer = WavWriter::new(&mut cursor, spec)?;
    for &sample in &audio.samples {
        writer.write_sample(to_pcm16(sample))?;
    }
    writer.finalize()?;
    Ok(cursor.into_inner())
}

/// Decode a WAV body into interleaved `f32` samples, keeping its channels.
pub fn decode(bytes: &[u8]) -> Result<AudioBuffer, hound::Error> {
    let mut reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        SampleFormat::Int => {
            let bits = u32::from(spec.bits_per_sample.max(1));
            let max_val = if bits > 1 {
                ((1i64 << (bits - 1)) - 1) as f32
            } else {
                1.0
            };
            reader
                .samples::<i32>()
                .map(|s| s.map(|s| (s as f32 / max_val).clamp(-1.0, 1.0)))
                .collect::<Result<Vec<_>, _>>()?
        }
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
    };

    Ok(AudioBuffer {
        samples,
        channels: spec.channels,
        sample_rate: spec.sample_rate,
    })
}

fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}
