use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, WindowFunction};
use hound::{SampleFormat, WavReader};
use std::path::{Path, PathBuf};
use std::process::Command;
use rayon::prelude::*;
use std::fs;
use anyhow::Result;
use tracing::{debug, info, warn};

/// Sample rate whisper expects.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

const VAD_FRAME_SIZE: usize = 1024;
const VAD_ENERGY_THRESHOLD: f32 = 0.005;

/// 解析音频文件
///
/// Decodes any audio file ffmpeg understands into 16 kHz mono samples in
/// `[-1, 1]`.
///
/// 1. Non-WAV input is converted with ffmpeg into a temporary WAV next to it
/// 2. The WAV is read, mixed down to mono and normalised
/// 3. With `vad_filter`, low-energy frames are zeroed (length is preserved so
///    segment timestamps still line up with the source)
/// 4. Resampled to 16 kHz if needed
pub fn load_audio(path: &Path, vad_filter: bool) -> Result<Vec<f32>> {
    let wav_path = ensure_wav_format(path)?;
    let decoded = read_wav_file(&wav_path);

    // 如果转换了文件，删除临时的WAV文件
    if wav_path != path {
        if let Err(e) = fs::remove_file(&wav_path) {
            warn!("Failed to remove temporary WAV file {:?}: {}", wav_path, e);
        }
    }

    let (samples, num_channels, sample_rate) = decoded?;
    let mono_samples = convert_to_mono(&samples, num_channels);
    let normalized_samples = normalize_audio(&mono_samples);
    let gated_samples = if vad_filter {
        voice_activity_detection(&normalized_samples, VAD_FRAME_SIZE, VAD_ENERGY_THRESHOLD)
    } else {
        normalized_samples
    };

    if sample_rate != TARGET_SAMPLE_RATE {
        resample_audio(&gated_samples, sample_rate)
    } else {
        debug!("Sample rate is already {} Hz, no resampling needed.", TARGET_SAMPLE_RATE);
        Ok(gated_samples)
    }
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| extension.eq_ignore_ascii_case("wav"))
        .unwrap_or(false)
}

/// 确保音频文件为WAV格式
///
/// Depends on `ffmpeg` being on the PATH for anything that is not WAV.
fn ensure_wav_format(path: &Path) -> Result<PathBuf> {
    if is_wav(path) {
        return Ok(path.to_path_buf());
    }

    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("audio");
    let output_path = path.with_file_name(format!("{}.decoded.wav", stem));
    info!("Converting {:?} to WAV format...", path);

    let status = Command::new("ffmpeg")
        .arg("-y")
        .arg("-i")
        .arg(path)
        .arg("-acodec")
        .arg("pcm_s16le")
        .arg("-ac")
        .arg("1")
        .arg("-ar")
        .arg(TARGET_SAMPLE_RATE.to_string())
        .arg(&output_path)
        .status()
        .map_err(|e| anyhow::anyhow!("Failed to execute ffmpeg: {}", e))?;

    if !status.success() {
        // ffmpeg may have written part of the output before failing
        if output_path.exists() {
            if let Err(e) = fs::remove_file(&output_path) {
                warn!("Failed to remove partial WAV file {:?}: {}", output_path, e);
            }
        }
        return Err(anyhow::anyhow!("FFmpeg conversion failed with status: {}", status));
    }

    Ok(output_path)
}

/// 读取WAV文件
///
/// Returns the interleaved samples, channel count and sample rate. Accepts
/// 16-bit integer and 32-bit float PCM.
fn read_wav_file(path: &Path) -> Result<(Vec<f32>, usize, u32)> {
    let mut reader = WavReader::open(path)
        .map_err(|e| anyhow::anyhow!("Failed to read WAV file: {}", e))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|val| val as f32 / i16::MAX as f32))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(|e| anyhow::anyhow!("Failed to read samples: {}", e))?,
        (SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(|e| anyhow::anyhow!("Failed to read samples: {}", e))?,
        (format, bits) => {
            return Err(anyhow::anyhow!(
                "Unsupported WAV encoding: {:?} with {} bits per sample",
                format,
                bits
            ))
        }
    };

    debug!("Read {} samples at {} Hz", samples.len(), spec.sample_rate);
    Ok((samples, spec.channels.max(1) as usize, spec.sample_rate))
}

/// 将多声道音频转换为单声道
fn convert_to_mono(samples: &[f32], num_channels: usize) -> Vec<f32> {
    if num_channels <= 1 {
        return samples.to_vec();
    }
    samples
        .par_chunks(num_channels)
        .map(|chunk| chunk.iter().sum::<f32>() / chunk.len() as f32)
        .collect()
}

/// 归一化音频
fn normalize_audio(samples: &[f32]) -> Vec<f32> {
    let max_abs = samples.par_iter().map(|s| s.abs()).reduce(|| 0.0, f32::max);
    if max_abs <= f32::EPSILON {
        return samples.to_vec();
    }
    samples.par_iter().map(|&s| s / max_abs).collect()
}

/// 重采样音频
fn resample_audio(samples: &[f32], original_sample_rate: u32) -> Result<Vec<f32>> {
    if samples.is_empty() {
        return Ok(Vec::new());
    }
    info!("Resampling from {} Hz to {} Hz", original_sample_rate, TARGET_SAMPLE_RATE);

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: rubato::SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(
        TARGET_SAMPLE_RATE as f64 / original_sample_rate as f64,
        2.0,
        params,
        samples.len(),
        1,
    )
    .map_err(|e| anyhow::anyhow!("Failed to create resampler: {}", e))?;

    let mut resampled = resampler
        .process(&[samples.to_vec()], None)
        .map_err(|e| anyhow::anyhow!("Resampling failed: {}", e))?;

    Ok(resampled.pop().unwrap_or_default())
}

/// 语音活动检测
///
/// Zeroes every frame whose mean energy is at or below `threshold`.
pub fn voice_activity_detection(samples: &[f32], frame_size: usize, threshold: f32) -> Vec<f32> {
    samples
        .par_chunks(frame_size)
        .flat_map(|chunk| {
            let energy = chunk.iter().map(|&s| s * s).sum::<f32>() / chunk.len() as f32;
            if energy > threshold {
                chunk.to_vec()
            } else {
                vec![0.0; chunk.len()]
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};

    fn write_wav(path: &Path, channels: u16, sample_rate: u32, frames: &[i16]) {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for &frame in frames {
            for _ in 0..channels {
                writer.write_sample(frame).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    fn tone(len: usize, amplitude: i16) -> Vec<i16> {
        (0..len)
            .map(|i| ((i as f32 * 0.05).sin() * amplitude as f32) as i16)
            .collect()
    }

    #[test]
    fn test_stereo_wav_is_mixed_to_normalized_mono() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("lesson.wav");
        write_wav(&path, 2, TARGET_SAMPLE_RATE, &tone(4096, 8000));

        let samples = load_audio(&path, false)?;
        assert_eq!(samples.len(), 4096);
        let peak = samples.iter().fold(0.0f32, |a, &b| a.max(b.abs()));
        assert!((peak - 1.0).abs() < 1e-4);
        Ok(())
    }

    #[test]
    fn test_vad_zeroes_quiet_frames_without_shifting_time() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("lesson.wav");
        let mut frames = vec![0i16; VAD_FRAME_SIZE];
        frames.extend(tone(VAD_FRAME_SIZE, 20000));
        write_wav(&path, 1, TARGET_SAMPLE_RATE, &frames);

        let samples = load_audio(&path, true)?;
        assert_eq!(samples.len(), 2 * VAD_FRAME_SIZE);
        assert!(samples[..VAD_FRAME_SIZE].iter().all(|&s| s == 0.0));
        assert!(samples[VAD_FRAME_SIZE..].iter().any(|&s| s != 0.0));
        Ok(())
    }

    #[test]
    fn test_other_rates_are_resampled() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("lesson.wav");
        write_wav(&path, 1, 8_000, &tone(8_000, 8000));

        let samples = load_audio(&path, false)?;
        assert!(samples.len() > 14_000 && samples.len() < 18_000, "got {}", samples.len());
        Ok(())
    }

    #[test]
    fn test_failed_conversion_leaves_no_decoded_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("lecture.mp3");
        fs::write(&path, b"definitely not audio")?;

        assert!(load_audio(&path, false).is_err());
        assert!(!dir.path().join("lecture.decoded.wav").exists());
        assert!(path.exists());
        Ok(())
    }

    #[test]
    fn test_silence_survives_normalization() {
        assert_eq!(normalize_audio(&[0.0, 0.0]), vec![0.0, 0.0]);
    }
}
