// Decodes WAV files into engine-ready clips. Runs on the control thread only;
// the audio thread never sees a file.
use std::path::{Path, PathBuf};

use crate::audio::{AudioBuffer, Clip, ClipBank};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("clip directory {0} does not exist")]
    MissingDir(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("failed to decode {path}: {source}")]
    Wav { path: PathBuf, source: hound::Error },
    #[error("{0} contains no audio")]
    Empty(PathBuf),
}

/// Explicitly constructed decoding service. Holds everything a decode needs,
/// so there is no process-wide format registry.
#[derive(Clone, Debug)]
pub struct ClipLoader {
    target_rate: u32,
    default_loop_bars: u32,
}

impl ClipLoader {
    pub fn new(target_rate: u32, default_loop_bars: u32) -> Self {
        Self {
            target_rate,
            default_loop_bars: default_loop_bars.max(1),
        }
    }

    // Load a WAV from disk, resampled to the engine rate.
    pub fn load(&self, path: &Path) -> Result<Clip, LoadError> {
        let mut reader = hound::WavReader::open(path).map_err(|source| LoadError::Wav {
            path: path.to_path_buf(),
            source,
        })?;
        let spec = reader.spec();
        let wav_err = |source| LoadError::Wav { path: path.to_path_buf(), source };

        // Read the samples from the WAV file
        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader // float, just pass it through
                .samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .map_err(wav_err)?,
            hound::SampleFormat::Int => { // int, scale into [-1, 1)
                let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|x| x as f32 / max))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(wav_err)?
            }
        };

        let channels = deinterleave(&samples, spec.channels.max(1) as usize);
        let mut buffer = AudioBuffer::from_channels(channels);
        if buffer.num_samples() == 0 {
            return Err(LoadError::Empty(path.to_path_buf()));
        }
        if spec.sample_rate != self.target_rate {
            buffer = resample_linear(&buffer, spec.sample_rate, self.target_rate);
        }

        let stem = clip_name(path);
        let tags = FileTags::parse(&stem);
        let mut clip = Clip::new(&stem, buffer, tags.bars.unwrap_or(self.default_loop_bars))
            .with_source_sample_rate(spec.sample_rate as f64);
        if let Some(bpm) = tags.bpm {
            clip = clip.with_source_bpm(bpm);
        }
        Ok(clip)
    }

    /// Like [`load`](Self::load), but a failure yields an unloaded clip so
    /// bank indices stay the same as the file list.
    pub fn load_or_placeholder(&self, path: &Path) -> Clip {
        match self.load(path) {
            Ok(clip) => clip,
            Err(e) => {
                log::warn!("{e}; keeping a silent placeholder");
                Clip::unloaded(&clip_name(path))
            }
        }
    }

    pub fn load_bank(&self, dir: &Path) -> Result<ClipBank, LoadError> {
        let paths = index_wav_in_dir(dir)?;
        let clips: Vec<Clip> = paths.iter().map(|p| self.load_or_placeholder(p)).collect();
        let loaded = clips.iter().filter(|c| c.is_loaded()).count();
        log::info!("loaded {loaded}/{} clips from {}", clips.len(), dir.display());
        Ok(ClipBank::new(clips))
    }
}

/// Every `.wav` under `dir`, recursively, sorted by path so indices are
/// stable between runs.
pub fn index_wav_in_dir(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    if !dir.is_dir() {
        return Err(LoadError::MissingDir(dir.to_path_buf()));
    }
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let entries = std::fs::read_dir(&current).map_err(|source| LoadError::Io {
            path: current.clone(),
            source,
        })?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                // skip our own state dir
                if path.file_name().is_some_and(|n| n.to_string_lossy().starts_with('.')) {
                    continue;
                }
                pending.push(path);
            } else if path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
            {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

fn clip_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// Loop metadata encoded in file names, e.g. `drums_2bar_128bpm.wav`.
#[derive(Debug, Default, PartialEq)]
struct FileTags {
    bars: Option<u32>,
    bpm: Option<f64>,
}

impl FileTags {
    fn parse(stem: &str) -> Self {
        let mut tags = Self::default();
        for token in stem.split(['_', '-', ' ']) {
            let lower = token.to_ascii_lowercase();
            if let Some(n) = lower.strip_suffix("bars").or_else(|| lower.strip_suffix("bar")) {
                if let Ok(bars) = n.parse::<u32>() {
                    if bars > 0 {
                        tags.bars = Some(bars);
                    }
                }
            } else if let Some(n) = lower.strip_suffix("bpm") {
                if let Ok(bpm) = n.parse::<f64>() {
                    if bpm > 0.0 {
                        tags.bpm = Some(bpm);
                    }
                }
            }
        }
        tags
    }
}

fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels;
    let mut out = vec![Vec::with_capacity(frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (ch, &s) in frame.iter().enumerate() {
            out[ch].push(s);
        }
    }
    out
}

fn resample_linear(buffer: &AudioBuffer, source_rate: u32, target_rate: u32) -> AudioBuffer {
    // Plain linear interpolation; good enough for loops that are mostly at the
    // device rate already.
    if source_rate == target_rate || source_rate == 0 || target_rate == 0 {
        return buffer.clone();
    }
    let ratio = target_rate as f64 / source_rate as f64;
    let in_len = buffer.num_samples();
    let out_len = (in_len as f64 * ratio).ceil() as usize;

    let channels = (0..buffer.num_channels())
        .map(|ch| {
            let src = buffer.channel(ch);
            (0..out_len)
                .map(|i| {
                    let src_pos = i as f64 / ratio; // ex. 3.7
                    let idx = src_pos.floor() as usize; // ex. 3
                    let frac = (src_pos - idx as f64) as f32; // ex. 0.7
                    if idx + 1 >= in_len {
                        src[in_len - 1]
                    } else {
                        src[idx] * (1.0 - frac) + src[idx + 1] * frac
                    }
                })
                .collect()
        })
        .collect();
    AudioBuffer::from_channels(channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, channels: u16, rate: u32, frames: usize) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            for ch in 0..channels {
                writer.write_sample((i as i16) * 10 + ch as i16).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn loads_stereo_int_wav_with_tags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drums_2bar_128bpm.wav");
        write_wav(&path, 2, 48000, 100);

        let clip = ClipLoader::new(48000, 1).load(&path).unwrap();
        assert!(clip.is_loaded());
        assert_eq!(clip.name(), "drums_2bar_128bpm");
        assert_eq!(clip.num_channels(), 2);
        assert_eq!(clip.len_samples(), 100);
        assert_eq!(clip.loop_bars(), 2);
        assert_eq!(clip.source_bpm(), 128.0);
    }

    #[test]
    fn float_wav_passes_samples_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hat.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 48000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..8 {
            writer.write_sample(0.25f32).unwrap();
        }
        writer.finalize().unwrap();

        let clip = ClipLoader::new(48000, 1).load(&path).unwrap();
        let mut out = AudioBuffer::new(1, 4);
        clip.render(&mut out, 0, 4, 0);
        assert_eq!(out.channel(0), &[0.25; 4]);
    }

    #[test]
    fn resamples_to_engine_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pad.wav");
        write_wav(&path, 1, 24000, 100);

        let clip = ClipLoader::new(48000, 4).load(&path).unwrap();
        assert_eq!(clip.len_samples(), 200);
        assert_eq!(clip.loop_bars(), 4);
        assert_eq!(clip.source_sample_rate(), 24000.0);
    }

    #[test]
    fn broken_file_becomes_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.wav");
        std::fs::write(&path, b"not a wav").unwrap();

        let loader = ClipLoader::new(48000, 1);
        assert!(matches!(loader.load(&path), Err(LoadError::Wav { .. })));
        let clip = loader.load_or_placeholder(&path);
        assert!(!clip.is_loaded());
        assert_eq!(clip.name(), "junk");
    }

    #[test]
    fn bank_is_sorted_recursive_and_keeps_failures() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::create_dir(dir.path().join(".barloop")).unwrap();
        write_wav(&dir.path().join("b.wav"), 1, 48000, 10);
        write_wav(&dir.path().join("sub").join("c.wav"), 1, 48000, 10);
        write_wav(&dir.path().join(".barloop").join("hidden.wav"), 1, 48000, 10);
        std::fs::write(dir.path().join("a.wav"), b"junk").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"hi").unwrap();

        let bank = ClipLoader::new(48000, 1).load_bank(dir.path()).unwrap();
        let names: Vec<String> = bank.iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(!bank.get(0).unwrap().is_loaded());
        assert!(bank.get(1).unwrap().is_loaded());
    }

    #[test]
    fn missing_dir_is_an_error() {
        let err = ClipLoader::new(48000, 1).load_bank(Path::new("/definitely/not/here"));
        assert!(matches!(err, Err(LoadError::MissingDir(_))));
    }

    #[test]
    fn file_tags_ignore_noise() {
        assert_eq!(FileTags::parse("bass_0bar_fast"), FileTags::default());
        assert_eq!(
            FileTags::parse("Keys-8Bars"),
            FileTags { bars: Some(8), bpm: None }
        );
    }
}
