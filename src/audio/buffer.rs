// Planar audio: one Vec<f32> per channel, all channels the same length.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    pub fn new(num_channels: usize, num_samples: usize) -> Self {
        Self {
            channels: vec![vec![0.0; num_samples]; num_channels],
        }
    }

    // Channels of unequal length are truncated to the shortest one.
    pub fn from_channels(mut channels: Vec<Vec<f32>>) -> Self {
        let len = channels.iter().map(Vec::len).min().unwrap_or(0);
        for ch in channels.iter_mut() {
            ch.truncate(len);
        }
        Self { channels }
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn num_samples(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn channel(&self, ch: usize) -> &[f32] {
        &self.channels[ch]
    }

    pub fn channel_mut(&mut self, ch: usize) -> &mut [f32] {
        &mut self.channels[ch]
    }

    // Zero only [start, start + len) in every channel.
    pub fn clear_range(&mut self, start: usize, len: usize) {
        for ch in self.channels.iter_mut() {
            let end = (start + len).min(ch.len());
            if start < end {
                ch[start..end].fill(0.0);
            }
        }
    }

    // missing source channels repeat the last one
    pub fn write_interleaved(&self, out: &mut [f32], out_channels: usize, frames: usize) {
        if out_channels == 0 || self.channels.is_empty() {
            out.fill(0.0);
            return;
        }
        let last = self.channels.len() - 1;
        for (i, frame) in out.chunks_exact_mut(out_channels).take(frames).enumerate() {
            for (c, sample) in frame.iter_mut().enumerate() {
                *sample = self.channels[c.min(last)].get(i).copied().unwrap_or(0.0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_channels_truncates_to_shortest() {
        let buf = AudioBuffer::from_channels(vec![vec![1.0; 4], vec![2.0; 3]]);
        assert_eq!(buf.num_channels(), 2);
        assert_eq!(buf.num_samples(), 3);
    }

    #[test]
    fn interleave_duplicates_mono_into_stereo() {
        let buf = AudioBuffer::from_channels(vec![vec![0.1, 0.2, 0.3]]);
        let mut out = [9.0f32; 6];
        buf.write_interleaved(&mut out, 2, 3);
        assert_eq!(out, [0.1, 0.1, 0.2, 0.2, 0.3, 0.3]);
    }

    #[test]
    fn clear_range_leaves_rest_untouched() {
        let mut buf = AudioBuffer::from_channels(vec![vec![1.0; 5]]);
        buf.clear_range(1, 2);
        assert_eq!(buf.channel(0), &[1.0, 0.0, 0.0, 1.0, 1.0]);
    }
}
