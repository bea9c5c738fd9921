use crate::timeline::{GainParam, Voice};

/// Mix every voice sounding inside the block into interleaved stereo.
///
/// `block_start` is the clock time of the first frame. Buffer position is
/// derived from clock time, so voices starting mid-block land on the right
/// frame and a voice's seek offset is honoured.
pub fn mix_voices(
    voices: &[Voice],
    master: &GainParam,
    block_start: f64,
    sample_rate: u32,
    out: &mut [f32],
) {
    out.fill(0.0);
    let frames = out.len() / 2;
    if frames == 0 {
        return;
    }
    let dt = 1.0 / sample_rate.max(1) as f64;
    let block_end = block_start + frames as f64 * dt;

    for voice in voices {
        if voice.start >= block_end || voice.end() <= block_start {
            continue;
        }
        let source_rate = voice.buffer.sample_rate as f64;
        for i in 0..frames {
            let t = block_start + i as f64 * dt;
            if !voice.is_sounding(t) {
                continue;
            }
            let position = (t - voice.start + voice.offset) * source_rate;
            let frame = position as usize;
            let gain = voice.gain.value_at(t);
            out[i * 2] += voice.buffer.sample(0, frame) * gain;
            out[i * 2 + 1] += voice.buffer.sample(1, frame) * gain;
        }
    }

    for i in 0..frames {
        let g = master.value_at(block_start + i as f64 * dt);
        out[i * 2] *= g;
        out[i * 2 + 1] *= g;
    }
}

/// Peak absolute sample, for level logging.
pub fn peak(block: &[f32]) -> f32 {
    block.iter().fold(0.0f32, |max, &s| max.max(s.abs()))
}
