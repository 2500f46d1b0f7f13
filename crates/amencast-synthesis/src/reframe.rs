//! Slicing decoded PCM into transport frames.

use amencast_core::{AudioFrame, SAMPLES_PER_FRAME};

/// Split one sentence's samples into 20 ms mono frames.
///
/// Every frame but the last is exactly [`SAMPLES_PER_FRAME`] long; the last
/// carries the remainder, so no sample is dropped or padded.
pub fn reframe(samples: &[i16]) -> Vec<AudioFrame> {
    reframe_with(samples, SAMPLES_PER_FRAME)
}

/// [`reframe`] with an explicit frame length.
pub fn reframe_with(samples: &[i16], frame_len: usize) -> Vec<AudioFrame> {
    samples
        .chunks(frame_len.max(1))
        .map(|chunk| AudioFrame::mono(chunk.to_vec()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn one_second_is_fifty_full_frames() {
        let frames = reframe(&vec![0i16; 16_000]);
        assert_eq!(frames.len(), 50);
        assert!(frames.iter().all(AudioFrame::is_full));
    }

    #[test]
    fn remainder_becomes_a_short_last_frame() {
        let frames = reframe(&vec![1i16; 700]);
        let lens: Vec<usize> = frames.iter().map(|f| f.samples.len()).collect();
        assert_eq!(lens, vec![320, 320, 60]);
    }

    #[test]
    fn empty_input_yields_no_frames() {
        assert!(reframe(&[]).is_empty());
    }

    proptest! {
        #[test]
        fn preserves_every_sample(samples in proptest::collection::vec(any::<i16>(), 0..5000)) {
            let frames = reframe(&samples);
            let total: usize = frames.iter().map(|f| f.samples.len()).sum();
            prop_assert_eq!(total, samples.len());
            prop_assert!(frames.iter().all(|f| f.samples.len() <= SAMPLES_PER_FRAME));
            if let Some((_, head)) = frames.split_last() {
                prop_assert!(head.iter().all(AudioFrame::is_full));
            }
            let rejoined: Vec<i16> = frames.into_iter().flat_map(|f| f.samples).collect();
            prop_assert_eq!(rejoined, samples);
        }
    }
}
