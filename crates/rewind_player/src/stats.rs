//! Playback statistics derived from the history buffer.

use rewind_history::HistoryBuffer;
use serde::Serialize;

/// Timing derived from the history buffer and the clock rate.
///
/// `played_time_ms <= total_time_ms` always holds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PlaybackStats {
    /// Time covered by past frames.
    pub played_time_ms: u64,
    /// Time covered by the full history capacity.
    pub total_time_ms: u64,
    /// Time covered by future frames available for replay.
    pub cache_time_ms: u64,
    pub past_frames: usize,
    pub future_frames: usize,
    pub max_frames: usize,
}

fn frames_to_ms(frames: usize, rate: f64) -> u64 {
    (frames as f64 * 1000.0 / rate).round() as u64
}

impl PlaybackStats {
    /// Compute the statistics for `history` at `rate` ticks per second.
    pub fn from_history(history: &dyn HistoryBuffer, rate: f64) -> Self {
        let past_frames = history.past_frames_available();
        let future_frames = history.future_frames_available();
        let max_frames = history.max_frame_count();

        Self {
            played_time_ms: frames_to_ms(past_frames, rate),
            total_time_ms: frames_to_ms(max_frames, rate),
            cache_time_ms: frames_to_ms(future_frames, rate),
            past_frames,
            future_frames,
            max_frames,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewind_history::HistoryKind;

    #[test]
    fn test_stats_from_history() {
        let mut history = HistoryKind::Raw.create_with(4, 600);
        for _ in 0..121 {
            history.submit_frame();
        }
        history.rewind_frames(60);

        let stats = PlaybackStats::from_history(history.as_ref(), 60.0);
        assert_eq!(stats.played_time_ms, 1000);
        assert_eq!(stats.cache_time_ms, 1000);
        assert_eq!(stats.total_time_ms, 10_000);
        assert_eq!(stats.past_frames, 60);
        assert_eq!(stats.future_frames, 60);
    }

    #[test]
    fn test_empty_history_is_zero() {
        let history = HistoryKind::DeltaPair.create_with(4, 10);
        let stats = PlaybackStats::from_history(history.as_ref(), 60.0);
        assert_eq!(stats.played_time_ms, 0);
        assert_eq!(stats.cache_time_ms, 0);
        assert_eq!(stats.total_time_ms, 167);
    }
}
