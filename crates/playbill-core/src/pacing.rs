//! Delay and typing-indicator math for the delivery modes.
//!
//! Pure computation only; arming the timers is the engine's job.

use std::time::Duration;

use rand::Rng;

use crate::session::DeliveryMode;

/// Ambient mode waits a uniform 10-60 minutes, independent of content.
const AMBIENT_MIN_MINUTES: f64 = 10.0;
const AMBIENT_MAX_MINUTES: f64 = 60.0;

/// Active mode paces against the previous line at a 200 wpm reading speed.
const READING_WORDS_PER_MINUTE: f64 = 200.0;
/// Dramatic pause appended after the reading time, 2-3.5s.
const BEAT_MIN_SECS: f64 = 2.0;
const BEAT_MAX_SECS: f64 = 3.5;
const ACTIVE_MIN_SECS: f64 = 3.0;
const ACTIVE_MAX_SECS: f64 = 45.0;

/// Typing indicator lead scales with the upcoming line's length.
const TYPING_MS_PER_WORD: u64 = 120;
const TYPING_MIN_MS: u64 = 600;
const TYPING_MAX_MS: u64 = 4_000;
/// The indicator never fires later than this long before delivery.
const TYPING_SAFETY_MS: u64 = 300;

/// Delay before delivering the next line, or `None` in manual mode.
///
/// `previous_words` is the word count of the line immediately preceding the
/// one about to be delivered.
pub fn delivery_delay(mode: DeliveryMode, previous_words: usize) -> Option<Duration> {
    let mut rng = rand::thread_rng();
    match mode {
        DeliveryMode::Manual => None,
        DeliveryMode::Ambient => {
            let minutes = rng.gen_range(AMBIENT_MIN_MINUTES..AMBIENT_MAX_MINUTES);
            Some(Duration::from_secs_f64(minutes * 60.0))
        }
        DeliveryMode::Active => {
            let reading_secs = previous_words as f64 / READING_WORDS_PER_MINUTE * 60.0;
            let beat = rng.gen_range(BEAT_MIN_SECS..BEAT_MAX_SECS);
            let secs = (reading_secs + beat).clamp(ACTIVE_MIN_SECS, ACTIVE_MAX_SECS);
            Some(Duration::from_secs_f64(secs))
        }
    }
}

/// How long before delivery the composing indicator should appear.
///
/// Clamped to 600ms-4s by the upcoming line's length, and never later than
/// 300ms before delivery; a very short delay floors the lead at zero.
pub fn typing_lead(next_words: usize, delay: Duration) -> Duration {
    let lead_ms = (next_words as u64 * TYPING_MS_PER_WORD).clamp(TYPING_MIN_MS, TYPING_MAX_MS);
    let latest = delay.saturating_sub(Duration::from_millis(TYPING_SAFETY_MS));
    Duration::from_millis(lead_ms).min(latest)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{delivery_delay, typing_lead};
    use crate::session::DeliveryMode;

    #[test]
    fn manual_mode_never_delays() {
        for words in [0, 1, 10, 500] {
            assert!(delivery_delay(DeliveryMode::Manual, words).is_none());
        }
    }

    #[test]
    fn ambient_delay_stays_within_ten_to_sixty_minutes() {
        for _ in 0..200 {
            let delay = delivery_delay(DeliveryMode::Ambient, 0).expect("ambient delay");
            assert!(delay >= Duration::from_secs(600), "{delay:?}");
            assert!(delay <= Duration::from_secs(3_600), "{delay:?}");
        }
    }

    #[test]
    fn active_delay_is_clamped_for_any_word_count() {
        for words in [0, 1, 10, 150, 100_000] {
            for _ in 0..50 {
                let delay = delivery_delay(DeliveryMode::Active, words).expect("active delay");
                assert!(delay >= Duration::from_secs(3), "{words} words: {delay:?}");
                assert!(delay <= Duration::from_secs(45), "{words} words: {delay:?}");
            }
        }
    }

    #[test]
    fn active_delay_scales_with_reading_time() {
        // 150 words at 200 wpm is 45s of reading; with the beat it saturates.
        for _ in 0..20 {
            let delay = delivery_delay(DeliveryMode::Active, 150).expect("active delay");
            assert_eq!(delay, Duration::from_secs(45));
        }
    }

    #[test]
    fn typing_lead_is_clamped_and_respects_delivery() {
        // Per-word scaling within the clamp window.
        assert_eq!(
            typing_lead(10, Duration::from_secs(30)),
            Duration::from_millis(1_200)
        );
        // Floor for terse lines.
        assert_eq!(
            typing_lead(1, Duration::from_secs(30)),
            Duration::from_millis(600)
        );
        // Ceiling for long lines.
        assert_eq!(
            typing_lead(500, Duration::from_secs(30)),
            Duration::from_millis(4_000)
        );
    }

    #[test]
    fn typing_lead_never_fires_after_delivery() {
        let delay = Duration::from_secs(3);
        let lead = typing_lead(500, delay);
        assert_eq!(lead, delay - Duration::from_millis(300));

        // A delay shorter than the safety margin floors the lead at zero.
        let tight = typing_lead(500, Duration::from_millis(200));
        assert_eq!(tight, Duration::ZERO);
    }
}
