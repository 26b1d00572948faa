//! Audio narration: clip synthesis and the two-layer cache.
//!
//! A line is keyed by (play, line index, adaptation mode). On a cache miss
//! the resolved text is synthesized through an OpenAI-compatible speech
//! endpoint, dialogue gets a narrator announcement spliced in front of the
//! character clip, and the bytes are uploaded to Telegram. The file id
//! Telegram issues comes back into the cache so the identical key later
//! resends the clip without synthesizing again.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use playbill_core::config::Config;
use playbill_core::play::{Line, LineKind, Play};
use tracing::debug;

use crate::telegram::TelegramClient;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_SPEECH_MODEL: &str = "gpt-4o-mini-tts";
const DEFAULT_NARRATOR_VOICE: &str = "alloy";
const DEFAULT_SEGMENT_GAP_MS: u64 = 350;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct ClipKey {
    pub play_id: String,
    pub line_index: usize,
    pub adaptation: bool,
}

pub(crate) struct Narrator {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    narrator_voice: String,
    segment_gap: Duration,
    cache: Mutex<HashMap<ClipKey, String>>,
}

impl Narrator {
    /// Builds a narrator when speech synthesis is configured; `None`
    /// disables audio narration entirely.
    pub(crate) fn from_config(config: &Config) -> Option<Self> {
        let api_key = config
            .audio
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .or_else(|| {
                std::env::var("PLAYBILL_TTS_API_KEY")
                    .ok()
                    .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                    .map(|key| key.trim().to_string())
                    .filter(|key| !key.is_empty())
            })?;

        Some(Self {
            http: reqwest::Client::new(),
            api_key,
            base_url: config
                .audio
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: config
                .audio
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_SPEECH_MODEL.to_string()),
            narrator_voice: config
                .audio
                .narrator_voice
                .clone()
                .unwrap_or_else(|| DEFAULT_NARRATOR_VOICE.to_string()),
            segment_gap: Duration::from_millis(
                config.audio.segment_gap_ms.unwrap_or(DEFAULT_SEGMENT_GAP_MS),
            ),
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Delivers the clip for a line, synthesizing on a cache miss.
    ///
    /// Runs off the text delivery path; failures are the caller's to log.
    pub(crate) async fn deliver(
        &self,
        client: &TelegramClient,
        chat_id: i64,
        play: &Play,
        line_index: usize,
        adaptation: bool,
    ) -> Result<()> {
        let key = ClipKey {
            play_id: play.id.clone(),
            line_index,
            adaptation,
        };

        let cached = {
            let cache = self.cache.lock().expect("clip cache poisoned");
            cache.get(&key).cloned()
        };
        if let Some(file_id) = cached {
            debug!(play_id = %key.play_id, line = line_index, "resending cached clip");
            return client.send_audio_file_id(chat_id, &file_id).await;
        }

        let line = play
            .line(line_index)
            .ok_or_else(|| anyhow!("line {} out of range for {}", line_index, play.id))?;
        let bytes = self.synthesize_line(play, line, adaptation).await?;

        let title = match line.kind {
            LineKind::Stage => "Stage".to_string(),
            LineKind::Dialogue => line.sender.clone().unwrap_or_else(|| "—".to_string()),
        };
        let file_id = client
            .send_audio_bytes(chat_id, bytes, &title, &play.title)
            .await?;

        // Concurrent synthesis of the same key is tolerated; last write wins.
        self.cache
            .lock()
            .expect("clip cache poisoned")
            .insert(key, file_id);
        Ok(())
    }

    /// Stage directions become one narrator clip; dialogue becomes a
    /// narrator announcement of the speaker plus the line in the speaker's
    /// voice, separated by a short silence.
    async fn synthesize_line(&self, play: &Play, line: &Line, adaptation: bool) -> Result<Vec<u8>> {
        let text = line
            .resolved_text(adaptation)
            .ok_or_else(|| anyhow!("line has no resolvable text"))?;

        match line.kind {
            LineKind::Stage => self.speech(&self.narrator_voice, text).await,
            LineKind::Dialogue => {
                let speaker = line.sender.as_deref().unwrap_or("A voice");
                let voice = self.dialogue_voice(play, line);
                let announcement = self.speech(&self.narrator_voice, speaker).await?;
                let spoken = self.speech(voice, text).await?;
                concat_wav(&announcement, &spoken, self.segment_gap)
            }
        }
    }

    /// Character voice, else the play's default, else the narrator default.
    fn dialogue_voice<'a>(&'a self, play: &'a Play, line: &Line) -> &'a str {
        line.sender
            .as_deref()
            .and_then(|sender| play.character(sender))
            .and_then(|character| character.voice.as_deref())
            .or(play.default_voice.as_deref())
            .unwrap_or(&self.narrator_voice)
    }

    async fn speech(&self, voice: &str, input: &str) -> Result<Vec<u8>> {
        let url = format!("{}/audio/speech", self.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "voice": voice,
                "input": input,
                "response_format": "wav",
            }))
            .send()
            .await
            .map_err(|_| anyhow!("Speech synthesis request failed"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Speech synthesis failed: {} {}", status, body);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|_| anyhow!("Failed to read synthesized audio"))?;
        Ok(bytes.to_vec())
    }
}

/// Splices two WAV clips with a silence gap between them. Both clips must
/// share a sample spec; the synthesis endpoint returns a stable format for
/// a given model.
fn concat_wav(first: &[u8], second: &[u8], gap: Duration) -> Result<Vec<u8>> {
    let mut first = hound::WavReader::new(Cursor::new(first))?;
    let mut second = hound::WavReader::new(Cursor::new(second))?;
    let spec = first.spec();
    if second.spec() != spec {
        bail!("clip sample specs differ; cannot splice");
    }

    let gap_samples =
        (f64::from(spec.sample_rate) * gap.as_secs_f64()) as usize * spec.channels as usize;

    let mut out = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut out, spec)?;
        for sample in first.samples::<i16>() {
            writer.write_sample(sample?)?;
        }
        for _ in 0..gap_samples {
            writer.write_sample(0_i16)?;
        }
        for sample in second.samples::<i16>() {
            writer.write_sample(sample?)?;
        }
        writer.finalize()?;
    }
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::time::Duration;

    use super::concat_wav;

    fn tone(samples: usize) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut out = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut out, spec).expect("writer");
            for i in 0..samples {
                writer
                    .write_sample(if i % 2 == 0 { 2_000_i16 } else { -2_000 })
                    .expect("sample");
            }
            writer.finalize().expect("finalize");
        }
        out.into_inner()
    }

    #[test]
    fn splices_clips_with_a_silence_gap() {
        let first = tone(800);
        let second = tone(400);
        let joined = concat_wav(&first, &second, Duration::from_millis(500)).expect("concat");

        let mut reader = hound::WavReader::new(Cursor::new(joined.as_slice())).expect("reader");
        // 500ms at 8kHz mono is 4000 samples of silence.
        assert_eq!(reader.len(), 800 + 4_000 + 400);
        let samples: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
        assert!(samples[800..4_800].iter().all(|&sample| sample == 0));
        assert_eq!(samples[..800], tone_samples(&tone(800))[..]);
    }

    #[test]
    fn rejects_mismatched_sample_specs() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut out = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut out, spec).expect("writer");
            writer.write_sample(0_i16).expect("sample");
            writer.write_sample(0_i16).expect("sample");
            writer.finalize().expect("finalize");
        }
        let stereo = out.into_inner();

        assert!(concat_wav(&tone(100), &stereo, Duration::from_millis(100)).is_err());
    }

    fn tone_samples(bytes: &[u8]) -> Vec<i16> {
        hound::WavReader::new(Cursor::new(bytes))
            .expect("reader")
            .samples::<i16>()
            .map(Result::unwrap)
            .collect()
    }

    #[test]
    fn clip_cache_is_plain_write_once_storage() {
        // The cache layer is a HashMap keyed by (play, line, adaptation);
        // exercised here without the network-facing synthesis path.
        let mut cache: HashMap<super::ClipKey, String> = HashMap::new();
        let key = super::ClipKey {
            play_id: "hamlet".to_string(),
            line_index: 3,
            adaptation: false,
        };
        assert!(cache.get(&key).is_none());
        cache.insert(key.clone(), "file-abc".to_string());
        assert_eq!(cache.get(&key).map(String::as_str), Some("file-abc"));

        let other_mode = super::ClipKey {
            adaptation: true,
            ..key
        };
        assert!(cache.get(&other_mode).is_none());
    }
}
