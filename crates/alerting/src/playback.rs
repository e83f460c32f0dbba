//! Alarm Playback
//!
//! Plays the alert sound through an external decoder/player process that
//! reads WAV data on stdin. A fresh player is spawned for every alert, so
//! no audio device handle outlives a single playback.

use std::future::Future;
use std::io::ErrorKind;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Embedded alert sound: two-tone beeps, 16 kHz mono PCM WAV
pub static ALERT_SOUND: &[u8] = include_bytes!("../assets/alert.wav");

/// Player command used when none is configured
pub const DEFAULT_PLAYER: &str = "aplay -q -";

/// Longest a single playback may run before the player is killed
const DEFAULT_MAX_PLAYBACK: Duration = Duration::from_secs(60);

/// Errors during alarm playback
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Player command line was empty
    #[error("No player command configured")]
    NoPlayer,

    /// Player process could not be started
    #[error("Failed to start player {program}: {reason}")]
    Spawn { program: String, reason: String },

    /// Feeding or waiting on the player failed
    #[error("Player I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Player could not decode or output the sound
    #[error("Player exited with {0}")]
    PlayerFailed(ExitStatus),

    /// Player ran past the playback limit and was killed
    #[error("Playback exceeded {0:?}")]
    TimedOut(Duration),
}

/// Audible alert side effect
pub trait Alarm: Send + Sync {
    /// Play the alarm once
    fn play(&self) -> impl Future<Output = Result<(), PlaybackError>> + Send;
}

impl<T: Alarm> Alarm for Arc<T> {
    fn play(&self) -> impl Future<Output = Result<(), PlaybackError>> + Send {
        (**self).play()
    }
}

/// Alarm backed by an external player process
#[derive(Debug, Clone)]
pub struct PlayerAlarm {
    program: String,
    args: Vec<String>,
    sound: Arc<[u8]>,
    max_playback: Duration,
}

impl PlayerAlarm {
    /// Create from a whitespace-separated command line, e.g. `aplay -q -`
    pub fn new(command: &str, sound: impl Into<Arc<[u8]>>) -> Result<Self, PlaybackError> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(PlaybackError::NoPlayer)?;

        Ok(Self {
            program,
            args: parts.collect(),
            sound: sound.into(),
            max_playback: DEFAULT_MAX_PLAYBACK,
        })
    }

    /// Override the playback limit
    pub fn with_max_playback(mut self, max_playback: Duration) -> Self {
        self.max_playback = max_playback;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    async fn run_player(&self) -> Result<(), PlaybackError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PlaybackError::Spawn {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(&self.sound).await {
                // Player quit early; its exit status says why
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                    debug!("Player closed stdin early");
                }
                other => other?,
            }
            // Dropping stdin sends EOF
        }

        let status = child.wait().await?;
        if status.success() {
            Ok(())
        } else {
            Err(PlaybackError::PlayerFailed(status))
        }
    }
}

impl Alarm for PlayerAlarm {
    async fn play(&self) -> Result<(), PlaybackError> {
        info!("Playing alert sound via {}", self.program);

        // On timeout the child future is dropped, which kills the player
        match tokio::time::timeout(self.max_playback, self.run_player()).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Player {} still running after {:?}, killed", self.program, self.max_playback);
                Err(PlaybackError::TimedOut(self.max_playback))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parsing() {
        let alarm = PlayerAlarm::new(DEFAULT_PLAYER, ALERT_SOUND).unwrap();
        assert_eq!(alarm.program(), "aplay");
        assert_eq!(alarm.args, vec!["-q".to_string(), "-".to_string()]);
    }

    #[test]
    fn test_empty_command() {
        assert!(matches!(
            PlayerAlarm::new("   ", ALERT_SOUND),
            Err(PlaybackError::NoPlayer)
        ));
    }

    #[test]
    fn test_embedded_sound_is_audible() {
        use symphonia::core::audio::SampleBuffer;
        use symphonia::core::codecs::DecoderOptions;
        use symphonia::core::formats::{FormatOptions, FormatReader};
        use symphonia::core::io::MediaSourceStream;
        use symphonia::default::formats::WavReader;

        let source = std::io::Cursor::new(ALERT_SOUND.to_vec());
        let stream = MediaSourceStream::new(Box::new(source), Default::default());
        let mut format = WavReader::try_new(stream, &FormatOptions::default()).unwrap();
        let track = format.default_track().unwrap();
        let track_id = track.id;
        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .unwrap();

        let mut samples = 0usize;
        let mut peak = 0.0f32;
        while let Ok(packet) = format.next_packet() {
            if packet.track_id() != track_id {
                continue;
            }
            let decoded = decoder.decode(&packet).unwrap();
            let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
            buffer.copy_interleaved_ref(decoded);
            samples += buffer.samples().len();
            peak = buffer.samples().iter().fold(peak, |p, s| p.max(s.abs()));
        }

        // At least a second of sound, loud enough to wake someone
        assert!(samples >= 16_000, "only {} samples decoded", samples);
        assert!(peak > 0.5, "peak amplitude {}", peak);
    }

    #[tokio::test]
    async fn test_missing_player() {
        let alarm = PlayerAlarm::new("definitely-not-a-player-binary", ALERT_SOUND).unwrap();
        assert!(matches!(alarm.play().await, Err(PlaybackError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_playback() {
        let alarm = PlayerAlarm::new("cat", ALERT_SOUND).unwrap();
        alarm.play().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_player_failure() {
        let alarm = PlayerAlarm::new("false", ALERT_SOUND).unwrap();
        assert!(matches!(alarm.play().await, Err(PlaybackError::PlayerFailed(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_playback_timeout() {
        let alarm = PlayerAlarm::new("sleep 5", ALERT_SOUND)
            .unwrap()
            .with_max_playback(Duration::from_millis(100));
        assert!(matches!(alarm.play().await, Err(PlaybackError::TimedOut(_))));
    }
}
