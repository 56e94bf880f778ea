pub mod output;
pub mod tone;

use core::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::PlaybackError;

pub const DEBOUNCE: Duration = Duration::from_millis(800);

/// The preloaded alert sound.
#[async_trait]
pub trait SoundDevice {
    fn is_available(&self) -> bool;
    async fn play(&self) -> Result<(), PlaybackError>;
    /// Start a muted playback and stop it straight away. Succeeds when the
    /// output accepted the playback.
    async fn play_muted(&self) -> Result<(), PlaybackError>;
}

pub type DynSoundDevice = dyn SoundDevice + Send + Sync;

/// Last resort output for the synthesized tone. Never fails loudly.
#[async_trait]
pub trait ToneOutput {
    async fn beep(&self);
}

pub type DynToneOutput = dyn ToneOutput + Send + Sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// Within the debounce window of the previous attempt.
    Debounced,
    Played,
    Tone,
    Silent,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioState {
    pub unlocked: bool,
    pub last_played_at: Option<Instant>,
    pub use_beep_fallback: bool,
}

pub struct AudioAlert {
    device: Option<Box<DynSoundDevice>>,
    tone: Option<Box<DynToneOutput>>,
    debounce: Duration,
    state: Mutex<AudioState>,
}

impl AudioAlert {
    pub fn new(device: Option<Box<DynSoundDevice>>, tone: Option<Box<DynToneOutput>>) -> Self {
        Self {
            device,
            tone,
            debounce: DEBOUNCE,
            state: Mutex::new(AudioState::default()),
        }
    }

    /// No sound at all.
    pub fn muted() -> Self {
        Self::new(None, None)
    }

    pub async fn state(&self) -> AudioState {
        self.state.lock().await.clone()
    }

    /// The primary sound was refused and the output has not been unlocked
    /// since, so the user should be offered to enable sound.
    pub async fn sound_blocked(&self) -> bool {
        let state = self.state.lock().await;
        self.device.is_some() && state.use_beep_fallback && !state.unlocked
    }

    pub async fn play(&self) -> PlayOutcome {
        let use_fallback = {
            let mut state = self.state.lock().await;
            let now = Instant::now();

            if let Some(last) = state.last_played_at
                && now.duration_since(last) < self.debounce
            {
                log::debug!("Sound skipped, last one played {:?} ago", now.duration_since(last));
                return PlayOutcome::Debounced;
            }

            state.last_played_at = Some(now);
            state.use_beep_fallback
        };

        let device = match self.device {
            Some(ref device) if !use_fallback && device.is_available() => device,
            _ => return self.fallback().await,
        };

        match device.play().await {
            Ok(()) => PlayOutcome::Played,
            Err(PlaybackError::Locked(reason)) => {
                log::info!("Sound refused ({reason}), trying to unlock");
                self.try_unlock().await;

                match device.play().await {
                    Ok(()) => PlayOutcome::Played,
                    Err(e) => {
                        log::warn!("Sound still refused ({e}), using synthesized tone from now on");
                        self.state.lock().await.use_beep_fallback = true;
                        self.fallback().await
                    }
                }
            }
            Err(e) => {
                log::warn!("{e}");
                self.fallback().await
            }
        }
    }

    /// Returns whether the output is unlocked. Safe to call any number of
    /// times; once unlocked the muted playback is not repeated.
    pub async fn try_unlock(&self) -> bool {
        if self.state.lock().await.unlocked {
            return true;
        }

        let Some(ref device) = self.device else {
            return false;
        };

        match device.play_muted().await {
            Ok(()) => {
                self.state.lock().await.unlocked = true;
                log::info!("Sound unlocked");
                true
            }
            Err(e) => {
                log::debug!("Muted playback failed: {e}");
                false
            }
        }
    }

    async fn fallback(&self) -> PlayOutcome {
        match self.tone {
            Some(ref tone) => {
                tone.beep().await;
                PlayOutcome::Tone
            }
            None => PlayOutcome::Silent,
        }
    }
}
