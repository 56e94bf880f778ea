//! In-process playback on the default output device.
//!
//! A rodio output stream is not `Send`, so each playback opens the device on
//! a blocking worker and releases it when the sound is over.

use core::time::Duration;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::{fs, thread};

use async_trait::async_trait;
use rodio::buffer::SamplesBuffer;
use rodio::{Decoder, OutputStream, Sink};
use tokio::task;

use crate::audio::{SoundDevice, ToneOutput, tone};
use crate::error::PlaybackError;

/// How long the muted playback runs before it is stopped.
const MUTED_WINDOW: Duration = Duration::from_millis(200);

fn open_sink() -> Result<(OutputStream, Sink), PlaybackError> {
    let (stream, handle) =
        OutputStream::try_default().map_err(|e| PlaybackError::Locked(e.to_string()))?;
    let sink = Sink::try_new(&handle).map_err(|e| PlaybackError::Locked(e.to_string()))?;
    Ok((stream, sink))
}

async fn blocking<F>(job: F) -> Result<(), PlaybackError>
where
    F: FnOnce() -> Result<(), PlaybackError> + Send + 'static,
{
    task::spawn_blocking(job)
        .await
        .map_err(|e| PlaybackError::Unavailable(format!("playback worker failed: {e}")))?
}

/// The alert asset, read and checked once at startup.
pub struct DeviceSound {
    asset: Option<Arc<[u8]>>,
}

impl DeviceSound {
    pub fn new(asset: &str) -> Self {
        let expanded = shellexpand::tilde(asset);
        let path = Path::new(expanded.as_ref());

        match fs::read(path) {
            Ok(bytes) => Self::from_bytes(bytes),
            Err(e) => {
                log::warn!("Sound file '{}' unreadable ({e}), using synthesized tone", path.display());
                Self { asset: None }
            }
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let asset: Arc<[u8]> = bytes.into();

        if let Err(e) = Decoder::new(Cursor::new(Arc::clone(&asset))) {
            log::warn!("Sound file can't be decoded ({e}), using synthesized tone");
            return Self { asset: None };
        }

        Self { asset: Some(asset) }
    }

    fn asset(&self) -> Result<Arc<[u8]>, PlaybackError> {
        self.asset
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| PlaybackError::Unavailable("no sound file".to_owned()))
    }
}

fn decode(asset: Arc<[u8]>) -> Result<Decoder<Cursor<Arc<[u8]>>>, PlaybackError> {
    Decoder::new(Cursor::new(asset)).map_err(|e| PlaybackError::Unavailable(e.to_string()))
}

#[async_trait]
impl SoundDevice for DeviceSound {
    fn is_available(&self) -> bool {
        self.asset.is_some()
    }

    async fn play(&self) -> Result<(), PlaybackError> {
        let asset = self.asset()?;

        blocking(move || {
            let source = decode(asset)?;
            let (_stream, sink) = open_sink()?;
            sink.append(source);
            sink.sleep_until_end();
            Ok(())
        })
        .await
    }

    async fn play_muted(&self) -> Result<(), PlaybackError> {
        let asset = self.asset()?;

        blocking(move || {
            let source = decode(asset)?;
            let (_stream, sink) = open_sink()?;
            sink.set_volume(0.0);
            sink.append(source);
            thread::sleep(MUTED_WINDOW);
            sink.stop();
            Ok(())
        })
        .await
    }
}

/// Plays the synthesized tone.
#[derive(Default)]
pub struct DeviceTone;

#[async_trait]
impl ToneOutput for DeviceTone {
    async fn beep(&self) {
        let result = blocking(|| {
            let samples = tone::synthesize(tone::FREQUENCY, tone::LENGTH, tone::SAMPLE_RATE);
            let (_stream, sink) = open_sink()?;
            sink.append(SamplesBuffer::new(1, tone::SAMPLE_RATE, samples));
            sink.sleep_until_end();
            Ok(())
        })
        .await;

        if let Err(e) = result {
            log::debug!("Fallback tone unavailable: {e}");
        }
    }
}
