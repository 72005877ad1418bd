//! Audio output thread
//!
//! cpal streams are `!Send`, so playback runs on a dedicated thread that
//! owns the output stream. The device callback drains a shared sample
//! queue; queued patterns are mixed into it by the sequencer.

use crate::{tone, AlarmError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use tracing::{error, info};

/// Handle to the running output thread.
pub struct OutputHandle {
    queue: Arc<Mutex<VecDeque<f32>>>,
    sample_rate: u32,
    shutdown_tx: mpsc::Sender<()>,
}

impl OutputHandle {
    /// Spawn the output thread and wait for the device to come up.
    pub fn spawn() -> Result<Self, AlarmError> {
        let queue = Arc::new(Mutex::new(VecDeque::new()));
        let (ready_tx, ready_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel();

        let thread_queue = queue.clone();
        std::thread::Builder::new()
            .name("alarm-output".into())
            .spawn(move || run_output(thread_queue, ready_tx, shutdown_rx))
            .map_err(|e| AlarmError::Stream(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(sample_rate)) => Ok(Self {
                queue,
                sample_rate,
                shutdown_tx,
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(AlarmError::Stream("output thread exited early".to_string())),
        }
    }

    /// Mix one three-beep pattern into the playback queue.
    ///
    /// A pattern queued while another is still playing is summed over the
    /// remainder of the old one (and clamped), matching overlapping
    /// invocations of the alarm.
    pub fn mix_pattern(&self) {
        let pattern = tone::pattern_samples(self.sample_rate);
        if let Ok(mut queue) = self.queue.lock() {
            for (i, sample) in pattern.into_iter().enumerate() {
                if i < queue.len() {
                    queue[i] = (queue[i] + sample).clamp(-1.0, 1.0);
                } else {
                    queue.push_back(sample);
                }
            }
        }
    }

    /// Drop queued samples and stop the output thread.
    pub fn stop(&self) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.clear();
        }
        let _ = self.shutdown_tx.send(());
    }

    #[cfg(test)]
    pub(crate) fn queued_samples(&self) -> Vec<f32> {
        self.queue
            .lock()
            .map(|q| q.iter().copied().collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) fn for_test(sample_rate: u32) -> Self {
        let (shutdown_tx, _shutdown_rx) = mpsc::channel();
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            sample_rate,
            shutdown_tx,
        }
    }
}

fn stream_error(e: cpal::StreamError) {
    error!("Alarm stream error: {}", e);
}

/// Own the cpal stream for the lifetime of the session; exits on shutdown
/// (or when the handle is dropped, which closes the shutdown channel).
fn run_output(
    queue: Arc<Mutex<VecDeque<f32>>>,
    ready_tx: mpsc::Sender<Result<u32, AlarmError>>,
    shutdown_rx: mpsc::Receiver<()>,
) {
    let host = cpal::default_host();
    let device = match host.default_output_device() {
        Some(d) => d,
        None => {
            let _ = ready_tx.send(Err(AlarmError::NoDevice));
            return;
        }
    };

    let supported = match device.default_output_config() {
        Ok(c) => c,
        Err(e) => {
            let _ = ready_tx.send(Err(AlarmError::Config(e.to_string())));
            return;
        }
    };

    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels() as usize;
    let config = supported.config();

    let stream = match supported.sample_format() {
        cpal::SampleFormat::F32 => {
            let queue = queue.clone();
            device.build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if let Ok(mut queue) = queue.lock() {
                        for frame in data.chunks_mut(channels) {
                            let sample = queue.pop_front().unwrap_or(0.0);
                            frame.fill(sample);
                        }
                    } else {
                        data.fill(0.0);
                    }
                },
                stream_error,
                None,
            )
        }
        cpal::SampleFormat::I16 => {
            let queue = queue.clone();
            device.build_output_stream(
                &config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    if let Ok(mut queue) = queue.lock() {
                        for frame in data.chunks_mut(channels) {
                            let sample = queue.pop_front().unwrap_or(0.0);
                            frame.fill((sample * i16::MAX as f32) as i16);
                        }
                    } else {
                        data.fill(0);
                    }
                },
                stream_error,
                None,
            )
        }
        fmt => {
            let _ = ready_tx.send(Err(AlarmError::UnsupportedFormat(format!("{fmt:?}"))));
            return;
        }
    };

    let stream = match stream {
        Ok(s) => s,
        Err(e) => {
            let _ = ready_tx.send(Err(AlarmError::Stream(e.to_string())));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(AlarmError::Stream(e.to_string())));
        return;
    }

    info!("Alarm output ready: {} Hz, {} channels", sample_rate, channels);
    let _ = ready_tx.send(Ok(sample_rate));

    let _ = shutdown_rx.recv();
    info!("Alarm output stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tone;

    const RATE: u32 = 48000;

    #[test]
    fn test_mix_into_empty_queue_is_one_pattern() {
        let handle = OutputHandle::for_test(RATE);
        handle.mix_pattern();

        let queued = handle.queued_samples();
        assert_eq!(queued, tone::pattern_samples(RATE));
    }

    #[test]
    fn test_overlapping_patterns_are_summed() {
        let handle = OutputHandle::for_test(RATE);
        handle.mix_pattern();

        // Drain half the pattern, as if playback were mid-flight
        let half = tone::pattern_samples(RATE).len() / 2;
        if let Ok(mut queue) = handle.queue.lock() {
            queue.drain(..half);
        }
        handle.mix_pattern();

        let pattern = tone::pattern_samples(RATE);
        let queued = handle.queued_samples();

        // Second pattern extends the queue past the remainder of the first
        assert_eq!(queued.len(), pattern.len());

        // Where old and new overlap, samples are summed (clamped)
        let expected_head =
            (pattern[half] + pattern[0]).clamp(-1.0, 1.0);
        assert!((queued[0] - expected_head).abs() < 1e-6);
    }

    #[test]
    fn test_stop_clears_queue() {
        let handle = OutputHandle::for_test(RATE);
        handle.mix_pattern();
        handle.stop();

        assert!(handle.queued_samples().is_empty());
    }
}
