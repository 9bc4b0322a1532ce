// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info, span, Level};

use crate::audio::{
    mixer::{AudioMixer, MixerInput, MixerSink, SinkControl},
    thread_priority, AudioError, Device as AudioDevice, SharedSource, Sink,
};
use crate::config;

/// Frames mixed per block by the producer thread.
const BLOCK_FRAMES: usize = 512;

/// Lock-free single producer, single consumer ring of f32 samples.
struct CircularBuffer {
    /// Samples stored as their bit patterns.
    buffer: Box<[AtomicU32]>,
    /// Capacity (always a power of 2)
    capacity: usize,
    read_pos: AtomicUsize,
    write_pos: AtomicUsize,
}

impl CircularBuffer {
    fn new(capacity: usize) -> Self {
        let cap = capacity.next_power_of_two();
        Self {
            buffer: (0..cap).map(|_| AtomicU32::new(0)).collect(),
            capacity: cap,
            read_pos: AtomicUsize::new(0),
            write_pos: AtomicUsize::new(0),
        }
    }

    /// Number of samples available to read
    #[inline]
    fn available(&self) -> usize {
        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        if write >= read {
            write - read
        } else {
            self.capacity - read + write
        }
    }

    /// Space available to write
    #[inline]
    fn space(&self) -> usize {
        self.capacity - self.available() - 1
    }

    /// Returns the number of samples actually written.
    fn write(&self, samples: &[f32]) -> usize {
        let to_write = self.space().min(samples.len());
        let write = self.write_pos.load(Ordering::Acquire);
        let mask = self.capacity - 1;
        for (i, sample) in samples.iter().take(to_write).enumerate() {
            self.buffer[(write + i) & mask].store(sample.to_bits(), Ordering::Relaxed);
        }
        self.write_pos
            .store((write + to_write) & mask, Ordering::Release);
        to_write
    }

    /// Returns the number of samples actually read.
    fn read(&self, output: &mut [f32]) -> usize {
        let to_read = self.available().min(output.len());
        let read = self.read_pos.load(Ordering::Acquire);
        let mask = self.capacity - 1;
        for (i, sample) in output.iter_mut().take(to_read).enumerate() {
            *sample = f32::from_bits(self.buffer[(read + i) & mask].load(Ordering::Relaxed));
        }
        self.read_pos
            .store((read + to_read) & mask, Ordering::Release);
        to_read
    }
}

/// Output callback: read from the ring and convert to the stream's sample type.
fn create_callback<T: cpal::SizedSample + cpal::FromSample<f32>>(
    ring: Arc<CircularBuffer>,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static {
    let mut temp = Vec::new();
    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        temp.resize(data.len(), 0.0f32);
        let read = ring.read(&mut temp);
        // Zero-fill any shortfall
        temp[read..].fill(0.0);
        for (dst, &src) in data.iter_mut().zip(temp.iter()) {
            *dst = T::from_sample(src);
        }
    }
}

/// Owns the continuous output stream and the thread that mixes into it.
struct OutputManager {
    input_tx: crossbeam_channel::Sender<MixerInput>,
    running: Arc<AtomicBool>,
    online: Arc<AtomicBool>,
    sample_rate: u32,
    output_thread: Option<thread::JoinHandle<()>>,
    producer_thread: Option<thread::JoinHandle<()>>,
}

impl OutputManager {
    /// Starts the producer and output threads. Returns once the stream is playing.
    fn start(device: cpal::Device, num_channels: u16, sample_rate: u32) -> Result<Self, AudioError> {
        let (input_tx, input_rx) = crossbeam_channel::unbounded::<MixerInput>();
        let running = Arc::new(AtomicBool::new(true));
        let online = Arc::new(AtomicBool::new(true));

        // ~100ms of audio
        let capacity_samples = (sample_rate as usize * num_channels as usize) / 10;
        let ring = Arc::new(CircularBuffer::new(capacity_samples.max(4096)));

        let producer_thread = {
            let ring = ring.clone();
            let running = running.clone();
            thread::spawn(move || {
                thread_priority::raise_current_thread_priority(
                    thread_priority::mixer_thread_priority(),
                );
                let mut mixer = AudioMixer::new(num_channels, sample_rate);
                let block_samples = BLOCK_FRAMES * num_channels as usize;
                let mut scratch = vec![0.0f32; block_samples];

                while running.load(Ordering::Acquire) {
                    while let Ok(input) = input_rx.try_recv() {
                        mixer.add_input(input);
                    }

                    if ring.space() >= block_samples {
                        mixer.process_into_output(&mut scratch, BLOCK_FRAMES);
                        ring.write(&scratch);
                    } else {
                        thread::sleep(Duration::from_micros(500));
                    }
                }
            })
        };

        // cpal streams aren't Send, so the stream lives and dies on its own thread.
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), AudioError>>(1);
        let output_thread = {
            let running = running.clone();
            let online = online.clone();
            thread::spawn(move || {
                let stream = match build_stream(&device, num_channels, sample_rate, ring, online) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(AudioError::Stream(e.to_string())));
                    return;
                }
                info!("CPAL output stream started successfully");
                let _ = ready_tx.send(Ok(()));

                while running.load(Ordering::Acquire) {
                    thread::sleep(Duration::from_millis(100));
                }
            })
        };

        let manager = OutputManager {
            input_tx,
            running,
            online,
            sample_rate,
            output_thread: Some(output_thread),
            producer_thread: Some(producer_thread),
        };

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(manager),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                manager.online.store(false, Ordering::Release);
                Err(AudioError::Stream(
                    "output thread exited before the stream started".to_string(),
                ))
            }
        }
    }
}

fn build_stream(
    device: &cpal::Device,
    num_channels: u16,
    sample_rate: u32,
    ring: Arc<CircularBuffer>,
    online: Arc<AtomicBool>,
) -> Result<cpal::Stream, AudioError> {
    let sample_format = device
        .default_output_config()
        .map_err(|e| AudioError::Stream(e.to_string()))?
        .sample_format();
    let config = cpal::StreamConfig {
        channels: num_channels,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    let on_error = move |err: cpal::StreamError| {
        error!(err = %err, "CPAL output stream error");
        if matches!(err, cpal::StreamError::DeviceNotAvailable) {
            online.store(false, Ordering::Release);
        }
    };

    let stream = match sample_format {
        cpal::SampleFormat::F32 => {
            device.build_output_stream(&config, create_callback::<f32>(ring), on_error, None)
        }
        cpal::SampleFormat::I16 => {
            device.build_output_stream(&config, create_callback::<i16>(ring), on_error, None)
        }
        cpal::SampleFormat::U16 => {
            device.build_output_stream(&config, create_callback::<u16>(ring), on_error, None)
        }
        other => {
            return Err(AudioError::Unsupported(format!(
                "sample format {:?}",
                other
            )))
        }
    };

    stream.map_err(|e| AudioError::Stream(e.to_string()))
}

impl Drop for OutputManager {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(thread) = self.producer_thread.take() {
            let _ = thread.join();
        }
        if let Some(thread) = self.output_thread.take() {
            let _ = thread.join();
        }
    }
}

/// A small wrapper around a cpal::Device.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
    /// The running output stream. Devices that were only listed have none.
    output: Option<OutputManager>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn AudioDevice>>, AudioError> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn AudioDevice> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal devices.
    fn list_cpal_devices() -> Result<Vec<Device>, AudioError> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout().map_err(|e| AudioError::Stream(e.to_string()))?;
        let _shh_stderr = shh::stderr().map_err(|e| AudioError::Stream(e.to_string()))?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)
                .map_err(|e| e.to_string())
                .and_then(|host| host.devices().map_err(|e| e.to_string()))
            {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(err = e, host = host_id.name(), "Unable to list devices for host");
                    continue;
                }
            };

            for device in host_devices {
                let Ok(output_configs) = device.supported_output_configs() else {
                    continue;
                };
                let max_channels = output_configs
                    .map(|config| config.channels())
                    .max()
                    .unwrap_or(0);

                if max_channels > 0 {
                    let Ok(name) = device.name() else {
                        continue;
                    };
                    devices.push(Device {
                        name,
                        max_channels,
                        host_id,
                        device,
                        output: None,
                    })
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the given cpal device and starts its output stream. An exact name match wins,
    /// otherwise the name must match exactly one device by substring.
    pub fn get(config: &config::Audio) -> Result<Device, AudioError> {
        let name = config.device();
        let span = span!(Level::INFO, "audio device", device = name);
        let _enter = span.enter();

        let mut devices = Device::list_cpal_devices()?;
        let mut device = match devices.iter().position(|device| device.name.trim() == name) {
            Some(index) => devices.swap_remove(index),
            None => {
                let mut matches: Vec<Device> = devices
                    .into_iter()
                    .filter(|device| device.name.contains(name))
                    .collect();
                match matches.len() {
                    0 => return Err(AudioError::NotFound(name.to_string())),
                    1 => matches.remove(0),
                    count => {
                        return Err(AudioError::Ambiguous {
                            name: name.to_string(),
                            count,
                        })
                    }
                }
            }
        };

        device.output = Some(OutputManager::start(
            device.device.clone(),
            device.max_channels,
            config.sample_rate(),
        )?);
        info!(
            device = device.name,
            channels = device.max_channels,
            sample_rate = config.sample_rate(),
            "Opened audio device"
        );
        Ok(device)
    }
}

impl AudioDevice for Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn sample_rate(&self) -> u32 {
        self.output
            .as_ref()
            .map(|output| output.sample_rate)
            .unwrap_or(0)
    }

    fn bind(&self, source: SharedSource) -> Result<Box<dyn Sink>, AudioError> {
        let output = self
            .output
            .as_ref()
            .ok_or_else(|| AudioError::DeviceUnavailable(self.name.clone()))?;
        if !output.online.load(Ordering::Acquire) {
            return Err(AudioError::DeviceUnavailable(self.name.clone()));
        }

        let control = Arc::new(SinkControl::default());
        output
            .input_tx
            .send(MixerInput::new(
                source,
                control.clone(),
                output.sample_rate,
            )?)
            .map_err(|_| AudioError::DeviceUnavailable(self.name.clone()))?;

        Ok(Box::new(MixerSink::new(
            control,
            self.name.clone(),
            output.online.clone(),
        )))
    }
}
