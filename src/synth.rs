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
use std::sync::Arc;

use midly::{
    live::LiveEvent,
    num::{u4, u7},
    MidiMessage,
};
use parking_lot::{Mutex, RwLock};
use tracing::{info, span, Level, Span};

use crate::audio::{self, AudioError};
use crate::config;
use crate::midi::{self, MidiError};
use crate::notes::{Note, MAX_OCTAVE, NOTE_COUNT};

pub mod channel;
pub mod generator;
pub mod mode;

use channel::NoteChannel;
use generator::GeneratorSettings;
pub use mode::{Mode, ModeError, Waveform};

#[derive(Debug, thiserror::Error)]
pub enum SynthError {
    #[error("MIDI mode requires a MIDI output device")]
    NoMidiDevice,

    #[error("waveform modes require an audio output device")]
    NoAudioDevice,

    #[error("note {note} in octave {octave} is outside the MIDI key range")]
    OutOfMidiRange { note: Note, octave: u8 },

    #[error("note channel has not been configured")]
    NotConfigured,

    #[error(transparent)]
    Midi(#[from] MidiError),

    #[error(transparent)]
    Audio(#[from] AudioError),
}

/// Synthesizer configuration. Changes apply to the next note played.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Settings {
    pub mode: Mode,
    pub gain: f32,
    pub octave: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            mode: Mode::Sine,
            gain: 0.5,
            octave: 4,
        }
    }
}

impl From<&config::Synth> for Settings {
    fn from(config: &config::Synth) -> Self {
        Settings {
            mode: config.mode(),
            gain: clamp_gain(config.gain()),
            octave: config.octave().min(MAX_OCTAVE),
        }
    }
}

/// What a held note is actually playing, fixed when it started.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Sounding {
    Midi { key: u7, velocity: u7 },
    Generator(GeneratorSettings),
}

struct Voice {
    active: bool,
    sounding: Option<Sounding>,
    channel: Option<NoteChannel>,
}

/// A twelve-note synthesizer that either drives a MIDI device or generates waveforms
/// directly. Each note is locked on its own, so different notes never wait on each other.
pub struct Synthesizer {
    settings: RwLock<Settings>,
    voices: [Mutex<Voice>; NOTE_COUNT],
    midi_device: Option<Arc<dyn midi::Device>>,
    midi_channel: u4,
    span: Span,
}

fn clamp_gain(gain: f32) -> f32 {
    if gain.is_nan() {
        0.0
    } else {
        gain.clamp(0.0, 1.0)
    }
}

/// MIDI velocity for a gain in [0, 1].
pub fn velocity(gain: f32) -> u7 {
    u7::new((127.0 * clamp_gain(gain)).round() as u8)
}

impl Synthesizer {
    /// Creates a synthesizer. The MIDI channel is zero based.
    pub fn new(
        settings: Settings,
        audio_device: Option<Arc<dyn audio::Device>>,
        midi_device: Option<Arc<dyn midi::Device>>,
        midi_channel: u4,
    ) -> Synthesizer {
        let settings = Settings {
            mode: settings.mode,
            gain: clamp_gain(settings.gain),
            octave: settings.octave.min(MAX_OCTAVE),
        };

        Synthesizer {
            settings: RwLock::new(settings),
            voices: std::array::from_fn(|_| {
                Mutex::new(Voice {
                    active: false,
                    sounding: None,
                    channel: audio_device.clone().map(NoteChannel::new),
                })
            }),
            midi_device,
            midi_channel,
            span: span!(Level::INFO, "synthesizer"),
        }
    }

    /// Creates a synthesizer from its configuration and the devices it names.
    pub fn from_config(
        config: &config::Synth,
        audio_device: Option<Arc<dyn audio::Device>>,
        midi_device: Option<Arc<dyn midi::Device>>,
        midi_channel: u4,
    ) -> Synthesizer {
        Synthesizer::new(
            Settings::from(config),
            audio_device,
            midi_device,
            midi_channel,
        )
    }

    /// Starts the note. Playing a note that's already held does nothing.
    pub fn play(&self, note: Note) -> Result<(), SynthError> {
        let _enter = self.span.enter();

        let settings = *self.settings.read();
        let mut voice = self.voices[note.index()].lock();
        if voice.active {
            return Ok(());
        }

        let sounding = match settings.mode.waveform() {
            None => {
                let device = self.midi_device.as_ref().ok_or(SynthError::NoMidiDevice)?;
                let key = note
                    .midi_key(settings.octave)
                    .ok_or(SynthError::OutOfMidiRange {
                        note,
                        octave: settings.octave,
                    })?;
                let velocity = velocity(settings.gain);
                device.emit(LiveEvent::Midi {
                    channel: self.midi_channel,
                    message: MidiMessage::NoteOn { key, vel: velocity },
                })?;
                Sounding::Midi { key, velocity }
            }
            Some(waveform) => {
                let channel = voice.channel.as_mut().ok_or(SynthError::NoAudioDevice)?;
                let generator = GeneratorSettings {
                    frequency: note.frequency(settings.octave),
                    waveform,
                    gain: settings.gain,
                };
                channel.configure(generator);
                channel.start()?;
                Sounding::Generator(generator)
            }
        };

        info!(
            note = %note,
            octave = settings.octave,
            mode = %settings.mode,
            "Note on."
        );
        voice.active = true;
        voice.sounding = Some(sounding);
        Ok(())
    }

    /// Stops the note. Always clears the note and silences its channel, whether or not it
    /// was playing. In MIDI mode a note off is always sent.
    pub fn stop(&self, note: Note) -> Result<(), SynthError> {
        let _enter = self.span.enter();

        let settings = *self.settings.read();
        let mut voice = self.voices[note.index()].lock();
        voice.active = false;
        let sounding = voice.sounding.take();
        if let Some(channel) = voice.channel.as_mut() {
            channel.stop();
        }

        // Release the key that was struck, not whatever the current octave maps to.
        let key = match sounding {
            Some(Sounding::Midi { key, .. }) => Some(key),
            _ if settings.mode.is_midi() => note.midi_key(settings.octave),
            _ => None,
        };

        if let (Some(key), Some(device)) = (key, self.midi_device.as_ref()) {
            device.emit(LiveEvent::Midi {
                channel: self.midi_channel,
                message: MidiMessage::NoteOff {
                    key,
                    vel: u7::new(0),
                },
            })?;
        }

        info!(note = %note, "Note off.");
        Ok(())
    }

    /// Stops every note. Every note is attempted; the first error is returned.
    pub fn stop_all(&self) -> Result<(), SynthError> {
        let mut result = Ok(());
        for note in Note::all() {
            if let Err(e) = self.stop(note) {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    pub fn set_mode(&self, mode: Mode) {
        self.settings.write().mode = mode;
        info!(parent: &self.span, mode = %mode, "Mode set.");
    }

    /// Sets the gain, clamped to [0, 1].
    pub fn set_gain(&self, gain: f32) {
        let gain = clamp_gain(gain);
        self.settings.write().gain = gain;
        info!(parent: &self.span, gain, "Gain set.");
    }

    /// Sets the octave, clamped to the highest octave.
    pub fn set_octave(&self, octave: u8) {
        let octave = octave.min(MAX_OCTAVE);
        self.settings.write().octave = octave;
        info!(parent: &self.span, octave, "Octave set.");
    }

    pub fn settings(&self) -> Settings {
        *self.settings.read()
    }

    pub fn is_active(&self, note: Note) -> bool {
        self.voices[note.index()].lock().active
    }

    /// What the note is playing, if it's held.
    pub fn sounding(&self, note: Note) -> Option<Sounding> {
        self.voices[note.index()].lock().sounding
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;
    use std::sync::Arc;

    use midly::num::{u4, u7};

    use crate::audio::{self, SinkState};
    use crate::midi;
    use crate::notes::Note;

    use super::{
        generator::GeneratorSettings, velocity, Mode, Settings, Sounding, SynthError,
        Synthesizer, Waveform,
    };

    fn settings(mode: Mode) -> Settings {
        Settings {
            mode,
            gain: 0.5,
            octave: 4,
        }
    }

    fn midi_synth(mode: Mode) -> (Synthesizer, Arc<midi::mock::Device>) {
        let midi_device = Arc::new(midi::mock::Device::get("mock-midi"));
        let midi: Arc<dyn midi::Device> = midi_device.clone();
        let synth = Synthesizer::new(settings(mode), None, Some(midi), u4::new(0));
        (synth, midi_device)
    }

    fn audio_synth(mode: Mode) -> (Synthesizer, Arc<audio::mock::Device>) {
        let audio_device = Arc::new(audio::mock::Device::get("mock-audio", 44100));
        let audio: Arc<dyn audio::Device> = audio_device.clone();
        let synth = Synthesizer::new(settings(mode), Some(audio), None, u4::new(0));
        (synth, audio_device)
    }

    #[test]
    fn midi_play_is_idempotent() -> Result<(), Box<dyn Error>> {
        let (synth, device) = midi_synth(Mode::Midi);
        let c = Note::from_index(0);
        synth.play(c)?;
        synth.play(c)?;
        assert_eq!(device.emitted(), vec![vec![0x90, 60, 64]]);
        assert!(synth.is_active(c));

        synth.stop(c)?;
        assert_eq!(device.last_emitted(), Some(vec![0x80, 60, 0]));
        assert!(!synth.is_active(c));

        synth.play(c)?;
        assert_eq!(device.emitted().len(), 3);
        Ok(())
    }

    #[test]
    fn waveform_play_is_idempotent() -> Result<(), Box<dyn Error>> {
        let (synth, device) = audio_synth(Mode::Sine);
        let a = Note::from_index(9);
        synth.play(a)?;
        synth.play(a)?;
        assert_eq!(device.sinks().len(), 1);
        assert_eq!(device.open_sinks()[0].state(), SinkState::Playing);

        synth.stop(a)?;
        assert!(device.open_sinks().is_empty());
        Ok(())
    }

    #[test]
    fn stop_without_play() -> Result<(), Box<dyn Error>> {
        let (synth, device) = audio_synth(Mode::Square);
        let d = Note::from_index(2);
        synth.stop(d)?;
        synth.stop(d)?;
        assert!(device.sinks().is_empty());
        assert!(!synth.is_active(d));

        // MIDI mode always releases the key.
        let (synth, device) = midi_synth(Mode::Midi);
        synth.stop(d)?;
        assert_eq!(device.emitted(), vec![vec![0x80, 62, 0]]);

        // Without a MIDI device there's nothing to release.
        let (synth, _) = audio_synth(Mode::Midi);
        synth.stop(d)?;
        Ok(())
    }

    #[test]
    fn square_c4() -> Result<(), Box<dyn Error>> {
        let (synth, _) = audio_synth(Mode::Square);
        let c = Note::from_index(0);
        synth.play(c)?;
        let Some(Sounding::Generator(generator)) = synth.sounding(c) else {
            panic!("expected a generator");
        };
        assert!((generator.frequency - 261.6).abs() < 1e-9);
        assert_eq!(generator.waveform, Waveform::Square);
        assert_eq!(generator.gain, 0.5);
        Ok(())
    }

    /// Sign changes on the left channel of interleaved stereo output.
    fn left_sign_changes(output: &[f32]) -> usize {
        let left: Vec<bool> = output.iter().step_by(2).map(|s| *s >= 0.0).collect();
        left.windows(2).filter(|pair| pair[0] != pair[1]).count()
    }

    #[test]
    fn settings_do_not_repitch_held_notes() -> Result<(), Box<dyn Error>> {
        let (synth, device) = audio_synth(Mode::Square);
        let c = Note::from_index(0);
        synth.play(c)?;

        // One second of C4 changes sign twice per cycle.
        let before = device.render(44100);
        assert!((520..=527).contains(&left_sign_changes(&before)));

        synth.set_octave(5);
        synth.set_mode(Mode::Sine);
        synth.set_gain(1.0);
        let held = synth.sounding(c);
        assert_eq!(
            held,
            Some(Sounding::Generator(GeneratorSettings {
                frequency: 16.35 * 16.0,
                waveform: Waveform::Square,
                gain: 0.5,
            }))
        );

        // Still a square C4 at the old gain.
        let after = device.render(44100);
        assert!((520..=527).contains(&left_sign_changes(&after)));
        assert!(after.iter().all(|s| s.abs() == 0.5));

        synth.stop(c)?;
        synth.play(c)?;
        assert_eq!(
            synth.sounding(c),
            Some(Sounding::Generator(GeneratorSettings {
                frequency: 16.35 * 32.0,
                waveform: Waveform::Sine,
                gain: 1.0,
            }))
        );
        let replayed = device.render(44100);
        assert!((1042..=1051).contains(&left_sign_changes(&replayed)));
        Ok(())
    }

    #[test]
    fn midi_note_off_uses_struck_key() -> Result<(), Box<dyn Error>> {
        let (synth, device) = midi_synth(Mode::Midi);
        let e = Note::from_index(4);
        synth.play(e)?;
        synth.set_octave(6);
        synth.stop(e)?;
        assert_eq!(device.emitted(), vec![vec![0x90, 64, 64], vec![0x80, 64, 0]]);
        Ok(())
    }

    #[test]
    fn mode_switch_while_held_releases_midi_key() -> Result<(), Box<dyn Error>> {
        let midi_device = Arc::new(midi::mock::Device::get("mock-midi"));
        let audio_device = Arc::new(audio::mock::Device::get("mock-audio", 44100));
        let synth = Synthesizer::new(
            settings(Mode::Midi),
            Some(audio_device as Arc<dyn audio::Device>),
            Some(midi_device.clone() as Arc<dyn midi::Device>),
            u4::new(3),
        );
        let g = Note::from_index(7);
        synth.play(g)?;
        synth.set_mode(Mode::Triangle);
        synth.stop(g)?;
        assert_eq!(
            midi_device.emitted(),
            vec![vec![0x93, 67, 64], vec![0x83, 67, 0]]
        );
        Ok(())
    }

    #[test]
    fn failures_leave_note_inactive() {
        let (synth, _) = audio_synth(Mode::Midi);
        let c = Note::from_index(0);
        assert!(matches!(synth.play(c), Err(SynthError::NoMidiDevice)));
        assert!(!synth.is_active(c));

        let (synth, _) = midi_synth(Mode::Sawtooth);
        assert!(matches!(synth.play(c), Err(SynthError::NoAudioDevice)));
        assert!(!synth.is_active(c));

        let (synth, device) = audio_synth(Mode::Sine);
        device.set_online(false);
        assert!(matches!(synth.play(c), Err(SynthError::Audio(_))));
        assert!(!synth.is_active(c));
    }

    #[test]
    fn setters_clamp() {
        let (synth, _) = midi_synth(Mode::Midi);
        synth.set_gain(1.5);
        assert_eq!(synth.settings().gain, 1.0);
        synth.set_gain(-0.5);
        assert_eq!(synth.settings().gain, 0.0);
        synth.set_gain(f32::NAN);
        assert_eq!(synth.settings().gain, 0.0);
        synth.set_octave(12);
        assert_eq!(synth.settings().octave, 8);
    }

    #[test]
    fn velocity_scaling() {
        assert_eq!(velocity(0.0), u7::new(0));
        assert_eq!(velocity(0.5), u7::new(64));
        assert_eq!(velocity(1.0), u7::new(127));
        assert_eq!(velocity(2.0), u7::new(127));
    }

    #[test]
    fn stop_all() -> Result<(), Box<dyn Error>> {
        let (synth, device) = audio_synth(Mode::Triangle);
        for note in Note::all().take(3) {
            synth.play(note)?;
        }
        assert_eq!(device.open_sinks().len(), 3);
        synth.stop_all()?;
        assert!(device.open_sinks().is_empty());
        assert!(Note::all().all(|note| !synth.is_active(note)));
        Ok(())
    }
}
