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
use std::{io, time::Duration};

use duration_string::DurationString;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use crate::notes::Note;
use crate::synth::mode::Mode;

/// Keys for C through B, laid out like a piano on a QWERTY keyboard.
pub const NOTE_KEYS: &str = "awsedftgyhuj";

const PLAY: &str = "play";
const STOP: &str = "stop";
const SEEK: &str = "seek";
const SCRUB: &str = "scrub";
const ADD: &str = "add";
const REMOVE: &str = "remove";
const LIST: &str = "list";
const MODE: &str = "mode";
const GAIN: &str = "gain";
const OFF: &str = "off";
const QUIT: &str = "quit";

/// Something typed at the keyboard.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Starts the note if it's silent, otherwise stops it.
    Toggle(Note),
    OctaveUp,
    OctaveDown,
    Mode(Mode),
    Gain(f32),
    /// Silences every note.
    AllOff,

    /// Plays or pauses the transport.
    PlayPause,
    Stop,
    Seek(Duration),
    /// Seeks to a column of the peak display.
    Scrub(u32),
    Add(String),
    /// Removes the track at the given 1-based position in the listing.
    Remove(usize),
    List,

    Quit,
}

/// Parses a line of input. A line made only of note keys toggles each of them in turn.
/// Unrecognized input produces no events.
pub fn parse(input: &str) -> Vec<Event> {
    let input = input.trim();
    let (command, argument) = match input.split_once(char::is_whitespace) {
        Some((command, argument)) => (command, Some(argument.trim())),
        None => (input, None),
    };

    let event = match (command.to_lowercase().as_str(), argument) {
        ("+", None) => Some(Event::OctaveUp),
        ("-", None) => Some(Event::OctaveDown),
        (OFF, None) => Some(Event::AllOff),
        (PLAY, None) => Some(Event::PlayPause),
        (STOP, None) => Some(Event::Stop),
        (LIST, None) => Some(Event::List),
        (QUIT, None) => Some(Event::Quit),
        (MODE, Some(mode)) => mode.parse().ok().map(Event::Mode),
        (GAIN, Some(gain)) => gain.parse().ok().map(Event::Gain),
        (SEEK, Some(position)) => DurationString::from_string(position.to_string())
            .ok()
            .map(|position| Event::Seek(position.into())),
        (SCRUB, Some(offset)) => offset.parse().ok().map(Event::Scrub),
        (ADD, Some(path)) => Some(Event::Add(path.to_string())),
        (REMOVE, Some(position)) => position.parse().ok().map(Event::Remove),
        (keys, None) if !keys.is_empty() => {
            return keys
                .chars()
                .map(|key| NOTE_KEYS.find(key).map(|i| Event::Toggle(Note::from_index(i))))
                .collect::<Option<Vec<Event>>>()
                .unwrap_or_default();
        }
        _ => None,
    };

    event.into_iter().collect()
}

/// Reads commands from stdin and forwards them as events.
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Reads and forwards one line. Returns false once a quit has been sent. The end of
    /// input counts as a quit.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
        prompt: &str,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(writer, "{}: ", prompt)?;
        writer.flush()?;
        let mut input: String = String::default();
        let events = if reader.read_line(&mut input)? == 0 {
            vec![Event::Quit]
        } else {
            parse(&input)
        };
        if events.is_empty() && !input.trim().is_empty() {
            warn!(input = input.trim(), "Unrecognized input");
        }

        let quit = events.contains(&Event::Quit);
        for event in events {
            events_tx
                .blocking_send(event)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        }
        Ok(!quit)
    }

    /// Watches stdin on a blocking thread until a quit is typed or stdin closes.
    pub fn monitor_events(
        &self,
        events_tx: Sender<Event>,
        prompt: &'static str,
    ) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout(), prompt)? {}

            info!("Keyboard driver finished.");
            Ok(())
        })
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, BufReader};
    use std::time::Duration;

    use tokio::sync::mpsc;

    use crate::notes::Note;
    use crate::synth::mode::Mode;

    use super::{parse, Driver, Event};

    fn note(name: &str) -> Note {
        name.parse().expect("valid note name")
    }

    #[test]
    fn note_keys() {
        assert_eq!(parse("a"), vec![Event::Toggle(note("C"))]);
        assert_eq!(parse("j\n"), vec![Event::Toggle(note("B"))]);
        assert_eq!(
            parse("awe"),
            vec![
                Event::Toggle(note("C")),
                Event::Toggle(note("C#")),
                Event::Toggle(note("D#")),
            ]
        );
        // One bad key spoils the line.
        assert!(parse("az").is_empty());
    }

    #[test]
    fn synth_commands() {
        assert_eq!(parse("+"), vec![Event::OctaveUp]);
        assert_eq!(parse("-"), vec![Event::OctaveDown]);
        assert_eq!(parse("mode square"), vec![Event::Mode(Mode::Square)]);
        assert_eq!(parse("MODE midi"), vec![Event::Mode(Mode::Midi)]);
        assert_eq!(parse("gain 0.25"), vec![Event::Gain(0.25)]);
        assert_eq!(parse("off"), vec![Event::AllOff]);
        assert!(parse("mode banjo").is_empty());
        assert!(parse("gain loud").is_empty());
        assert!(parse("mode").is_empty());
    }

    #[test]
    fn transport_commands() {
        assert_eq!(parse("play"), vec![Event::PlayPause]);
        assert_eq!(parse("stop"), vec![Event::Stop]);
        assert_eq!(
            parse("seek 90s"),
            vec![Event::Seek(Duration::from_secs(90))]
        );
        assert_eq!(parse("scrub 25"), vec![Event::Scrub(25)]);
        assert_eq!(
            parse("add /songs/drums.wav"),
            vec![Event::Add("/songs/drums.wav".to_string())]
        );
        assert_eq!(parse("remove 2"), vec![Event::Remove(2)]);
        assert_eq!(parse("list"), vec![Event::List]);
        assert_eq!(parse("quit"), vec![Event::Quit]);
        assert!(parse("seek soon").is_empty());
        assert!(parse("").is_empty());
    }

    fn get_events(input: &str) -> Result<(bool, Vec<Event>), io::Error> {
        let (sender, mut receiver) = mpsc::channel::<Event>(16);
        let reader = BufReader::new(input.as_bytes());
        let more = Driver::monitor_io(&sender, reader, Vec::new(), "Keys")?;

        // Force the sender to close.
        drop(sender);
        let mut events = Vec::new();
        while let Some(event) = receiver.blocking_recv() {
            events.push(event);
        }
        Ok((more, events))
    }

    #[test]
    fn driver_forwards_events() -> Result<(), io::Error> {
        assert_eq!(
            get_events("sd\n")?,
            (
                true,
                vec![Event::Toggle(note("D")), Event::Toggle(note("E"))]
            )
        );
        assert_eq!(get_events("nonsense\n")?, (true, vec![]));
        assert_eq!(get_events("quit\n")?, (false, vec![Event::Quit]));
        assert_eq!(get_events("")?, (false, vec![Event::Quit]));
        Ok(())
    }
}
