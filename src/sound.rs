//! Fire-and-forget sound cues.
//!
//! Audio is best effort: a sink may fail, and the controller logs and drops
//! the error without touching gameplay.

use std::io::{self, Write};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum SoundCue {
    Start,
    Click,
    Correct,
    Incorrect,
    GameOver,
    PauseIn,
    PauseOut,
}

pub trait SoundSink {
    fn play(&mut self, cue: SoundCue, volume: f32) -> io::Result<()>;
}

impl<S: SoundSink + ?Sized> SoundSink for Box<S> {
    fn play(&mut self, cue: SoundCue, volume: f32) -> io::Result<()> {
        (**self).play(cue, volume)
    }
}

/// Sink that plays nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct Silent;

impl SoundSink for Silent {
    fn play(&mut self, _cue: SoundCue, _volume: f32) -> io::Result<()> {
        Ok(())
    }
}

/// Rings the terminal bell for the cues worth hearing in a terminal.
#[derive(Debug)]
pub struct TerminalBell<W: Write> {
    out: W,
}

impl TerminalBell<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> TerminalBell<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> SoundSink for TerminalBell<W> {
    fn play(&mut self, cue: SoundCue, volume: f32) -> io::Result<()> {
        if clamp_volume(volume) == 0.0 {
            return Ok(());
        }
        match cue {
            SoundCue::Incorrect | SoundCue::GameOver => {
                self.out.write_all(b"\x07")?;
                self.out.flush()
            }
            _ => Ok(()),
        }
    }
}

/// Volume in `[0, 1]`; anything non-finite plays at full volume.
pub fn clamp_volume(volume: f32) -> f32 {
    if !volume.is_finite() {
        return 1.0;
    }
    volume.clamp(0.0, 1.0)
}
