// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Sequential narration playback.
//!
//! A playlist walks the pages in folder order and every page's details in
//! list order. Details without audio, and pages without details, hold a
//! silent gap so the reader still sees every region. Timing follows the
//! recorded clip durations and is driven by [`Playback::tick`] from the UI
//! thread; the clips themselves play through a [`ClipPlayer`].

use crate::config::PlaybackConfig;
use crate::models::detail::DetailId;
use crate::models::project::ProjectData;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("audio file {0} does not exist")]
    Missing(PathBuf),
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Plays one clip at a time.
pub trait ClipPlayer {
    /// Start `path`, stopping whatever plays.
    fn play(&mut self, path: &Path) -> Result<(), PlaybackError>;
    fn stop(&mut self);
}

/// Plays clips with an external program such as `ffplay`.
#[derive(Debug)]
pub struct CommandPlayer {
    program: String,
    args: Vec<String>,
    child: Option<Child>,
}

impl CommandPlayer {
    pub fn from_config(config: &PlaybackConfig) -> Self {
        Self {
            program: config.command.clone(),
            args: config.args.clone(),
            child: None,
        }
    }

    /// Arguments with `{file}` substituted.
    fn expand_args(&self, file: &Path) -> Vec<String> {
        let file = file.to_string_lossy();
        self.args.iter().map(|arg| arg.replace("{file}", &file)).collect()
    }
}

impl ClipPlayer for CommandPlayer {
    fn play(&mut self, path: &Path) -> Result<(), PlaybackError> {
        self.stop();
        if !path.is_file() {
            return Err(PlaybackError::Missing(path.to_path_buf()));
        }
        let child = Command::new(&self.program)
            .args(self.expand_args(path))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| PlaybackError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        self.child = Some(child);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl Drop for CommandPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One step of the playlist.
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    /// Sidecar key of the page.
    pub page: String,
    /// Detail being narrated; `None` for a page without details.
    pub detail: Option<DetailId>,
    pub text: String,
    /// Project-relative clip path.
    pub audio: Option<String>,
    pub duration_seconds: f64,
}

/// Build the playlist for `pages` in the given order.
pub fn build_playlist(data: &ProjectData, pages: &[String], gap_seconds: f64) -> Vec<Cue> {
    let mut cues = Vec::new();
    for page in pages {
        let details = data.details(page);
        if details.is_empty() {
            cues.push(Cue {
                page: page.clone(),
                detail: None,
                text: String::new(),
                audio: None,
                duration_seconds: gap_seconds,
            });
            continue;
        }
        for detail in details {
            let audio = detail.audio_reference.clone();
            let duration_seconds = match (&audio, detail.audio_duration_seconds) {
                (Some(_), Some(d)) if d.is_finite() && d > 0.0 => d,
                _ => gap_seconds,
            };
            cues.push(Cue {
                page: page.clone(),
                detail: Some(detail.id.clone()),
                text: detail.narration_text().to_string(),
                audio,
                duration_seconds,
            });
        }
    }
    cues
}

/// What a tick changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStep {
    /// The cue at this index started.
    Started(usize),
    Finished,
}

/// Playlist cursor and clip timing.
pub struct Playback {
    player: Box<dyn ClipPlayer>,
    project: PathBuf,
    cues: Vec<Cue>,
    index: usize,
    remaining: f64,
    playing: bool,
}

impl Playback {
    pub fn new(player: Box<dyn ClipPlayer>) -> Self {
        Self {
            player,
            project: PathBuf::new(),
            cues: Vec::new(),
            index: 0,
            remaining: 0.0,
            playing: false,
        }
    }

    /// Play `cues` from the start. Clip paths resolve against `project`.
    pub fn start(&mut self, cues: Vec<Cue>, project: &Path) -> Option<PlaybackStep> {
        self.stop();
        if cues.is_empty() {
            return None;
        }
        log::info!("Playing {} cue(s)", cues.len());
        self.cues = cues;
        self.project = project.to_path_buf();
        self.playing = true;
        Some(self.begin(0))
    }

    pub fn stop(&mut self) {
        if self.playing {
            log::debug!("Playback stopped at cue {}", self.index);
        }
        self.player.stop();
        self.playing = false;
        self.cues.clear();
        self.index = 0;
        self.remaining = 0.0;
    }

    /// Jump to the next cue.
    pub fn skip(&mut self) -> Option<PlaybackStep> {
        if !self.playing {
            return None;
        }
        Some(self.advance())
    }

    /// Advance the clock by `dt` seconds.
    pub fn tick(&mut self, dt: f64) -> Option<PlaybackStep> {
        if !self.playing || !dt.is_finite() {
            return None;
        }
        self.remaining -= dt.max(0.0);
        if self.remaining > 0.0 {
            return None;
        }
        Some(self.advance())
    }

    fn advance(&mut self) -> PlaybackStep {
        let next = self.index + 1;
        if next >= self.cues.len() {
            self.stop();
            log::info!("Playback finished");
            return PlaybackStep::Finished;
        }
        self.begin(next)
    }

    fn begin(&mut self, index: usize) -> PlaybackStep {
        self.index = index;
        let cue = &self.cues[index];
        self.remaining = cue.duration_seconds;
        match &cue.audio {
            Some(audio) => {
                if let Err(e) = self.player.play(&self.project.join(audio)) {
                    log::warn!("Playing {} silently: {}", audio, e);
                }
            }
            None => self.player.stop(),
        }
        PlaybackStep::Started(index)
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn current(&self) -> Option<&Cue> {
        self.playing.then(|| self.cues.get(self.index)).flatten()
    }

    /// One-based position and playlist length.
    pub fn position(&self) -> Option<(usize, usize)> {
        self.playing.then(|| (self.index + 1, self.cues.len()))
    }
}
