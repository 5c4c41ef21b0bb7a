// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Speech synthesis for text details.
//!
//! Jobs run on worker threads, at most `concurrency` at a time, and report
//! back through a channel drained by [`AudioPipeline::poll`] on the UI
//! thread. Every enqueue takes a fresh generation number and a cancel
//! forgets the detail's number; a result is applied only when its
//! generation is still the detail's current one and the detail still
//! exists. Generation numbers are never reused, so a settled detail can be
//! forgotten without a late result matching a newer request.

use crate::config::AudioConfig;
use crate::models::detail::{DetailId, TextDetail};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use thiserror::Error;

/// Folder inside the project that holds generated clips.
pub const AUDIO_DIR: &str = "audio_files";

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("nothing to synthesize")]
    EmptyText,
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("synthesizer exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("synthesizer produced no audio")]
    NoAudio,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Text-to-speech backend.
pub trait Synthesizer: Send + Sync {
    fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>, SynthesisError>;
}

/// Runs an external program such as `edge-tts`.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    program: String,
    args: Vec<String>,
}

impl CommandSynthesizer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &AudioConfig) -> Self {
        Self::new(config.command.clone(), config.args.clone())
    }

    /// Arguments with `{text}`, `{voice}` and `{output}` substituted.
    fn expand_args(&self, text: &str, voice: &str, output: &Path) -> Vec<String> {
        let output = output.to_string_lossy();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{text}", text)
                    .replace("{voice}", voice)
                    .replace("{output}", &output)
            })
            .collect()
    }
}

impl Synthesizer for CommandSynthesizer {
    fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>, SynthesisError> {
        // Removed when dropped.
        let scratch = tempfile::Builder::new()
            .prefix("mangavox-")
            .suffix(".mp3")
            .tempfile()?;
        let output = scratch.path();

        let out = Command::new(&self.program)
            .args(self.expand_args(text, voice, output))
            .output()
            .map_err(|source| SynthesisError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if !out.status.success() {
            return Err(SynthesisError::Failed {
                status: out.status.to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }
        let bytes = std::fs::read(output)?;
        if bytes.is_empty() {
            return Err(SynthesisError::NoAudio);
        }
        Ok(bytes)
    }
}

/// Estimated clip length from its size at a constant bitrate.
pub fn estimate_duration(bytes: usize, bitrate_kbps: u32) -> f64 {
    if bitrate_kbps == 0 {
        return 0.0;
    }
    (bytes as f64 * 8.0) / (bitrate_kbps as f64 * 1000.0)
}

/// Project-relative path of the clip for `id`.
pub fn audio_reference(id: &DetailId) -> String {
    format!("{}/{}.mp3", AUDIO_DIR, id)
}

/// An applied synthesis result.
#[derive(Debug)]
pub enum AudioOutcome {
    Ready {
        id: DetailId,
        reference: String,
        duration_seconds: f64,
    },
    Failed {
        id: DetailId,
        error: SynthesisError,
    },
}

#[derive(Debug)]
struct Job {
    id: DetailId,
    generation: u64,
    text: String,
    voice: String,
}

struct JobResult {
    id: DetailId,
    generation: u64,
    audio: Result<Vec<u8>, SynthesisError>,
}

/// Queue of synthesis jobs with a concurrency limit.
pub struct AudioPipeline {
    synthesizer: Arc<dyn Synthesizer>,
    default_voice: String,
    concurrency: usize,
    bitrate_kbps: u32,
    /// Current generation of every detail with a queued or running job.
    generations: HashMap<DetailId, u64>,
    next_generation: u64,
    queue: VecDeque<Job>,
    /// Ids whose current generation is queued or running.
    active: HashSet<DetailId>,
    in_flight: usize,
    sender: Sender<JobResult>,
    receiver: Receiver<JobResult>,
}

impl AudioPipeline {
    pub fn new(synthesizer: Arc<dyn Synthesizer>, config: &AudioConfig) -> Self {
        let (sender, receiver) = channel();
        Self {
            synthesizer,
            default_voice: config.default_voice.clone(),
            concurrency: config.concurrency.max(1),
            bitrate_kbps: config.bitrate_kbps,
            generations: HashMap::new(),
            next_generation: 0,
            queue: VecDeque::new(),
            active: HashSet::new(),
            in_flight: 0,
            sender,
            receiver,
        }
    }

    /// Queue synthesis for `detail`, superseding any earlier request for it.
    pub fn enqueue(&mut self, detail: &TextDetail) -> Result<(), SynthesisError> {
        let text = detail.narration_text();
        if text.is_empty() {
            return Err(SynthesisError::EmptyText);
        }
        let voice = detail
            .voice_role
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(self.default_voice.as_str())
            .to_string();

        let generation = self.bump(&detail.id);
        self.queue.push_back(Job {
            id: detail.id.clone(),
            generation,
            text: text.to_string(),
            voice,
        });
        self.active.insert(detail.id.clone());
        self.pump();
        Ok(())
    }

    /// Drop any queued or running request for `id`.
    pub fn cancel(&mut self, id: &DetailId) {
        if self.active.remove(id) {
            log::debug!("Cancelled audio for {}", id);
        }
        self.queue.retain(|job| &job.id != id);
        self.generations.remove(id);
    }

    /// Drop every queued and running request. Running jobs finish on their
    /// threads and their results are discarded.
    pub fn cancel_all(&mut self) {
        if !self.active.is_empty() {
            log::info!("Cancelled audio for {} detail(s)", self.active.len());
        }
        self.queue.clear();
        self.active.clear();
        self.generations.clear();
    }

    fn bump(&mut self, id: &DetailId) -> u64 {
        self.queue.retain(|job| &job.id != id);
        self.next_generation += 1;
        self.generations.insert(id.clone(), self.next_generation);
        self.next_generation
    }

    fn pump(&mut self) {
        while self.in_flight < self.concurrency {
            let Some(job) = self.queue.pop_front() else {
                break;
            };
            self.in_flight += 1;
            let synthesizer = Arc::clone(&self.synthesizer);
            let sender = self.sender.clone();
            std::thread::spawn(move || {
                log::debug!("Synthesizing {} with {}", job.id, job.voice);
                let audio = synthesizer.synthesize(&job.text, &job.voice);
                let _ = sender.send(JobResult {
                    id: job.id,
                    generation: job.generation,
                    audio,
                });
            });
        }
    }

    /// Ids whose audio is being generated.
    pub fn active_ids(&self) -> &HashSet<DetailId> {
        &self.active
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight == 0 && self.queue.is_empty()
    }

    /// Apply finished jobs. Current results for live details are written to
    /// `<project>/audio_files/<id>.mp3`; stale ones are dropped unseen.
    pub fn poll<F>(&mut self, project: &Path, is_live: F) -> Vec<AudioOutcome>
    where
        F: Fn(&DetailId) -> bool,
    {
        let mut outcomes = Vec::new();
        while let Ok(result) = self.receiver.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);

            let current = self.generations.get(&result.id) == Some(&result.generation);
            if !current {
                log::debug!("Dropping superseded audio for {}", result.id);
                continue;
            }
            self.generations.remove(&result.id);
            self.active.remove(&result.id);
            if !is_live(&result.id) {
                log::debug!("Dropping audio for removed detail {}", result.id);
                continue;
            }

            let outcome = match result.audio.and_then(|bytes| self.store(project, &result.id, &bytes)) {
                Ok((reference, duration_seconds)) => AudioOutcome::Ready {
                    id: result.id,
                    reference,
                    duration_seconds,
                },
                Err(error) => AudioOutcome::Failed {
                    id: result.id,
                    error,
                },
            };
            outcomes.push(outcome);
        }
        self.pump();
        outcomes
    }

    fn store(
        &self,
        project: &Path,
        id: &DetailId,
        bytes: &[u8],
    ) -> Result<(String, f64), SynthesisError> {
        let dir: PathBuf = project.join(AUDIO_DIR);
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join(format!("{}.mp3", id)), bytes)?;
        Ok((audio_reference(id), estimate_duration(bytes.len(), self.bitrate_kbps)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::detail::BoundingBox;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    /// Returns the text as audio bytes.
    struct Echo;

    impl Synthesizer for Echo {
        fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>, SynthesisError> {
            Ok(format!("{}|{}", voice, text).into_bytes())
        }
    }

    /// Blocks every job until released.
    struct Gate {
        open: Mutex<bool>,
    }

    impl Synthesizer for Gate {
        fn synthesize(&self, text: &str, _voice: &str) -> Result<Vec<u8>, SynthesisError> {
            while !*self.open.lock().unwrap() {
                std::thread::sleep(Duration::from_millis(2));
            }
            Ok(text.as_bytes().to_vec())
        }
    }

    struct Broken;

    impl Synthesizer for Broken {
        fn synthesize(&self, _text: &str, _voice: &str) -> Result<Vec<u8>, SynthesisError> {
            Err(SynthesisError::NoAudio)
        }
    }

    fn detail(text: &str) -> TextDetail {
        TextDetail::new(
            String::new(),
            text.to_string(),
            BoundingBox::default(),
        )
    }

    fn drain<F: Fn(&DetailId) -> bool>(
        pipeline: &mut AudioPipeline,
        project: &Path,
        is_live: F,
    ) -> Vec<AudioOutcome> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut all = Vec::new();
        while !pipeline.is_idle() && Instant::now() < deadline {
            all.extend(pipeline.poll(project, &is_live));
            std::thread::sleep(Duration::from_millis(2));
        }
        all
    }

    #[test]
    fn test_result_is_written_with_duration() {
        let dir = tempfile::tempdir().unwrap();
        let config = AudioConfig::default();
        let mut pipeline = AudioPipeline::new(Arc::new(Echo), &config);
        let d = detail("你好");

        pipeline.enqueue(&d).unwrap();
        assert!(pipeline.active_ids().contains(&d.id));
        let outcomes = drain(&mut pipeline, dir.path(), |_| true);

        let [AudioOutcome::Ready { id, reference, duration_seconds }] = outcomes.as_slice() else {
            panic!("unexpected {:?}", outcomes);
        };
        assert_eq!(id, &d.id);
        assert_eq!(reference, &audio_reference(&d.id));
        let bytes = std::fs::read(dir.path().join(reference)).unwrap();
        assert_eq!(bytes, format!("{}|你好", config.default_voice).into_bytes());
        assert!((duration_seconds - estimate_duration(bytes.len(), 48)).abs() < 1e-12);
        assert!(pipeline.active_ids().is_empty());
    }

    #[test]
    fn test_retrigger_drops_superseded_result() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = AudioPipeline::new(Arc::new(Echo), &AudioConfig::default());
        let mut d = detail("first");
        d.voice_role = Some("v".to_string());

        pipeline.enqueue(&d).unwrap();
        d.translated_text = "second".to_string();
        pipeline.enqueue(&d).unwrap();
        let outcomes = drain(&mut pipeline, dir.path(), |_| true);

        assert_eq!(outcomes.len(), 1);
        let bytes = std::fs::read(dir.path().join(audio_reference(&d.id))).unwrap();
        assert_eq!(bytes, b"v|second".to_vec());
    }

    #[test]
    fn test_deleted_detail_gets_no_audio() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = AudioPipeline::new(Arc::new(Echo), &AudioConfig::default());
        let d = detail("gone");

        pipeline.enqueue(&d).unwrap();
        let outcomes = drain(&mut pipeline, dir.path(), |_| false);
        assert!(outcomes.is_empty());
        assert!(!dir.path().join(audio_reference(&d.id)).exists());
    }

    #[test]
    fn test_cancel_drops_running_job() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = AudioPipeline::new(Arc::new(Echo), &AudioConfig::default());
        let d = detail("cancel me");

        pipeline.enqueue(&d).unwrap();
        pipeline.cancel(&d.id);
        assert!(pipeline.active_ids().is_empty());
        assert!(drain(&mut pipeline, dir.path(), |_| true).is_empty());
    }

    #[test]
    fn test_settled_details_are_forgotten() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = AudioPipeline::new(Arc::new(Echo), &AudioConfig::default());
        let details: Vec<_> = ["a", "b", "c"].into_iter().map(detail).collect();
        for d in &details {
            pipeline.enqueue(d).unwrap();
        }
        pipeline.cancel(&details[2].id);

        let outcomes = drain(&mut pipeline, dir.path(), |_| true);
        assert_eq!(outcomes.len(), 2);
        assert!(pipeline.generations.is_empty());

        // A later request still resolves normally.
        pipeline.enqueue(&details[0]).unwrap();
        assert_eq!(drain(&mut pipeline, dir.path(), |_| true).len(), 1);
        assert!(pipeline.generations.is_empty());
    }

    #[test]
    fn test_cancel_all_discards_queued_and_running() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(Gate {
            open: Mutex::new(false),
        });
        let config = AudioConfig {
            concurrency: 2,
            ..AudioConfig::default()
        };
        let mut pipeline = AudioPipeline::new(gate.clone(), &config);
        for text in ["a", "b", "c"] {
            pipeline.enqueue(&detail(text)).unwrap();
        }

        pipeline.cancel_all();
        assert_eq!(pipeline.queued(), 0);
        assert!(pipeline.active_ids().is_empty());
        assert!(pipeline.generations.is_empty());

        *gate.open.lock().unwrap() = true;
        assert!(drain(&mut pipeline, dir.path(), |_| true).is_empty());
        assert!(pipeline.is_idle());
    }

    #[test]
    fn test_concurrency_limit_queues_extra_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(Gate {
            open: Mutex::new(false),
        });
        let config = AudioConfig {
            concurrency: 2,
            ..AudioConfig::default()
        };
        let mut pipeline = AudioPipeline::new(gate.clone(), &config);
        for text in ["a", "b", "c"] {
            pipeline.enqueue(&detail(text)).unwrap();
        }
        assert_eq!(pipeline.in_flight(), 2);
        assert_eq!(pipeline.queued(), 1);

        *gate.open.lock().unwrap() = true;
        let outcomes = drain(&mut pipeline, dir.path(), |_| true);
        assert_eq!(outcomes.len(), 3);
    }

    #[test]
    fn test_failures_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = AudioPipeline::new(Arc::new(Broken), &AudioConfig::default());
        pipeline.enqueue(&detail("x")).unwrap();
        let outcomes = drain(&mut pipeline, dir.path(), |_| true);
        assert!(matches!(
            outcomes.as_slice(),
            [AudioOutcome::Failed {
                error: SynthesisError::NoAudio,
                ..
            }]
        ));
    }

    #[test]
    fn test_empty_text_is_rejected() {
        let mut pipeline = AudioPipeline::new(Arc::new(Echo), &AudioConfig::default());
        assert!(matches!(
            pipeline.enqueue(&detail("   ")),
            Err(SynthesisError::EmptyText)
        ));
        assert!(pipeline.is_idle());
    }

    #[test]
    fn test_command_args_are_expanded() {
        let synth = CommandSynthesizer::from_config(&AudioConfig::default());
        let args = synth.expand_args("hi", "zh-CN-YunxiNeural", Path::new("/tmp/o.mp3"));
        assert_eq!(
            args,
            vec![
                "--voice",
                "zh-CN-YunxiNeural",
                "--text",
                "hi",
                "--write-media",
                "/tmp/o.mp3"
            ]
        );
    }

    #[test]
    fn test_duration_estimate() {
        assert!((estimate_duration(6000, 48) - 1.0).abs() < 1e-12);
        assert_eq!(estimate_duration(6000, 0), 0.0);
    }
}
