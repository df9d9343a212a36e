//! Debate phase controller.
//!
//! A `DebateSession` walks through the debate phases in a fixed order, passing
//! the floor from speaker to speaker and keeping two countdowns: the overall
//! debate clock and the clock of the current phase (or current speaker).
//! Everything here is synchronous and in-memory; the scheduler that feeds
//! ticks lives in `crate::broadcast`.

pub mod rating;

use crate::types::*;
use serde::{Deserialize, Serialize};

/// What a single controller step changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transition {
    None,
    SpeakerChanged { speaker: ParticipantId },
    PhaseChanged { phase: DebatePhase },
    /// `forced` is set when the debate clock ran out before the last speaker finished
    VotingStarted { forced: bool },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateSession {
    pub topic: String,
    /// Turn order
    pub participants: Vec<Participant>,
    pub phase: DebatePhase,
    /// None means open floor (or nobody, outside the speaking phases)
    pub current_speaker: Option<ParticipantId>,
    pub total_remaining: u32,
    pub phase_remaining: u32,
    pub config: DebateConfig,
    pub feedback: Option<String>,
    #[serde(default)]
    pub results: Vec<RankedResult>,
}

impl DebateSession {
    pub fn new(topic: String, participants: Vec<Participant>, config: DebateConfig) -> Self {
        Self {
            topic,
            participants,
            phase: DebatePhase::Waiting,
            current_speaker: None,
            total_remaining: config.total_secs,
            phase_remaining: config.phase_duration(DebatePhase::Waiting),
            config,
            feedback: None,
            results: Vec::new(),
        }
    }

    /// Open the debate with the first participant introducing themselves.
    /// Returns false (and changes nothing) unless the session is waiting and has participants.
    pub fn start(&mut self) -> bool {
        if self.phase != DebatePhase::Waiting || self.participants.is_empty() {
            tracing::warn!(
                "Ignoring start: phase={:?}, participants={}",
                self.phase,
                self.participants.len()
            );
            return false;
        }

        self.phase = DebatePhase::Introduction;
        self.give_floor(0);
        self.phase_remaining = self.config.phase_duration(DebatePhase::Introduction);
        true
    }

    /// One elapsed second
    pub fn tick(&mut self) -> Transition {
        if !self.phase.is_running() || self.total_remaining == 0 {
            return Transition::None;
        }

        self.total_remaining -= 1;
        if self.total_remaining == 0 {
            tracing::info!("Debate clock ran out during {:?}", self.phase);
            self.enter_voting();
            return Transition::VotingStarted { forced: true };
        }

        if self.phase_remaining <= 1 {
            self.advance()
        } else {
            self.phase_remaining -= 1;
            Transition::None
        }
    }

    /// Pass the floor to the next speaker, or move on to the next phase once
    /// the last speaker of the phase is done.
    pub fn advance(&mut self) -> Transition {
        if self.phase.rotates_speakers() {
            let next = self.speaker_index().map_or(0, |i| i + 1);
            if next < self.participants.len() {
                self.give_floor(next);
                self.phase_remaining = self.config.phase_duration(self.phase);
                return Transition::SpeakerChanged {
                    speaker: self.participants[next].id.clone(),
                };
            }
            return self.next_phase();
        }

        if self.phase == DebatePhase::CounterQuestions {
            return self.next_phase();
        }

        Transition::None
    }

    /// Close voting with the computed ranking
    pub fn finish_voting(&mut self, results: Vec<RankedResult>) -> bool {
        if self.phase != DebatePhase::Voting {
            return false;
        }
        self.phase = DebatePhase::Results;
        self.results = results;
        true
    }

    pub fn speaker_index(&self) -> Option<usize> {
        let speaker = self.current_speaker.as_ref()?;
        self.participants.iter().position(|p| &p.id == speaker)
    }

    pub fn participant(&self, id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    fn next_phase(&mut self) -> Transition {
        let phase = match self.phase {
            DebatePhase::Introduction => {
                self.give_floor(0);
                DebatePhase::MainArguments
            }
            DebatePhase::MainArguments => {
                self.open_floor();
                DebatePhase::CounterQuestions
            }
            DebatePhase::CounterQuestions => {
                self.give_floor(0);
                DebatePhase::Conclusion
            }
            DebatePhase::Conclusion => {
                self.enter_voting();
                return Transition::VotingStarted { forced: false };
            }
            _ => return Transition::None,
        };

        tracing::debug!("Debate phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
        self.phase_remaining = self.config.phase_duration(phase);
        Transition::PhaseChanged { phase }
    }

    fn enter_voting(&mut self) {
        self.phase = DebatePhase::Voting;
        self.current_speaker = None;
        self.phase_remaining = 0;
        for p in self.participants.iter_mut() {
            p.is_speaking = false;
        }
    }

    fn give_floor(&mut self, index: usize) {
        self.current_speaker = self.participants.get(index).map(|p| p.id.clone());
        for (i, p) in self.participants.iter_mut().enumerate() {
            p.is_speaking = i == index;
        }
    }

    fn open_floor(&mut self) {
        self.current_speaker = None;
        for p in self.participants.iter_mut() {
            p.is_speaking = true;
        }
    }
}

/// Feed `elapsed_secs` ticks into a session, returning it together with every
/// transition that happened on the way.
pub fn elapse(mut session: DebateSession, elapsed_secs: u32) -> (DebateSession, Vec<Transition>) {
    let mut transitions = Vec::new();
    for _ in 0..elapsed_secs {
        match session.tick() {
            Transition::None => {}
            t => transitions.push(t),
        }
    }
    (session, transitions)
}
