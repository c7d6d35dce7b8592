// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Act events and the JSON-lines log they are stored in.
//!
//! One line per act:
//! ```text
//! {"actor_id":1,"piece_id":0,"start_time":0.0,"end_time":4.5}
//! {"actor_id":2,"piece_id":0,"start_time":5.0,"end_time":9.0}
//! ```
//! Times are in an arbitrary but common unit (the runtime records
//! microseconds since the actor system started).

use crate::ActGraphError;
use plan_ir::{ActorId, PieceId};
use std::collections::BTreeSet;
use std::io::{BufRead, Write};
use std::path::Path;

/// One execution of one actor for one piece.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ActEvent {
    pub actor_id: ActorId,
    pub piece_id: PieceId,
    pub start_time: f64,
    pub end_time: f64,
}

impl ActEvent {
    pub fn new(actor_id: ActorId, piece_id: PieceId, start_time: f64, end_time: f64) -> Self {
        Self {
            actor_id,
            piece_id,
            start_time,
            end_time,
        }
    }

    /// Wall time of the act.
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    fn check(&self, line: usize) -> Result<(), ActGraphError> {
        if !self.start_time.is_finite() || !self.end_time.is_finite() {
            return Err(ActGraphError::InvalidEvent {
                line,
                detail: "non-finite timestamp".into(),
            });
        }
        if self.end_time < self.start_time {
            return Err(ActGraphError::InvalidEvent {
                line,
                detail: format!(
                    "end_time {} precedes start_time {}",
                    self.end_time, self.start_time,
                ),
            });
        }
        Ok(())
    }
}

/// An ordered collection of act events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActEventLog {
    events: Vec<ActEvent>,
}

impl ActEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a log from events, checking each one.
    pub fn from_events(events: Vec<ActEvent>) -> Result<Self, ActGraphError> {
        for (i, e) in events.iter().enumerate() {
            e.check(i + 1)?;
        }
        Ok(Self { events })
    }

    /// Reads a JSON-lines log from a file.
    pub fn from_file(path: &Path) -> Result<Self, ActGraphError> {
        let io_err = |source| ActGraphError::Io {
            path: path.display().to_string(),
            source,
        };
        let file = std::fs::File::open(path).map_err(io_err)?;
        let log = Self::from_reader(std::io::BufReader::new(file)).map_err(|e| match e {
            ActGraphError::Io { source, .. } => io_err(source),
            other => other,
        })?;
        tracing::info!("read {} act events from {}", log.len(), path.display());
        Ok(log)
    }

    /// Reads a JSON-lines log. Blank lines are skipped.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, ActGraphError> {
        let mut events = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line_no = i + 1;
            let line = line.map_err(|source| ActGraphError::Io {
                path: "<reader>".into(),
                source,
            })?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let event: ActEvent = serde_json::from_str(trimmed).map_err(|source| {
                ActGraphError::Parse {
                    line: line_no,
                    source,
                }
            })?;
            event.check(line_no)?;
            events.push(event);
        }
        Ok(Self { events })
    }

    /// Parses a JSON-lines log held in memory.
    pub fn from_jsonl(s: &str) -> Result<Self, ActGraphError> {
        Self::from_reader(s.as_bytes())
    }

    /// Writes the log as JSON lines.
    pub fn write_to<W: Write>(&self, mut writer: W) -> std::io::Result<()> {
        for e in &self.events {
            serde_json::to_writer(&mut writer, e)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()
    }

    /// Writes the log to a file as JSON lines.
    pub fn write_file(&self, path: &Path) -> Result<(), ActGraphError> {
        let file = std::fs::File::create(path).map_err(|source| ActGraphError::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.write_to(std::io::BufWriter::new(file))
            .map_err(|source| ActGraphError::Io {
                path: path.display().to_string(),
                source,
            })
    }

    /// Appends an event.
    pub fn push(&mut self, event: ActEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActEvent> {
        self.events.iter()
    }

    /// Number of distinct piece ids in the log.
    pub fn num_pieces(&self) -> usize {
        self.events
            .iter()
            .map(|e| e.piece_id)
            .collect::<BTreeSet<_>>()
            .len()
    }
}

impl FromIterator<ActEvent> for ActEventLog {
    fn from_iter<I: IntoIterator<Item = ActEvent>>(iter: I) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}
