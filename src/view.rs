/* This file is part of DarkFi (https://dark.fi)
 *
 * Copyright (C) 2020-2023 Dyne.org foundation
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Projection of entity state into the display tree.
//!
//! [`View`] owns the mapping between entity ids and display node keys;
//! the store never sees display keys and the sink never sees entity
//! records. Projection is idempotent: one node per entity, updated in
//! place, closed marking is a one-way transition.
use std::collections::HashMap;

use crate::{
    error::{CircViewError, CircViewResult},
    model::{CircuitInfo, StreamInfo},
};

/// Status value that flips a display node into its de-emphasized state.
const STATUS_CLOSED: &str = "CLOSED";

/// The operations the display layer accepts. Implemented by the terminal
/// tree in `ui.rs` and by recording sinks in tests.
pub trait DisplaySink {
    /// Insert `key` under `parent` (`None` = root), or update its label
    /// in place if it already exists.
    fn upsert(&mut self, parent: Option<&str>, key: &str, label: &str, expanded: bool);
    /// Flip the node into its closed (grey) state.
    fn mark_closed(&mut self, key: &str);
    /// Ask the display to scroll the node into visibility.
    fn scroll_to_reveal(&mut self, key: &str);
}

struct NodeMeta {
    closed: bool,
}

pub struct View {
    sink: Box<dyn DisplaySink + Send>,
    nodes: HashMap<String, NodeMeta>,
}

impl View {
    pub fn new(sink: Box<dyn DisplaySink + Send>) -> Self {
        Self { sink, nodes: HashMap::new() }
    }

    pub fn circuit_key(id: &str) -> String {
        format!("circuit:{}", id)
    }

    pub fn stream_key(id: &str) -> String {
        format!("stream:{}", id)
    }

    /// Show a circuit in the tree, under the implicit root.
    pub fn project_circuit(&mut self, info: &CircuitInfo) -> CircViewResult<()> {
        let key = Self::circuit_key(&info.id);
        let label = circuit_label(info);
        self.upsert_node(None, key, label, info.status == STATUS_CLOSED);
        Ok(())
    }

    /// Show a stream in the tree, under its carrying circuit. The parent
    /// circuit node must already exist; no placeholder parents are
    /// created, the caller decides what to do with the error.
    pub fn project_stream(&mut self, info: &StreamInfo) -> CircViewResult<()> {
        let Some(circuit_id) = &info.circuit_id else {
            return Err(CircViewError::StreamNotAttached(info.id.clone()))
        };

        let parent = Self::circuit_key(circuit_id);
        let key = Self::stream_key(&info.id);
        if !self.nodes.contains_key(&parent) && !self.nodes.contains_key(&key) {
            return Err(CircViewError::UnknownParentNode(parent))
        }

        let label = stream_label(info);
        self.upsert_node(Some(parent), key, label, info.status == STATUS_CLOSED);
        Ok(())
    }

    fn upsert_node(&mut self, parent: Option<String>, key: String, label: String, closed: bool) {
        match self.nodes.get_mut(&key) {
            Some(meta) => {
                self.sink.upsert(parent.as_deref(), &key, &label, true);
                // One-way transition: a later non-CLOSED status never
                // un-marks a closed node.
                if closed && !meta.closed {
                    meta.closed = true;
                    self.sink.mark_closed(&key);
                }
            }
            None => {
                self.sink.upsert(parent.as_deref(), &key, &label, true);
                if closed {
                    self.sink.mark_closed(&key);
                }
                self.sink.scroll_to_reveal(&key);
                self.nodes.insert(key, NodeMeta { closed });
            }
        }
    }
}

fn circuit_label(info: &CircuitInfo) -> String {
    let mut pathbits = Vec::new();
    for hop in &info.enriched_path {
        let name = hop.nickname.as_deref().unwrap_or(&hop.fingerprint);
        match &hop.country {
            Some(country) => pathbits.push(format!("{} {}", country, name)),
            None => pathbits.push(name.to_string()),
        }
    }

    let mut disp =
        format!("{} {} {}: {}", info.id, info.created_at, info.status, pathbits.join(" > "));

    let kwargs = &info.keyword_args;
    if let (Some(user), Some(pass)) = (kwargs.get("SOCKS_USERNAME"), kwargs.get("SOCKS_PASSWORD")) {
        disp += &format!(" : {}:{}", user, pass);
    }
    if let Some(flags) = kwargs.get("BUILD_FLAGS") {
        disp += &format!(" : {}", flags);
    }

    disp
}

fn stream_label(info: &StreamInfo) -> String {
    let addr = info.target_address.as_deref().unwrap_or("?");
    // A stream whose NEW event was missed has no cached original target;
    // the resolved address is the best name we have.
    let orig = info.orig_target.as_deref().unwrap_or(addr);
    let port = match info.target_port {
        Some(p) => p.to_string(),
        None => "?".to_string(),
    };

    format!("{} {} {}({}):{}", info.id, info.status, orig, addr, port)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::model::EnrichedHop;

    #[derive(Clone, Debug, PartialEq)]
    enum SinkOp {
        Upsert(Option<String>, String, String),
        MarkClosed(String),
        Reveal(String),
    }

    #[derive(Default)]
    struct RecState {
        ops: Vec<SinkOp>,
        labels: HashMap<String, String>,
        closed: Vec<String>,
    }

    /// Sink that records every call for later inspection.
    #[derive(Clone)]
    struct RecSink(Arc<Mutex<RecState>>);

    impl RecSink {
        fn new() -> Self {
            Self(Arc::new(Mutex::new(RecState::default())))
        }
    }

    impl DisplaySink for RecSink {
        fn upsert(&mut self, parent: Option<&str>, key: &str, label: &str, _expanded: bool) {
            let mut state = self.0.lock().unwrap();
            state.ops.push(SinkOp::Upsert(
                parent.map(String::from),
                key.to_string(),
                label.to_string(),
            ));
            state.labels.insert(key.to_string(), label.to_string());
        }

        fn mark_closed(&mut self, key: &str) {
            let mut state = self.0.lock().unwrap();
            state.ops.push(SinkOp::MarkClosed(key.to_string()));
            state.closed.push(key.to_string());
        }

        fn scroll_to_reveal(&mut self, key: &str) {
            self.0.lock().unwrap().ops.push(SinkOp::Reveal(key.to_string()));
        }
    }

    fn circuit(id: &str, status: &str) -> CircuitInfo {
        CircuitInfo {
            id: id.to_string(),
            created_at: "12:00:01".to_string(),
            status: status.to_string(),
            path: Vec::new(),
            enriched_path: vec![
                EnrichedHop {
                    fingerprint: "aa".to_string(),
                    nickname: Some("guard".to_string()),
                    address: Some("1.2.3.4".to_string()),
                    country: Some("DE".to_string()),
                },
                EnrichedHop {
                    fingerprint: "bb".to_string(),
                    nickname: Some("exit".to_string()),
                    address: None,
                    country: None,
                },
            ],
            keyword_args: HashMap::new(),
        }
    }

    fn stream(id: &str, status: &str, circuit_id: Option<&str>) -> StreamInfo {
        StreamInfo {
            id: id.to_string(),
            status: status.to_string(),
            circuit_id: circuit_id.map(String::from),
            target_address: Some("93.184.216.34".to_string()),
            target_port: Some(443),
            orig_target: Some("example.com".to_string()),
        }
    }

    #[test]
    fn circuit_label_format() {
        let mut info = circuit("1", "BUILT");
        assert_eq!(circuit_label(&info), "1 12:00:01 BUILT: DE guard > exit");

        info.keyword_args.insert("SOCKS_USERNAME".to_string(), "alice".to_string());
        info.keyword_args.insert("SOCKS_PASSWORD".to_string(), "hunter2".to_string());
        info.keyword_args.insert("BUILD_FLAGS".to_string(), "IS_INTERNAL".to_string());
        assert_eq!(
            circuit_label(&info),
            "1 12:00:01 BUILT: DE guard > exit : alice:hunter2 : IS_INTERNAL"
        );
    }

    #[test]
    fn stream_label_uses_original_target() {
        let info = stream("5", "SUCCEEDED", Some("1"));
        assert_eq!(stream_label(&info), "5 SUCCEEDED example.com(93.184.216.34):443");
    }

    #[test]
    fn stream_label_falls_back_to_resolved_address() {
        let mut info = stream("5", "SUCCEEDED", Some("1"));
        info.orig_target = None;
        assert_eq!(stream_label(&info), "5 SUCCEEDED 93.184.216.34(93.184.216.34):443");
    }

    #[test]
    fn projection_is_idempotent() {
        let sink = RecSink::new();
        let mut view = View::new(Box::new(sink.clone()));

        let info = circuit("1", "BUILT");
        view.project_circuit(&info).unwrap();
        view.project_circuit(&info).unwrap();

        let state = sink.0.lock().unwrap();
        // One node, revealed once, label settled on the same text.
        let reveals =
            state.ops.iter().filter(|op| matches!(op, SinkOp::Reveal(_))).count();
        assert_eq!(reveals, 1);
        assert_eq!(state.labels.len(), 1);
        assert!(state.closed.is_empty());
    }

    #[test]
    fn closed_marking_is_one_way() {
        let sink = RecSink::new();
        let mut view = View::new(Box::new(sink.clone()));

        view.project_circuit(&circuit("1", "BUILT")).unwrap();
        view.project_circuit(&circuit("1", "CLOSED")).unwrap();
        // Policy: status cannot legitimately revert from CLOSED, so a
        // late non-CLOSED event leaves the closed flag in place.
        view.project_circuit(&circuit("1", "EXTENDED")).unwrap();
        view.project_circuit(&circuit("1", "CLOSED")).unwrap();

        let state = sink.0.lock().unwrap();
        let marks = state
            .ops
            .iter()
            .filter(|op| matches!(op, SinkOp::MarkClosed(_)))
            .count();
        assert_eq!(marks, 1);
        assert_eq!(state.closed, vec!["circuit:1".to_string()]);
    }

    #[test]
    fn stream_parents_to_its_circuit() {
        let sink = RecSink::new();
        let mut view = View::new(Box::new(sink.clone()));

        view.project_circuit(&circuit("2", "BUILT")).unwrap();
        view.project_stream(&stream("5", "SUCCEEDED", Some("2"))).unwrap();

        let state = sink.0.lock().unwrap();
        assert!(state.ops.contains(&SinkOp::Upsert(
            Some("circuit:2".to_string()),
            "stream:5".to_string(),
            "5 SUCCEEDED example.com(93.184.216.34):443".to_string(),
        )));
    }

    #[test]
    fn unknown_parent_is_a_signaled_error() {
        let sink = RecSink::new();
        let mut view = View::new(Box::new(sink.clone()));

        let res = view.project_stream(&stream("5", "SUCCEEDED", Some("99")));
        assert!(matches!(res, Err(CircViewError::UnknownParentNode(_))));
        assert!(sink.0.lock().unwrap().ops.is_empty());
    }

    #[test]
    fn unattached_stream_is_rejected() {
        let sink = RecSink::new();
        let mut view = View::new(Box::new(sink.clone()));

        let res = view.project_stream(&stream("5", "NEW", None));
        assert!(matches!(res, Err(CircViewError::StreamNotAttached(_))));
    }
}
