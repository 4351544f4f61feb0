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

//! Authoritative in-memory state of known circuits and streams.
//!
//! Records are created on first sight of an id and merged on every later
//! event: patch fields that are set win, unset fields never erase what is
//! already known. Nothing is ever deleted; closed entries stay in the
//! store so the display can keep showing them de-emphasized.
use std::collections::HashMap;

use async_std::sync::{Arc, Mutex};
use serde::Deserialize;

/// A single hop in a circuit path, as reported by the peer.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RelayRef {
    pub fingerprint: String,
    #[serde(default)]
    pub nickname: Option<String>,
}

/// A hop augmented with derived address/geolocation data. Address and
/// country stay unset when the per-hop lookup failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnrichedHop {
    pub fingerprint: String,
    pub nickname: Option<String>,
    pub address: Option<String>,
    pub country: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CircuitInfo {
    pub id: String,
    pub created_at: String,
    pub status: String,
    pub path: Vec<RelayRef>,
    pub enriched_path: Vec<EnrichedHop>,
    pub keyword_args: HashMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamInfo {
    pub id: String,
    pub status: String,
    pub circuit_id: Option<String>,
    pub target_address: Option<String>,
    pub target_port: Option<u16>,
    pub orig_target: Option<String>,
}

/// Partial circuit update. `None` fields leave the record untouched.
#[derive(Clone, Debug, Default)]
pub struct CircuitPatch {
    pub created_at: Option<String>,
    pub status: Option<String>,
    pub path: Option<Vec<RelayRef>>,
    pub enriched_path: Option<Vec<EnrichedHop>>,
    pub keyword_args: Option<HashMap<String, String>>,
}

/// Partial stream update. `None` fields leave the record untouched.
#[derive(Clone, Debug, Default)]
pub struct StreamPatch {
    pub status: Option<String>,
    pub circuit_id: Option<String>,
    pub target_address: Option<String>,
    pub target_port: Option<u16>,
    pub orig_target: Option<String>,
}

pub struct Model {
    pub circuits: Mutex<HashMap<String, CircuitInfo>>,
    pub streams: Mutex<HashMap<String, StreamInfo>>,
}

impl Model {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { circuits: Mutex::new(HashMap::new()), streams: Mutex::new(HashMap::new()) })
    }

    /// Create-or-merge a circuit record. `created_at` is set once, on
    /// first sight, and retained afterwards.
    pub async fn upsert_circuit(&self, id: &str, patch: CircuitPatch) -> CircuitInfo {
        let mut circuits = self.circuits.lock().await;
        let info = circuits.entry(id.to_string()).or_insert_with(|| CircuitInfo {
            id: id.to_string(),
            created_at: String::new(),
            status: String::new(),
            path: Vec::new(),
            enriched_path: Vec::new(),
            keyword_args: HashMap::new(),
        });

        if info.created_at.is_empty() {
            if let Some(created_at) = patch.created_at {
                info.created_at = created_at;
            }
        }
        if let Some(status) = patch.status {
            info.status = status;
        }
        if let Some(path) = patch.path {
            info.path = path;
        }
        if let Some(enriched_path) = patch.enriched_path {
            info.enriched_path = enriched_path;
        }
        if let Some(keyword_args) = patch.keyword_args {
            info.keyword_args = keyword_args;
        }

        info.clone()
    }

    /// Create-or-merge a stream record. `orig_target` is set once and
    /// retained, since later events only carry the resolved form.
    pub async fn upsert_stream(&self, id: &str, patch: StreamPatch) -> StreamInfo {
        let mut streams = self.streams.lock().await;
        let info = streams.entry(id.to_string()).or_insert_with(|| StreamInfo {
            id: id.to_string(),
            status: String::new(),
            circuit_id: None,
            target_address: None,
            target_port: None,
            orig_target: None,
        });

        if let Some(status) = patch.status {
            info.status = status;
        }
        if let Some(circuit_id) = patch.circuit_id {
            info.circuit_id = Some(circuit_id);
        }
        if let Some(target_address) = patch.target_address {
            info.target_address = Some(target_address);
        }
        if let Some(target_port) = patch.target_port {
            info.target_port = Some(target_port);
        }
        if info.orig_target.is_none() {
            if let Some(orig_target) = patch.orig_target {
                info.orig_target = Some(orig_target);
            }
        }

        info.clone()
    }

    pub async fn circuit(&self, id: &str) -> Option<CircuitInfo> {
        self.circuits.lock().await.get(id).cloned()
    }

    pub async fn stream(&self, id: &str) -> Option<StreamInfo> {
        self.streams.lock().await.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hop(fp: &str) -> RelayRef {
        RelayRef { fingerprint: fp.to_string(), nickname: Some(format!("nick-{}", fp)) }
    }

    #[test]
    fn circuit_upsert_merges_instead_of_replacing() {
        smol::block_on(async {
            let model = Model::new();

            model
                .upsert_circuit(
                    "1",
                    CircuitPatch { status: Some("BUILT".to_string()), ..Default::default() },
                )
                .await;

            let enriched = vec![EnrichedHop {
                fingerprint: "aa".to_string(),
                nickname: None,
                address: Some("1.2.3.4".to_string()),
                country: Some("DE".to_string()),
            }];
            let info = model
                .upsert_circuit(
                    "1",
                    CircuitPatch { enriched_path: Some(enriched.clone()), ..Default::default() },
                )
                .await;

            // The second patch must not revert fields the first one set.
            assert_eq!(info.status, "BUILT");
            assert_eq!(info.enriched_path, enriched);
            assert_eq!(model.circuits.lock().await.len(), 1);
        });
    }

    #[test]
    fn circuit_created_at_is_set_once() {
        smol::block_on(async {
            let model = Model::new();

            model
                .upsert_circuit(
                    "7",
                    CircuitPatch { created_at: Some("12:00:01".to_string()), ..Default::default() },
                )
                .await;
            let info = model
                .upsert_circuit(
                    "7",
                    CircuitPatch { created_at: Some("19:30:00".to_string()), ..Default::default() },
                )
                .await;

            assert_eq!(info.created_at, "12:00:01");
        });
    }

    #[test]
    fn circuit_shorter_path_is_applied_in_full() {
        smol::block_on(async {
            let model = Model::new();

            model
                .upsert_circuit(
                    "3",
                    CircuitPatch {
                        path: Some(vec![hop("aa"), hop("bb"), hop("cc")]),
                        ..Default::default()
                    },
                )
                .await;
            let info = model
                .upsert_circuit(
                    "3",
                    CircuitPatch { path: Some(vec![hop("aa")]), ..Default::default() },
                )
                .await;

            // Paths arrive complete each time, so a shorter one wins.
            assert_eq!(info.path.len(), 1);
        });
    }

    #[test]
    fn stream_orig_target_is_retained() {
        smol::block_on(async {
            let model = Model::new();

            model
                .upsert_stream(
                    "5",
                    StreamPatch {
                        status: Some("NEW".to_string()),
                        orig_target: Some("example.com".to_string()),
                        target_address: Some("example.com".to_string()),
                        ..Default::default()
                    },
                )
                .await;
            let info = model
                .upsert_stream(
                    "5",
                    StreamPatch {
                        status: Some("SUCCEEDED".to_string()),
                        orig_target: Some("93.184.216.34".to_string()),
                        target_address: Some("93.184.216.34".to_string()),
                        ..Default::default()
                    },
                )
                .await;

            assert_eq!(info.orig_target.as_deref(), Some("example.com"));
            assert_eq!(info.target_address.as_deref(), Some("93.184.216.34"));
            assert_eq!(info.status, "SUCCEEDED");
        });
    }

    #[test]
    fn stream_unset_fields_never_erase() {
        smol::block_on(async {
            let model = Model::new();

            model
                .upsert_stream(
                    "9",
                    StreamPatch {
                        circuit_id: Some("2".to_string()),
                        target_port: Some(443),
                        ..Default::default()
                    },
                )
                .await;
            let info = model
                .upsert_stream(
                    "9",
                    StreamPatch { status: Some("CLOSED".to_string()), ..Default::default() },
                )
                .await;

            assert_eq!(info.circuit_id.as_deref(), Some("2"));
            assert_eq!(info.target_port, Some(443));
        });
    }
}
