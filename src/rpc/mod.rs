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

use std::collections::HashMap;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use crate::{
    error::{CircViewError, CircViewResult},
    model::RelayRef,
};

pub mod client;
pub mod jsonrpc;

use client::RpcClient;
use jsonrpc::{request, JsonNotification};

/// A circuit lifecycle event as delivered by the control channel.
/// Also the shape returned by the initial circuit listing.
#[derive(Clone, Debug, Deserialize)]
pub struct CircuitEvent {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub path: Vec<RelayRef>,
    #[serde(default)]
    pub time_created: Option<String>,
    #[serde(default)]
    pub keyword_args: HashMap<String, String>,
}

/// A stream lifecycle event as delivered by the control channel.
#[derive(Clone, Debug, Deserialize)]
pub struct StreamEvent {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub circuit_id: Option<String>,
    #[serde(default)]
    pub target_address: Option<String>,
    #[serde(default)]
    pub target_port: Option<u16>,
}

/// Tagged union of the two event kinds the subscription yields.
#[derive(Clone, Debug)]
pub enum ControlEvent {
    Circuit(CircuitEvent),
    Stream(StreamEvent),
}

/// Reply shape of a `relay_status` lookup.
#[derive(Clone, Debug, Deserialize)]
pub struct RelayStatus {
    pub address: String,
}

/// The read-only queries the correlator and enricher need from the
/// control channel. Kept behind a trait so state synchronization can be
/// exercised without a live daemon.
#[async_trait]
pub trait ControlApi {
    async fn list_circuits(&self) -> CircViewResult<Vec<CircuitEvent>>;
    async fn list_streams(&self) -> CircViewResult<Vec<StreamEvent>>;
    async fn relay_status(&self, fingerprint: &str) -> CircViewResult<RelayStatus>;
    async fn ip_to_country(&self, address: &str) -> CircViewResult<String>;
}

pub struct ControlRpc {
    rpc_client: RpcClient,
}

impl ControlRpc {
    pub async fn new(url: Url) -> CircViewResult<Self> {
        let rpc_client = RpcClient::new(url).await?;
        Ok(Self { rpc_client })
    }

    /// Try each candidate control port in order and return a client for
    /// the first one that answers a ping.
    pub async fn probe(host: &str, ports: &[u16]) -> CircViewResult<Self> {
        for port in ports {
            let url = Url::parse(&format!("tcp://{}:{}", host, port))?;
            match Self::new(url.clone()).await {
                Ok(client) => match client.ping().await {
                    Ok(_) => {
                        info!("Connected to control port {}", url);
                        return Ok(client)
                    }
                    Err(e) => {
                        debug!("Control port {} did not answer ping: {}", url, e);
                        client.rpc_client.close().await?;
                    }
                },
                Err(e) => debug!("Control port {} unreachable: {}", url, e),
            }
        }
        Err(CircViewError::NoControlPort)
    }

    // --> {"jsonrpc": "2.0", "method": "ping", "params": [], "id": 42}
    // <-- {"jsonrpc": "2.0", "result": "pong", "id": 42}
    pub async fn ping(&self) -> CircViewResult<Value> {
        let req = request(json!("ping"), json!([]));
        self.rpc_client.request(req).await
    }

    /// Ask the peer to start pushing circuit and stream events as
    /// notifications. The ack must be awaited before any other request
    /// goes out: replies are matched to one in-flight request at a
    /// time, so concurrent callers would steal each other's replies.
    pub async fn subscribe_events(&self) -> CircViewResult<()> {
        let req = request(json!("subscribe_events"), json!([]));
        self.rpc_client.request(req).await?;
        Ok(())
    }

    /// Forward every pushed notification into the given queue. Returns
    /// only on connection loss, which is fatal for the caller.
    pub async fn drain_notifications(
        &self,
        queue: async_channel::Sender<ControlEvent>,
    ) -> CircViewResult<()> {
        let notifs = self.rpc_client.notifications();
        loop {
            let Ok(notif) = notifs.recv().await else {
                return Err(CircViewError::ConnectionLost)
            };

            if let Some(event) = decode_notification(notif) {
                queue.send(event).await?;
            }
        }
    }
}

/// Decode a pushed notification into an event. Unknown methods and
/// malformed payloads are reported and skipped; a bad event must never
/// take the subscription down.
fn decode_notification(notif: JsonNotification) -> Option<ControlEvent> {
    // Notification params carry the event record, wrapped in a params
    // array by some peers.
    let params = match notif.params {
        Value::Array(mut a) if !a.is_empty() => a.swap_remove(0),
        other => other,
    };

    match notif.method.as_str() {
        Some("circuit_event") => match serde_json::from_value(params) {
            Ok(event) => Some(ControlEvent::Circuit(event)),
            Err(e) => {
                warn!("Ignoring malformed circuit event: {}", e);
                None
            }
        },
        Some("stream_event") => match serde_json::from_value(params) {
            Ok(event) => Some(ControlEvent::Stream(event)),
            Err(e) => {
                warn!("Ignoring malformed stream event: {}", e);
                None
            }
        },
        _ => {
            warn!("Ignoring unknown notification: {:?}", notif.method);
            None
        }
    }
}

#[async_trait]
impl ControlApi for ControlRpc {
    // --> {"jsonrpc": "2.0", "method": "circuits", "params": [], "id": 42}
    // <-- {"jsonrpc": "2.0", "result": [{"id": "1", ...}], "id": 42}
    async fn list_circuits(&self) -> CircViewResult<Vec<CircuitEvent>> {
        let req = request(json!("circuits"), json!([]));
        let rep = self.rpc_client.request(req).await?;
        Ok(serde_json::from_value(rep)?)
    }

    // --> {"jsonrpc": "2.0", "method": "streams", "params": [], "id": 42}
    // <-- {"jsonrpc": "2.0", "result": [{"id": "5", ...}], "id": 42}
    async fn list_streams(&self) -> CircViewResult<Vec<StreamEvent>> {
        let req = request(json!("streams"), json!([]));
        let rep = self.rpc_client.request(req).await?;
        Ok(serde_json::from_value(rep)?)
    }

    // --> {"jsonrpc": "2.0", "method": "relay_status", "params": ["$FP"], "id": 42}
    // <-- {"jsonrpc": "2.0", "result": {"address": "1.2.3.4"}, "id": 42}
    async fn relay_status(&self, fingerprint: &str) -> CircViewResult<RelayStatus> {
        let req = request(json!("relay_status"), json!([fingerprint]));
        let rep = self.rpc_client.request(req).await?;
        Ok(serde_json::from_value(rep)?)
    }

    // --> {"jsonrpc": "2.0", "method": "ip_to_country", "params": ["1.2.3.4"], "id": 42}
    // <-- {"jsonrpc": "2.0", "result": "de", "id": 42}
    async fn ip_to_country(&self, address: &str) -> CircViewResult<String> {
        let req = request(json!("ip_to_country"), json!([address]));
        let rep = self.rpc_client.request(req).await?;
        match rep.as_str() {
            Some(country) => Ok(country.to_string()),
            None => Err(CircViewError::UnexpectedReply),
        }
    }
}
