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

//! Correlation of circuit and stream lifecycle events against the store.
//!
//! All state mutation funnels through one worker draining one ordered
//! queue, so events for the same id always merge in arrival order and
//! neither the store nor the display tree needs further locking.
use std::collections::HashMap;

use async_std::sync::{Arc, Mutex};
use futures::{select_biased, FutureExt};
use log::{debug, error, info};

use crate::{
    enrich::Enricher,
    error::{CircViewError, CircViewResult},
    model::{CircuitPatch, Model, StreamPatch},
    rpc::{CircuitEvent, ControlApi, ControlEvent, StreamEvent},
    util::{now_timestamp, numeric_id},
    view::View,
};

/// Stream statuses that carry the original, human-meaningful target.
/// Later events only report the resolved address, so the target seen
/// here is cached and reattached on every later event for the same id.
const ORIG_TARGET_STATUSES: [&str; 2] = ["NEW", "SENTRESOLVE"];

pub struct DataParser {
    model: Arc<Model>,
    rpc: Arc<dyn ControlApi + Send + Sync>,
    enricher: Enricher,
    view: Mutex<View>,
    orig_targets: Mutex<HashMap<String, String>>,
}

impl DataParser {
    pub fn new(model: Arc<Model>, rpc: Arc<dyn ControlApi + Send + Sync>, view: View) -> Arc<Self> {
        let enricher = Enricher::new(rpc.clone());
        Arc::new(Self {
            model,
            rpc,
            enricher,
            view: Mutex::new(view),
            orig_targets: Mutex::new(HashMap::new()),
        })
    }

    /// Populate the store and the display from the daemon's current
    /// circuit and stream listings, lowest numeric id first, through the
    /// same handlers live events go through.
    pub async fn init_state(&self) -> CircViewResult<()> {
        let mut circuits = self.rpc.list_circuits().await?;
        circuits.sort_by_key(|c| numeric_id(&c.id));
        for event in circuits {
            self.apply(ControlEvent::Circuit(event)).await;
        }

        let mut streams = self.rpc.list_streams().await?;
        streams.sort_by_key(|s| numeric_id(&s.id));
        for event in streams {
            self.apply(ControlEvent::Stream(event)).await;
        }

        Ok(())
    }

    /// Drain the event queue sequentially until the subscription dies or
    /// a stop signal arrives. A stop discards whatever is still queued;
    /// events are never applied partially.
    pub async fn run(
        &self,
        queue: async_channel::Receiver<ControlEvent>,
        stop: async_channel::Receiver<()>,
    ) -> CircViewResult<()> {
        loop {
            // Biased so a pending stop wins over further queued events.
            select_biased! {
                _ = stop.recv().fuse() => {
                    info!("Stopping, {} queued events discarded", queue.len());
                    return Ok(())
                }

                event = queue.recv().fuse() => {
                    let Ok(event) = event else {
                        return Err(CircViewError::ConnectionLost)
                    };
                    self.apply(event).await;
                }
            }
        }
    }

    /// Apply one event. Correlation errors are reported and swallowed so
    /// one bad event never takes the worker down; only connection loss
    /// (handled in [`run`]) is fatal.
    pub async fn apply(&self, event: ControlEvent) {
        let result = match event {
            ControlEvent::Circuit(event) => self.handle_circuit(event).await,
            ControlEvent::Stream(event) => self.handle_stream(event).await,
        };

        if let Err(e) = result {
            error!("Event correlation error: {}", e);
        }
    }

    async fn handle_circuit(&self, event: CircuitEvent) -> CircViewResult<()> {
        debug!(target: "circview::parser", "circuit event {} {}", event.id, event.status);

        let enriched = self.enricher.enrich(&event.path).await;

        let patch = CircuitPatch {
            created_at: Some(event.time_created.unwrap_or_else(now_timestamp)),
            status: Some(event.status),
            path: Some(event.path),
            enriched_path: Some(enriched),
            keyword_args: if event.keyword_args.is_empty() {
                None
            } else {
                Some(event.keyword_args)
            },
        };

        let info = self.model.upsert_circuit(&event.id, patch).await;
        self.view.lock().await.project_circuit(&info)
    }

    async fn handle_stream(&self, event: StreamEvent) -> CircViewResult<()> {
        debug!(target: "circview::parser", "stream event {} {}", event.id, event.status);

        // Save the dns name for later, before anything else happens.
        if ORIG_TARGET_STATUSES.contains(&event.status.as_str()) {
            if let Some(target) = &event.target_address {
                self.orig_targets
                    .lock()
                    .await
                    .entry(event.id.clone())
                    .or_insert_with(|| target.clone());
            }
        }
        let orig_target = self.orig_targets.lock().await.get(&event.id).cloned();

        // Display only events that name a carrying circuit. An event
        // without one (not yet attached, or DETACHED) still updates the
        // store, but never reaches the tree.
        let attached = event.circuit_id.is_some();

        let patch = StreamPatch {
            status: Some(event.status),
            circuit_id: event.circuit_id,
            target_address: event.target_address,
            target_port: event.target_port,
            orig_target,
        };

        let info = self.model.upsert_stream(&event.id, patch).await;

        if !attached {
            return Ok(())
        }

        self.view.lock().await.project_stream(&info)
    }
}
