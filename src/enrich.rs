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

//! Relay path enrichment: resolve each hop's address and country through
//! the control channel.
use async_std::sync::Arc;
use log::warn;

use crate::{
    model::{EnrichedHop, RelayRef},
    rpc::ControlApi,
};

pub struct Enricher {
    rpc: Arc<dyn ControlApi + Send + Sync>,
}

impl Enricher {
    pub fn new(rpc: Arc<dyn ControlApi + Send + Sync>) -> Self {
        Self { rpc }
    }

    /// Enrich a relay path hop by hop, in path order. A failed lookup
    /// spoils only its own hop: the hop is emitted raw and the remaining
    /// hops are still attempted, so one stale relay never blanks out the
    /// whole topology view.
    pub async fn enrich(&self, path: &[RelayRef]) -> Vec<EnrichedHop> {
        let mut enriched = Vec::with_capacity(path.len());

        for relay in path {
            enriched.push(self.enrich_hop(relay).await);
        }

        enriched
    }

    async fn enrich_hop(&self, relay: &RelayRef) -> EnrichedHop {
        let mut hop = EnrichedHop {
            fingerprint: relay.fingerprint.clone(),
            nickname: relay.nickname.clone(),
            address: None,
            country: None,
        };

        let status = match self.rpc.relay_status(&relay.fingerprint).await {
            Ok(v) => v,
            Err(e) => {
                warn!("Relay status lookup failed for {}: {}", relay.fingerprint, e);
                return hop
            }
        };
        hop.address = Some(status.address.clone());

        match self.rpc.ip_to_country(&status.address).await {
            Ok(country) => hop.country = Some(country.to_uppercase()),
            Err(e) => warn!("Country lookup failed for {}: {}", status.address, e),
        }

        hop
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::{
        error::{CircViewError, CircViewResult},
        rpc::{CircuitEvent, RelayStatus, StreamEvent},
    };

    /// Control stub that knows addresses for every relay except the ones
    /// listed as broken.
    struct StubCtl {
        broken: Vec<String>,
    }

    #[async_trait]
    impl ControlApi for StubCtl {
        async fn list_circuits(&self) -> CircViewResult<Vec<CircuitEvent>> {
            Ok(Vec::new())
        }

        async fn list_streams(&self) -> CircViewResult<Vec<StreamEvent>> {
            Ok(Vec::new())
        }

        async fn relay_status(&self, fingerprint: &str) -> CircViewResult<RelayStatus> {
            if self.broken.contains(&fingerprint.to_string()) {
                return Err(CircViewError::RpcError("no such relay".to_string()))
            }
            Ok(RelayStatus { address: format!("10.0.0.{}", fingerprint.len()) })
        }

        async fn ip_to_country(&self, _address: &str) -> CircViewResult<String> {
            Ok("de".to_string())
        }
    }

    fn hop(fp: &str) -> RelayRef {
        RelayRef { fingerprint: fp.to_string(), nickname: Some(format!("nick-{}", fp)) }
    }

    #[test]
    fn all_hops_enriched_in_path_order() {
        smol::block_on(async {
            let rpc = Arc::new(StubCtl { broken: vec![] });
            let enricher = Enricher::new(rpc);

            let path = vec![hop("a"), hop("bb"), hop("ccc")];
            let enriched = enricher.enrich(&path).await;

            assert_eq!(enriched.len(), 3);
            for (raw, rich) in path.iter().zip(enriched.iter()) {
                assert_eq!(rich.fingerprint, raw.fingerprint);
                assert!(rich.address.is_some());
                // Country codes get normalized to upper case.
                assert_eq!(rich.country.as_deref(), Some("DE"));
            }
        });
    }

    #[test]
    fn failed_lookup_spoils_only_its_own_hop() {
        smol::block_on(async {
            let rpc = Arc::new(StubCtl { broken: vec!["bb".to_string()] });
            let enricher = Enricher::new(rpc);

            let path = vec![hop("a"), hop("bb"), hop("ccc")];
            let enriched = enricher.enrich(&path).await;

            assert_eq!(enriched.len(), 3);
            assert!(enriched[0].country.is_some());
            // The broken hop comes back raw, fingerprint intact.
            assert_eq!(enriched[1].fingerprint, "bb");
            assert!(enriched[1].address.is_none());
            assert!(enriched[1].country.is_none());
            // Hops after the failure are still enriched.
            assert!(enriched[2].country.is_some());
        });
    }

    #[test]
    fn empty_path_yields_empty_enrichment() {
        smol::block_on(async {
            let rpc = Arc::new(StubCtl { broken: vec![] });
            let enricher = Enricher::new(rpc);
            assert!(enricher.enrich(&[]).await.is_empty());
        });
    }
}
