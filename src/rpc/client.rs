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

//! JSON-RPC client-side implementation using asynchronous channels.
//!
//! Requests and replies travel over a single line-delimited JSON stream.
//! Replies are matched to requests by id, while notifications pushed by
//! the peer are routed onto their own channel so a subscription can be
//! drained independently of the request/reply traffic.
use futures::{select, AsyncReadExt, FutureExt};
use log::{debug, error};
use serde_json::{json, Value};
use smol::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use url::Url;

use super::jsonrpc::{JsonNotification, JsonRequest, JsonResult};
use crate::error::{CircViewError, CircViewResult};

pub struct RpcClient {
    send: async_channel::Sender<Value>,
    recv: async_channel::Receiver<JsonResult>,
    notif_recv: async_channel::Receiver<JsonNotification>,
    stop_signal: async_channel::Sender<()>,
    url: Url,
}

impl RpcClient {
    /// Instantiate a new JSON-RPC client that will connect to the given URL.
    pub async fn new(url: Url) -> CircViewResult<Self> {
        let (send, recv, notif_recv, stop_signal) = Self::open_channels(&url).await?;
        Ok(Self { send, recv, notif_recv, stop_signal, url })
    }

    /// Close the channels of an instantiated [`RpcClient`].
    pub async fn close(&self) -> CircViewResult<()> {
        self.stop_signal.send(()).await?;
        Ok(())
    }

    /// Channel carrying notifications pushed by the peer. The channel
    /// closes when the connection is lost.
    pub fn notifications(&self) -> async_channel::Receiver<JsonNotification> {
        self.notif_recv.clone()
    }

    /// Send a given JSON-RPC request over the instantiated client.
    pub async fn request(&self, value: JsonRequest) -> CircViewResult<Value> {
        let req_id = value.id.as_u64();

        debug!(target: "circview::rpc", "--> {}", serde_json::to_string(&value)?);

        // If the connection is closed, the sender will get an error for
        // sending to a closed channel.
        if let Err(e) = self.send.send(json!(value)).await {
            error!("JSON-RPC client unable to send to {} (channels closed): {}", self.url, e);
            return Err(CircViewError::ConnectionLost)
        }

        // Same for the receiving side.
        let Ok(reply) = self.recv.recv().await else {
            error!("JSON-RPC client unable to recv from {} (channels closed)", self.url);
            return Err(CircViewError::ConnectionLost)
        };

        match reply {
            JsonResult::Resp(r) => {
                debug!(target: "circview::rpc", "<-- {}", serde_json::to_string(&r)?);
                if r.id.as_u64() != req_id {
                    return Err(CircViewError::UnexpectedReply)
                }
                Ok(r.result)
            }
            JsonResult::Err(e) => {
                debug!(target: "circview::rpc", "<-- {}", serde_json::to_string(&e)?);
                Err(CircViewError::RpcError(e.error.message.to_string()))
            }
            JsonResult::Notif(n) => {
                debug!(target: "circview::rpc", "<-- {}", serde_json::to_string(&n)?);
                Err(CircViewError::UnexpectedReply)
            }
        }
    }

    /// Instantiate channels for a new [`RpcClient`].
    async fn open_channels(
        url: &Url,
    ) -> CircViewResult<(
        async_channel::Sender<Value>,
        async_channel::Receiver<JsonResult>,
        async_channel::Receiver<JsonNotification>,
        async_channel::Sender<()>,
    )> {
        let (data_send, data_recv) = async_channel::unbounded();
        let (result_send, result_recv) = async_channel::unbounded();
        let (notif_send, notif_recv) = async_channel::unbounded();
        let (stop_send, stop_recv) = async_channel::unbounded();

        let host = url.host_str().ok_or_else(|| CircViewError::UrlParse(url.to_string()))?;
        let port = url.port().ok_or_else(|| CircViewError::UrlParse(url.to_string()))?;

        let stream = match smol::net::TcpStream::connect((host, port)).await {
            Ok(v) => v,
            Err(e) => {
                debug!("JSON-RPC client connection to {} failed: {}", url, e);
                return Err(e.into())
            }
        };

        smol::spawn(Self::reqrep_loop(stream, result_send, notif_send, data_recv, stop_recv))
            .detach();

        Ok((data_send, result_recv, notif_recv, stop_send))
    }

    /// Internal function that loops on a given stream and multiplexes the data.
    async fn reqrep_loop(
        stream: smol::net::TcpStream,
        result_send: async_channel::Sender<JsonResult>,
        notif_send: async_channel::Sender<JsonNotification>,
        data_recv: async_channel::Receiver<Value>,
        stop_recv: async_channel::Receiver<()>,
    ) -> CircViewResult<()> {
        let (reader, mut writer) = stream.split();
        let mut reader = BufReader::new(reader);

        loop {
            let mut line = String::new();

            select! {
                data = data_recv.recv().fuse() => {
                    let mut data_bytes = serde_json::to_vec(&data?)?;
                    data_bytes.push(b'\n');
                    writer.write_all(&data_bytes).await?;
                }

                n = reader.read_line(&mut line).fuse() => {
                    if n? == 0 {
                        // Peer hung up. Closing the channels makes every
                        // pending and future call fail with ConnectionLost.
                        break
                    }
                    match serde_json::from_str(&line)? {
                        JsonResult::Notif(notif) => notif_send.send(notif).await?,
                        reply => result_send.send(reply).await?,
                    }
                }

                _ = stop_recv.recv().fuse() => break
            }
        }

        Ok(())
    }
}
