// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interface server
//!
//! Owns the accepted client channels and pumps them between engine
//! cycles: accept whoever is waiting, answer every readable call, run
//! one cycle, broadcast the outbox. All of it happens on the engine
//! thread; clients that are slow, gone or misbehaving are dropped
//! without disturbing the others.

use crate::binding::{Binding, BoundStream};
use crate::channel::Channel;
use crate::config::InterfaceConfig;
use crate::errors::{ChannelError, InterfaceError, ProtocolError};
use crate::interface::Interface;
use crate::packet::{Packet, PROTOCOL_VERSION};
use std::time::Duration;
use weft_core::Clock;

struct ClientConnection {
    id: u64,
    channel: Channel<BoundStream>,
}

pub struct Server<C: Clock> {
    interface: Interface<C>,
    binding: Box<dyn Binding>,
    config: InterfaceConfig,
    clients: Vec<ClientConnection>,
    next_client: u64,
}

impl<C: Clock> Server<C> {
    pub fn new(binding: Box<dyn Binding>, interface: Interface<C>, config: InterfaceConfig) -> Self {
        tracing::info!(addr = %binding.local_addr(), "interface server up");
        Self {
            interface,
            binding,
            config,
            clients: Vec::new(),
            next_client: 0,
        }
    }

    pub fn interface(&self) -> &Interface<C> {
        &self.interface
    }

    pub fn interface_mut(&mut self) -> &mut Interface<C> {
        &mut self.interface
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Accept waiting connections and answer every readable call.
    /// Transport and protocol failures drop the offending client;
    /// dispatch failures answer the call as a `BadCall` and, with
    /// `abort_on_exception` set, fail the pass once every client has
    /// been served.
    pub async fn process_pending_requests(&mut self) -> Result<(), InterfaceError> {
        self.accept_pending().await;
        let mut first_error = None;
        let mut index = 0;
        while index < self.clients.len() {
            match self.serve_client(index).await {
                Ok(error) => {
                    if first_error.is_none() {
                        first_error = error;
                    }
                    index += 1;
                }
                Err(error) => {
                    let client = self.clients.remove(index);
                    tracing::warn!(client = client.id, %error, "interface client dropped");
                }
            }
        }
        match first_error {
            Some(error) if self.config.abort_on_exception => Err(error),
            Some(error) => {
                tracing::error!(%error, "interface call failed");
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Answer everything one client has queued. `Ok(Some(_))` carries
    /// the first dispatch failure; `Err` means the connection is dead.
    async fn serve_client(
        &mut self,
        index: usize,
    ) -> Result<Option<InterfaceError>, ChannelError> {
        let mut first_error = None;
        loop {
            let packet = match self.clients[index]
                .channel
                .read_packet(Some(Duration::ZERO))
                .await?
            {
                Some(packet) => packet,
                None => break,
            };
            match packet {
                Packet::Call {
                    method,
                    args,
                    kwargs,
                    ..
                } => {
                    let reply = match self.interface.dispatch(&method, &args, &kwargs) {
                        Ok(value) => Packet::Reply { value },
                        Err(error) => {
                            let message = error.to_string();
                            if first_error.is_none() {
                                first_error = Some(error);
                            }
                            Packet::BadCall { message }
                        }
                    };
                    self.clients[index].channel.write_packet(&reply).await?;
                }
                Packet::Hello { version, .. } => {
                    tracing::debug!(client = self.clients[index].id, version, "client hello");
                }
                other => {
                    return Err(ProtocolError::UnexpectedPacket(other.kind()).into());
                }
            }
        }
        Ok(first_error)
    }

    /// Accept every connection already waiting on the binding
    async fn accept_pending(&mut self) {
        loop {
            let accepted =
                match tokio::time::timeout(Duration::ZERO, self.binding.accept()).await {
                    Ok(result) => result,
                    // Nothing waiting
                    Err(_) => break,
                };
            match accepted {
                Ok(stream) => self.welcome(stream).await,
                Err(error) => {
                    tracing::warn!(%error, "accept failed");
                    break;
                }
            }
        }
    }

    /// Install the new client and open with our hello
    async fn welcome(&mut self, stream: BoundStream) {
        let mut channel = Channel::with_limits(
            stream,
            self.config.max_frame_length,
            self.config.max_write_buffer,
        );
        let hello = Packet::Hello {
            version: PROTOCOL_VERSION,
            actions: self.interface.actions().descriptions(),
        };
        let id = self.next_client;
        self.next_client += 1;
        match channel.write_packet(&hello).await {
            Ok(()) => {
                tracing::info!(client = id, "interface client connected");
                self.clients.push(ClientConnection { id, channel });
            }
            Err(error) => {
                tracing::warn!(client = id, %error, "client lost during handshake");
            }
        }
    }

    /// One engine cycle plus fan-out of everything it produced
    pub async fn run_cycle(&mut self) -> Result<(), InterfaceError> {
        self.process_pending_requests().await?;
        self.interface.run_cycle()?;
        self.broadcast().await;
        Ok(())
    }

    /// Send the outbox to every client, dropping the ones that fail
    async fn broadcast(&mut self) {
        let packets = self.interface.drain_outbox();
        let mut index = 0;
        while index < self.clients.len() {
            let mut failed = false;
            for packet in &packets {
                if let Err(error) = self.clients[index].channel.write_packet(packet).await {
                    tracing::warn!(client = self.clients[index].id, %error, "interface client dropped");
                    failed = true;
                    break;
                }
            }
            if failed {
                self.clients.remove(index);
            } else {
                index += 1;
            }
        }
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
