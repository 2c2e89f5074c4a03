//! Scripted in-memory device for exercising the client without hardware.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::apdu::{APDUAnswer, APDUCommand, StatusWord};

use crate::channel::ByteChannel;
use crate::transport::{segment, Reassembler, TransportConfig};

type Responder = Box<dyn FnMut(&APDUCommand) -> Vec<u8> + Send>;

/// Commands received by a [`MockDevice`], shared with the test.
#[derive(Clone, Default)]
pub struct CommandLog(Arc<Mutex<Vec<APDUCommand>>>);

impl CommandLog {
    pub fn commands(&self) -> Vec<APDUCommand> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, command: APDUCommand) {
        self.0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(command);
    }
}

/// A device answering framed commands through a responder closure.
///
/// The responder returns the raw response, status word included, or an empty
/// vector to stay silent. A read with nothing queued never completes,
/// like a device waiting for the user.
pub struct MockDevice {
    config: TransportConfig,
    inbound: Reassembler,
    outbound: VecDeque<Vec<u8>>,
    responder: Responder,
    log: CommandLog,
}

impl MockDevice {
    pub fn new<F>(responder: F) -> Self
    where
        F: FnMut(&APDUCommand) -> Vec<u8> + Send + 'static,
    {
        Self::with_config(TransportConfig::default(), responder)
    }

    pub fn with_config<F>(config: TransportConfig, responder: F) -> Self
    where
        F: FnMut(&APDUCommand) -> Vec<u8> + Send + 'static,
    {
        MockDevice {
            config,
            inbound: Reassembler::new(config),
            outbound: VecDeque::new(),
            responder: Box::new(responder),
            log: CommandLog::default(),
        }
    }

    /// Answers every command with `data` followed by `9000`.
    pub fn always_ok(data: Vec<u8>) -> Self {
        Self::new(move |_| ok(&data))
    }

    /// Replays `responses` in order, then stays silent.
    pub fn scripted(responses: Vec<Vec<u8>>) -> Self {
        let mut responses = VecDeque::from(responses);
        Self::new(move |_| responses.pop_front().unwrap_or_default())
    }

    pub fn log(&self) -> CommandLog {
        self.log.clone()
    }

    /// Queues a raw packet for the host, bypassing the responder.
    pub fn inject_packet(&mut self, packet: Vec<u8>) {
        self.outbound.push_back(packet);
    }

    fn handle_command(&mut self, raw: Vec<u8>) -> io::Result<()> {
        let command = APDUCommand::decode(&raw)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        let response = (self.responder)(&command);
        self.log.push(command);
        if response.is_empty() {
            return Ok(());
        }
        let packets = segment(&self.config, &response)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        self.outbound.extend(packets);
        Ok(())
    }
}

#[async_trait]
impl ByteChannel for MockDevice {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.outbound.pop_front() {
            Some(packet) => {
                let n = packet.len().min(buf.len());
                buf[..n].copy_from_slice(&packet[..n]);
                Ok(n)
            }
            None => std::future::pending().await,
        }
    }

    async fn write(&mut self, packet: &[u8]) -> io::Result<usize> {
        self.inbound
            .push(packet)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        if self.inbound.is_complete() {
            let done = std::mem::replace(&mut self.inbound, Reassembler::new(self.config));
            self.handle_command(done.finish())?;
        }
        Ok(packet.len())
    }
}

/// `data || 9000`.
pub fn ok(data: &[u8]) -> Vec<u8> {
    APDUAnswer::encode(data, StatusWord::OK as u16)
}

/// An empty response carrying only `code`.
pub fn status(code: u16) -> Vec<u8> {
    APDUAnswer::encode(&[], code)
}

/// A 65-byte `v || r || s` signature response.
pub fn signature_response(v: u8) -> Vec<u8> {
    let mut data = vec![v];
    data.extend_from_slice(&[0x11; 32]);
    data.extend_from_slice(&[0x22; 32]);
    ok(&data)
}
