//! HID framing of APDU exchanges.
//!
//! A command is prefixed with its 16-bit length and cut into fixed-size
//! packets, each carrying `channel (2) || tag (1) || sequence (2)` before its
//! slice of the stream. Responses come back framed the same way.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use common::apdu::{APDUAnswer, APDUCommand};
use common::EncodingError;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::channel::ByteChannel;
use crate::context::CallContext;
use crate::error::{ClientError, FramingError};

pub const FRAME_TAG: u8 = 0x05;
pub const FRAME_HEADER_LENGTH: usize = 5;
const LENGTH_PREFIX: usize = 2;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub channel: u16,
    pub packet_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            channel: 0x0101,
            packet_size: 64,
        }
    }
}

impl TransportConfig {
    /// The first packet must fit the header and the length prefix.
    pub fn validate(&self) -> Result<(), EncodingError> {
        if self.packet_size <= FRAME_HEADER_LENGTH + LENGTH_PREFIX {
            return Err(EncodingError::InvalidLength {
                field: "packet size",
                expected: FRAME_HEADER_LENGTH + LENGTH_PREFIX + 1,
                actual: self.packet_size,
            });
        }
        Ok(())
    }
}

fn header(channel: u16, sequence: u16) -> [u8; FRAME_HEADER_LENGTH] {
    let c = channel.to_be_bytes();
    let s = sequence.to_be_bytes();
    [c[0], c[1], FRAME_TAG, s[0], s[1]]
}

/// Cuts `message` into zero-padded packets of `config.packet_size` bytes.
pub fn segment(config: &TransportConfig, message: &[u8]) -> Result<Vec<Vec<u8>>, FramingError> {
    config
        .validate()
        .map_err(|_| FramingError::InvalidPacketSize(config.packet_size))?;
    let len = u16::try_from(message.len()).map_err(|_| FramingError::CommandTooLong(message.len()))?;
    let mut stream = Vec::with_capacity(LENGTH_PREFIX + message.len());
    stream.extend_from_slice(&len.to_be_bytes());
    stream.extend_from_slice(message);

    stream
        .chunks(config.packet_size - FRAME_HEADER_LENGTH)
        .enumerate()
        .map(|(sequence, chunk)| {
            let sequence = u16::try_from(sequence).map_err(|_| FramingError::CommandTooLong(message.len()))?;
            let mut packet = Vec::with_capacity(config.packet_size);
            packet.extend_from_slice(&header(config.channel, sequence));
            packet.extend_from_slice(chunk);
            packet.resize(config.packet_size, 0);
            Ok(packet)
        })
        .collect()
}

/// Rebuilds a message from its packets, validating each header.
#[derive(Debug)]
pub struct Reassembler {
    config: TransportConfig,
    sequence: u16,
    expected: Option<usize>,
    data: Vec<u8>,
}

impl Reassembler {
    pub fn new(config: TransportConfig) -> Self {
        Reassembler {
            config,
            sequence: 0,
            expected: None,
            data: Vec::new(),
        }
    }

    pub fn push(&mut self, packet: &[u8]) -> Result<(), FramingError> {
        let minimum = if self.sequence == 0 {
            FRAME_HEADER_LENGTH + LENGTH_PREFIX
        } else {
            FRAME_HEADER_LENGTH
        };
        if packet.len() < minimum {
            return Err(FramingError::ShortRead {
                sequence: self.sequence,
                expected: self.config.packet_size,
                actual: packet.len(),
            });
        }

        let channel = u16::from_be_bytes([packet[0], packet[1]]);
        if channel != self.config.channel {
            return Err(FramingError::ChannelMismatch {
                sequence: self.sequence,
                expected: self.config.channel,
                actual: channel,
            });
        }
        if packet[2] != FRAME_TAG {
            return Err(FramingError::TagMismatch {
                sequence: self.sequence,
                expected: FRAME_TAG,
                actual: packet[2],
            });
        }
        let sequence = u16::from_be_bytes([packet[3], packet[4]]);
        if sequence != self.sequence {
            return Err(FramingError::SequenceMismatch {
                expected: self.sequence,
                actual: sequence,
            });
        }

        let payload = if self.sequence == 0 {
            let len = u16::from_be_bytes([packet[5], packet[6]]) as usize;
            self.expected = Some(len);
            self.data.reserve(len);
            &packet[FRAME_HEADER_LENGTH + LENGTH_PREFIX..]
        } else {
            &packet[FRAME_HEADER_LENGTH..]
        };
        self.data.extend_from_slice(payload);
        self.sequence = self.sequence.wrapping_add(1);
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.expected.is_some_and(|len| self.data.len() >= len)
    }

    /// Returns the message with trailing padding removed.
    pub fn finish(mut self) -> Vec<u8> {
        self.data.truncate(self.expected.unwrap_or(0));
        self.data
    }
}

/// Generic trait to abstract the communication layer between the host and a Ledger device.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one raw command and returns the raw response, status word included.
    async fn exchange(&self, ctx: &CallContext, command: &[u8]) -> Result<Vec<u8>, ClientError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn exchange(&self, ctx: &CallContext, command: &[u8]) -> Result<Vec<u8>, ClientError> {
        (**self).exchange(ctx, command).await
    }
}

/// Sends an APDU and splits the answer into data and status word.
///
/// Non-success status words are returned as-is; callers decide how to map them.
pub async fn send<T: Transport + ?Sized>(
    transport: &T,
    ctx: &CallContext,
    command: &APDUCommand,
) -> Result<(Vec<u8>, u16), ClientError> {
    let raw = command.encode()?;
    let response = transport.exchange(ctx, &raw).await?;
    let len = response.len();
    let answer =
        APDUAnswer::from_answer(response).map_err(|_| FramingError::ResponseTooShort(len))?;
    let retcode = answer.retcode();
    Ok((answer.into_data(), retcode))
}

/// Framed transport over a [`ByteChannel`].
///
/// One exchange runs at a time; concurrent callers queue on the session lock.
/// An exchange interrupted by cancellation or a deadline poisons the session
/// until [`FrameTransport::reset`] is called, since the device may still be
/// sending the abandoned response.
pub struct FrameTransport<C> {
    config: TransportConfig,
    channel: Mutex<C>,
    poisoned: AtomicBool,
    total_exchanges: AtomicU64,
    total_sent: AtomicU64,
    total_received: AtomicU64,
}

impl<C: ByteChannel> FrameTransport<C> {
    pub fn new(channel: C) -> Self {
        Self::build(channel, TransportConfig::default())
    }

    pub fn with_config(channel: C, config: TransportConfig) -> Result<Self, EncodingError> {
        config.validate()?;
        Ok(Self::build(channel, config))
    }

    fn build(channel: C, config: TransportConfig) -> Self {
        Self {
            config,
            channel: Mutex::new(channel),
            poisoned: AtomicBool::new(false),
            total_exchanges: AtomicU64::new(0),
            total_sent: AtomicU64::new(0),
            total_received: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Acquire)
    }

    /// Clears the poisoned state. The caller is responsible for bringing the
    /// device back to a known state, e.g. by reopening the channel.
    pub fn reset(&self) {
        self.poisoned.store(false, Ordering::Release);
    }

    // Number of exchanges made with this instance. An exchange includes
    // both sending an APDU and receiving a response.
    pub fn total_exchanges(&self) -> u64 {
        self.total_exchanges.load(Ordering::Relaxed)
    }

    // Total bytes sent, padding included
    pub fn total_sent(&self) -> u64 {
        self.total_sent.load(Ordering::Relaxed)
    }

    // Total bytes received, padding included
    pub fn total_received(&self) -> u64 {
        self.total_received.load(Ordering::Relaxed)
    }

    async fn exchange_locked(
        &self,
        channel: &mut C,
        ctx: &CallContext,
        command: &[u8],
    ) -> Result<Vec<u8>, ClientError> {
        let packets = segment(&self.config, command)?;
        debug!("command framed into {} packets", packets.len());
        for (sequence, packet) in packets.iter().enumerate() {
            let written = ctx.run(channel.write(packet)).await??;
            if written != packet.len() {
                return Err(FramingError::ShortWrite {
                    sequence: sequence as u16,
                    expected: packet.len(),
                    actual: written,
                }
                .into());
            }
            self.total_sent.fetch_add(written as u64, Ordering::Relaxed);
        }

        let mut reassembler = Reassembler::new(self.config);
        let mut buf = vec![0u8; self.config.packet_size];
        let mut sequence: u16 = 0;
        while !reassembler.is_complete() {
            let read = ctx.run(channel.read(&mut buf)).await??;
            if read != self.config.packet_size {
                return Err(FramingError::ShortRead {
                    sequence,
                    expected: self.config.packet_size,
                    actual: read,
                }
                .into());
            }
            self.total_received.fetch_add(read as u64, Ordering::Relaxed);
            reassembler.push(&buf)?;
            sequence = sequence.wrapping_add(1);
        }

        debug!("response reassembled from {sequence} packets");
        let response = reassembler.finish();
        if response.len() < 2 {
            return Err(FramingError::ResponseTooShort(response.len()).into());
        }
        Ok(response)
    }
}

#[async_trait]
impl<C: ByteChannel> Transport for FrameTransport<C> {
    async fn exchange(&self, ctx: &CallContext, command: &[u8]) -> Result<Vec<u8>, ClientError> {
        // Count every call to exchange.
        self.total_exchanges.fetch_add(1, Ordering::Relaxed);

        let mut channel = ctx.run(self.channel.lock()).await?;
        if self.is_poisoned() {
            return Err(FramingError::SessionPoisoned.into());
        }

        debug!("=> {}", hex::encode(command));
        let result = self.exchange_locked(&mut channel, ctx, command).await;
        match &result {
            Ok(response) => debug!("<= {}", hex::encode(response)),
            Err(err) if err.is_cancellation() => {
                warn!("exchange interrupted ({err}); session poisoned until reset");
                self.poisoned.store(true, Ordering::Release);
            }
            Err(err) => debug!("exchange failed: {err}"),
        }
        result
    }
}
