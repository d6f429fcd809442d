//! Reliable frame and ACK encoding
//!
//! Frame format: [payload: 1..=247][network_id: u16 LE][payload_crc: u16 LE]
//! ACK format:   [network_id: u16 LE][payload_crc: u16 LE]

use super::NetworkId;
use crate::config::protocol::{MAX_RELIABLE_FRAME, MAX_RELIABLE_PAYLOAD, RELIABLE_TRAILER_LEN};
use crc::{Crc, CRC_16_IBM_3740};
use heapless::Vec;

/// CRC-16/CCITT-FALSE (poly 0x1021, init 0xFFFF)
const CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Length of an ACK frame
pub const ACK_LEN: usize = 4;

/// Errors building or splitting a reliable frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Nothing to send
    EmptyPayload,
    /// Payload does not fit next to the trailer
    PayloadTooLong,
    /// Received frame has no room for a payload and trailer
    TooShort,
}

/// Calculate the payload CRC carried in the trailer
pub fn payload_crc(payload: &[u8]) -> u16 {
    CRC.checksum(payload)
}

/// Build a reliable frame around `payload`
pub fn encode(payload: &[u8], network_id: NetworkId) -> Result<Vec<u8, MAX_RELIABLE_FRAME>, FrameError> {
    if payload.is_empty() {
        return Err(FrameError::EmptyPayload);
    }
    if payload.len() > MAX_RELIABLE_PAYLOAD {
        return Err(FrameError::PayloadTooLong);
    }

    let crc = payload_crc(payload);
    let mut frame = Vec::new();
    frame
        .extend_from_slice(payload)
        .map_err(|_| FrameError::PayloadTooLong)?;
    frame
        .extend_from_slice(&network_id.0.to_le_bytes())
        .map_err(|_| FrameError::PayloadTooLong)?;
    frame
        .extend_from_slice(&crc.to_le_bytes())
        .map_err(|_| FrameError::PayloadTooLong)?;

    Ok(frame)
}

/// Build the ACK for a frame with the given id and CRC
pub fn encode_ack(network_id: NetworkId, crc: u16) -> [u8; ACK_LEN] {
    let id = network_id.0.to_le_bytes();
    let crc = crc.to_le_bytes();
    [id[0], id[1], crc[0], crc[1]]
}

/// Split an ACK into id and CRC; anything but exactly four bytes is not an ACK
pub fn decode_ack(data: &[u8]) -> Option<(NetworkId, u16)> {
    if data.len() != ACK_LEN {
        return None;
    }
    let network_id = NetworkId(u16::from_le_bytes([data[0], data[1]]));
    let crc = u16::from_le_bytes([data[2], data[3]]);
    Some((network_id, crc))
}

/// A received frame split into payload and trailer, not yet validated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReliableFrame<'a> {
    pub payload: &'a [u8],
    pub network_id: NetworkId,
    /// CRC as carried in the trailer
    pub crc: u16,
}

impl<'a> ReliableFrame<'a> {
    /// Split raw radio bytes into payload and trailer
    pub fn split(data: &'a [u8]) -> Result<Self, FrameError> {
        if data.len() <= RELIABLE_TRAILER_LEN {
            return Err(FrameError::TooShort);
        }

        let payload_len = data.len() - RELIABLE_TRAILER_LEN;
        let trailer = &data[payload_len..];

        Ok(Self {
            payload: &data[..payload_len],
            network_id: NetworkId(u16::from_le_bytes([trailer[0], trailer[1]])),
            crc: u16::from_le_bytes([trailer[2], trailer[3]]),
        })
    }

    /// CRC recomputed over the received payload
    pub fn local_crc(&self) -> u16 {
        payload_crc(self.payload)
    }
}
