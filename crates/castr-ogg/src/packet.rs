use std::collections::HashMap;

use bytes::Bytes;

use crate::error::{OggError, Result};
use crate::page::{Page, PageFlags};

/// A complete packet recovered from one or more pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub serial: u32,
    /// Granule position of the page on which the packet completed.
    pub granule_pos: u64,
    pub data: Bytes,
}

/// Reassembles packets from pages of any number of interleaved streams.
#[derive(Debug, Default)]
pub struct PacketAssembler {
    pending: HashMap<u32, Vec<u8>>,
}

impl PacketAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one page and return every packet it completes.
    pub fn push(&mut self, page: &Page) -> Result<Vec<Packet>> {
        let serial = page.header.serial;
        let mut current = match self.pending.remove(&serial) {
            Some(partial) if page.header.flags.contains(PageFlags::CONTINUED) => partial,
            Some(_) => {
                tracing::debug!(serial, "dropping unfinished packet");
                Vec::new()
            }
            None if page.header.flags.contains(PageFlags::CONTINUED) => {
                return Err(OggError::OrphanContinuation { serial });
            }
            None => Vec::new(),
        };

        let mut packets = Vec::new();
        let mut offset = 0usize;
        for &segment in &page.lacing {
            let len = usize::from(segment);
            current.extend_from_slice(&page.body[offset..offset + len]);
            offset += len;
            if segment < 255 {
                packets.push(Packet {
                    serial,
                    granule_pos: page.header.granule_pos,
                    data: Bytes::from(std::mem::take(&mut current)),
                });
            }
        }

        if !page.ends_packet() && !page.lacing.is_empty() {
            self.pending.insert(serial, current);
        }
        Ok(packets)
    }

    /// Streams with a packet still waiting for continuation pages.
    pub fn unfinished(&self) -> impl Iterator<Item = u32> + '_ {
        self.pending.keys().copied()
    }
}
