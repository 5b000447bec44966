//! Slot ownership map built from `CLUSTER SLOTS`.

use std::collections::{HashMap, HashSet};

use super::slot::SLOT_COUNT;
use crate::core::address::NodeAddress;
use crate::proto::frame::Frame;
use crate::{Error, Result};

/// A contiguous, inclusive range of slots served by one master.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRange {
    /// First slot in the range.
    pub start: u16,
    /// Last slot in the range.
    pub end: u16,
    /// Master serving the range.
    pub master: NodeAddress,
}

impl SlotRange {
    /// True if `slot` is inside the range.
    pub fn contains(&self, slot: u16) -> bool {
        (self.start..=self.end).contains(&slot)
    }
}

/// Which master owns which slot.
///
/// `MOVED` replies patch individual slots on top of the discovered ranges
/// without re-running discovery.
#[derive(Debug, Clone, Default)]
pub struct SlotMap {
    ranges: Vec<SlotRange>,
    moved: HashMap<u16, NodeAddress>,
}

impl SlotMap {
    /// Map for a node with cluster mode disabled: it owns every slot.
    pub fn standalone(node: NodeAddress) -> Self {
        Self {
            ranges: vec![SlotRange {
                start: 0,
                end: SLOT_COUNT - 1,
                master: node,
            }],
            moved: HashMap::new(),
        }
    }

    /// Parses a `CLUSTER SLOTS` reply.
    ///
    /// `queried` is the node that answered; entries with an empty host
    /// refer to it.
    pub fn from_cluster_slots(frame: &Frame, queried: &NodeAddress) -> Result<Self> {
        let Frame::Array(entries) = frame else {
            return Err(malformed("reply is not an array"));
        };

        let mut ranges = Vec::with_capacity(entries.len());
        for entry in entries {
            let Frame::Array(fields) = entry else {
                return Err(malformed("slot entry is not an array"));
            };
            let [start, end, master, ..] = fields.as_slice() else {
                return Err(malformed("slot entry has fewer than 3 fields"));
            };
            let start = slot_number(start)?;
            let end = slot_number(end)?;
            if start > end {
                return Err(malformed("slot range start exceeds end"));
            }
            ranges.push(SlotRange {
                start,
                end,
                master: node_address(master, queried)?,
            });
        }

        ranges.sort_by_key(|r| r.start);
        Ok(Self {
            ranges,
            moved: HashMap::new(),
        })
    }

    /// Current owner of `slot`, if any node serves it.
    pub fn owner(&self, slot: u16) -> Option<&NodeAddress> {
        self.moved.get(&slot).or_else(|| {
            self.ranges
                .iter()
                .find(|r| r.contains(slot))
                .map(|r| &r.master)
        })
    }

    /// Records a `MOVED` redirect for `slot`.
    pub fn reassign(&mut self, slot: u16, owner: NodeAddress) {
        self.moved.insert(slot, owner);
    }

    /// Number of distinct masters in the discovered ranges.
    pub fn master_count(&self) -> usize {
        self.ranges
            .iter()
            .map(|r| &r.master)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Number of slots covered by the discovered ranges.
    pub fn covered_slots(&self) -> usize {
        self.ranges
            .iter()
            .map(|r| usize::from(r.end - r.start) + 1)
            .sum()
    }
}

fn slot_number(frame: &Frame) -> Result<u16> {
    match frame.as_integer() {
        Some(n) if (0..i64::from(SLOT_COUNT)).contains(&n) => Ok(n as u16),
        _ => Err(malformed("slot number out of range")),
    }
}

fn node_address(frame: &Frame, queried: &NodeAddress) -> Result<NodeAddress> {
    let Frame::Array(fields) = frame else {
        return Err(malformed("node entry is not an array"));
    };
    let [host, port, ..] = fields.as_slice() else {
        return Err(malformed("node entry has fewer than 2 fields"));
    };
    let host = host.to_text().ok_or_else(|| malformed("node host is not a string"))?;
    let port = port
        .as_integer()
        .and_then(|p| u16::try_from(p).ok())
        .ok_or_else(|| malformed("node port is not a valid integer"))?;

    let host = match host.as_str() {
        "" | "?" => queried.host().to_string(),
        _ => host,
    };
    Ok(NodeAddress::new(host, port))
}

fn malformed(why: &str) -> Error {
    Error::Protocol {
        message: format!("malformed CLUSTER SLOTS reply: {why}"),
    }
}
