//! Time ordered 64 bit ids.
//!
//! From the most significant bit down, a snowflake holds 42 bits of
//! milliseconds since [`SCRIBBLER_EPOCH`], a 10 bit node id and a 12 bit
//! sequence number. Ids minted by one [`SnowflakeGenerator`] are strictly
//! increasing, which is what lets listings sort "newest first" by id alone.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;
use time::{OffsetDateTime, macros::datetime};

pub const SCRIBBLER_EPOCH: OffsetDateTime = datetime!(2025-01-01 00:00 UTC);

pub const TIMESTAMP_BITS: u32 = 42;
pub const NODE_ID_BITS: u32 = 10;
pub const SEQUENCE_BITS: u32 = 12;

const NODE_ID_SHIFT: u32 = SEQUENCE_BITS;
const TIMESTAMP_SHIFT: u32 = SEQUENCE_BITS + NODE_ID_BITS;

pub const MAX_TIMESTAMP: u64 = (1 << TIMESTAMP_BITS) - 1;
pub const MAX_NODE_ID: u16 = (1 << NODE_ID_BITS) - 1;
pub const MAX_SEQUENCE: u16 = (1 << SEQUENCE_BITS) - 1;

#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Snowflake(u64);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Deserialize)]
#[serde(try_from = "u16")]
pub struct NodeId(u16);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Node id {0} does not fit in {NODE_ID_BITS} bits")]
pub struct NodeIdOutOfRangeError(u16);

impl NodeId {
    #[must_use]
    pub fn new(id: u16) -> Option<Self> {
        (id <= MAX_NODE_ID).then_some(Self(id))
    }

    #[must_use]
    pub fn get(self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for NodeId {
    type Error = NodeIdOutOfRangeError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(NodeIdOutOfRangeError(value))
    }
}

impl Snowflake {
    #[must_use]
    pub fn new(inner: u64) -> Self {
        Self(inner)
    }

    /// `millis` is truncated to [`TIMESTAMP_BITS`] and `sequence` to [`SEQUENCE_BITS`].
    #[must_use]
    pub fn from_parts(millis: u64, node_id: NodeId, sequence: u16) -> Self {
        Self(
            (millis & MAX_TIMESTAMP) << TIMESTAMP_SHIFT
                | u64::from(node_id.get()) << NODE_ID_SHIFT
                | u64::from(sequence & MAX_SEQUENCE),
        )
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn millis(self) -> u64 {
        self.0 >> TIMESTAMP_SHIFT
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn node_id(self) -> NodeId {
        NodeId((self.0 >> NODE_ID_SHIFT) as u16 & MAX_NODE_ID)
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn sequence(self) -> u16 {
        self.0 as u16 & MAX_SEQUENCE
    }

    #[must_use]
    pub fn created_at(self) -> OffsetDateTime {
        #[allow(clippy::cast_possible_wrap)]
        let millis = self.millis() as i64;
        SCRIBBLER_EPOCH + time::Duration::milliseconds(millis)
    }
}

impl Display for Snowflake {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<u64> for Snowflake {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl From<Snowflake> for u64 {
    fn from(value: Snowflake) -> Self {
        value.get()
    }
}

/// Milliseconds since [`SCRIBBLER_EPOCH`], saturating at both ends of the timestamp range.
fn epoch_millis(time: OffsetDateTime) -> u64 {
    let millis = (time - SCRIBBLER_EPOCH).whole_milliseconds();
    u64::try_from(millis).map_or(0, |millis| millis.min(MAX_TIMESTAMP))
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct SnowflakeGenerator {
    node_id: NodeId,
    last: Option<(u64, u16)>,
}

impl SnowflakeGenerator {
    #[must_use]
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            last: None,
        }
    }

    #[must_use]
    pub fn node_id(self) -> NodeId {
        self.node_id
    }

    /// Never returns an id lower than or equal to a previous one, even if the
    /// clock goes backwards or more than [`MAX_SEQUENCE`] ids are requested
    /// within one millisecond; in both cases the timestamp part runs ahead of
    /// the wall clock until it catches up.
    pub fn generate_at(&mut self, time: OffsetDateTime) -> Snowflake {
        let millis = epoch_millis(time);

        let (millis, sequence) = match self.last {
            Some((last_millis, last_sequence)) if millis <= last_millis => {
                if last_sequence < MAX_SEQUENCE {
                    (last_millis, last_sequence + 1)
                } else {
                    (last_millis + 1, 0)
                }
            }
            _ => (millis, 0),
        };
        self.last = Some((millis, sequence));

        Snowflake::from_parts(millis, self.node_id, sequence)
    }

    pub fn generate(&mut self) -> Snowflake {
        self.generate_at(OffsetDateTime::now_utc())
    }
}
