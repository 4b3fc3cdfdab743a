//! Edge-type packing for adjacency entries.
//!
//! Adjacency pools store one `u32` per edge. The low bits hold the internal
//! index of the node on the other side; the top bits hold a small categorical
//! tag (click, like, share, ...). The split is chosen once per graph.

use crate::error::{GraphError, Result};

/// Largest tag width a [`BitMaskCodec`] supports.
pub const MAX_TYPE_BITS: u8 = 8;

/// Default tag width: sixteen edge types, 2^28 nodes per segment side.
pub const DEFAULT_TYPE_BITS: u8 = 4;

/// Packs an internal index and an edge type into a single adjacency value.
///
/// `encode` validates both fields; `edge_type` and `restore` are infallible
/// because they only ever see values produced by `encode`.
pub trait EdgeTypeMask: Send + Sync {
    /// Packs `index` and `edge_type`, rejecting values that do not fit.
    fn encode(&self, index: u32, edge_type: u8) -> Result<u32>;

    /// Extracts the edge type from a packed value.
    fn edge_type(&self, packed: u32) -> u8;

    /// Extracts the internal index from a packed value.
    fn restore(&self, packed: u32) -> u32;

    /// Largest internal index `encode` accepts.
    fn max_index(&self) -> u32;

    /// Largest edge type `encode` accepts.
    fn max_edge_type(&self) -> u8;
}

/// Stores the edge type in the top `type_bits` bits of the packed value.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BitMaskCodec {
    type_bits: u8,
    index_bits: u8,
}

impl BitMaskCodec {
    /// Creates a codec reserving `type_bits` high bits for the edge type.
    ///
    /// `type_bits` must be in `0..=MAX_TYPE_BITS`; zero yields an untyped
    /// codec that only accepts type `0`.
    pub fn new(type_bits: u8) -> Result<Self> {
        if type_bits > MAX_TYPE_BITS {
            return Err(GraphError::config(format!(
                "edge type width {type_bits} exceeds {MAX_TYPE_BITS} bits"
            )));
        }
        Ok(Self {
            type_bits,
            index_bits: 32 - type_bits,
        })
    }

    /// Codec for graphs without edge types.
    pub fn untyped() -> Self {
        Self {
            type_bits: 0,
            index_bits: 32,
        }
    }

    /// Number of bits reserved for the edge type.
    pub fn type_bits(&self) -> u8 {
        self.type_bits
    }

    #[inline]
    fn index_mask(&self) -> u32 {
        if self.index_bits >= 32 {
            u32::MAX
        } else {
            (1u32 << self.index_bits) - 1
        }
    }
}

impl Default for BitMaskCodec {
    fn default() -> Self {
        Self {
            type_bits: DEFAULT_TYPE_BITS,
            index_bits: 32 - DEFAULT_TYPE_BITS,
        }
    }
}

impl EdgeTypeMask for BitMaskCodec {
    fn encode(&self, index: u32, edge_type: u8) -> Result<u32> {
        if index > self.max_index() {
            return Err(GraphError::EncodingRange {
                field: "node index",
                value: u64::from(index),
                max: u64::from(self.max_index()),
            });
        }
        if edge_type > self.max_edge_type() {
            return Err(GraphError::EncodingRange {
                field: "edge type",
                value: u64::from(edge_type),
                max: u64::from(self.max_edge_type()),
            });
        }
        if self.type_bits == 0 {
            return Ok(index);
        }
        Ok((u32::from(edge_type) << self.index_bits) | index)
    }

    #[inline]
    fn edge_type(&self, packed: u32) -> u8 {
        if self.type_bits == 0 {
            return 0;
        }
        (packed >> self.index_bits) as u8
    }

    #[inline]
    fn restore(&self, packed: u32) -> u32 {
        packed & self.index_mask()
    }

    fn max_index(&self) -> u32 {
        self.index_mask()
    }

    fn max_edge_type(&self) -> u8 {
        if self.type_bits == 0 {
            0
        } else {
            ((1u16 << self.type_bits) - 1) as u8
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_codec_splits_four_type_bits() {
        let codec = BitMaskCodec::default();
        assert_eq!(codec.max_edge_type(), 15);
        assert_eq!(codec.max_index(), (1 << 28) - 1);

        let packed = codec.encode(123_456, 9).unwrap();
        assert_eq!(codec.restore(packed), 123_456);
        assert_eq!(codec.edge_type(packed), 9);
    }

    #[test]
    fn boundary_values_roundtrip() {
        for bits in 0..=MAX_TYPE_BITS {
            let codec = BitMaskCodec::new(bits).unwrap();
            let packed = codec
                .encode(codec.max_index(), codec.max_edge_type())
                .unwrap();
            assert_eq!(codec.restore(packed), codec.max_index());
            assert_eq!(codec.edge_type(packed), codec.max_edge_type());
        }
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let codec = BitMaskCodec::new(2).unwrap();
        let err = codec.encode(0, 4).unwrap_err();
        assert!(matches!(err, GraphError::EncodingRange { field: "edge type", value: 4, max: 3 }));

        let err = codec.encode(1 << 30, 0).unwrap_err();
        assert!(matches!(err, GraphError::EncodingRange { field: "node index", .. }));
    }

    #[test]
    fn untyped_codec_rejects_nonzero_types() {
        let codec = BitMaskCodec::untyped();
        assert_eq!(codec.encode(u32::MAX, 0).unwrap(), u32::MAX);
        assert!(codec.encode(1, 1).is_err());
    }

    #[test]
    fn oversized_type_width_is_configuration_error() {
        assert!(matches!(
            BitMaskCodec::new(9),
            Err(GraphError::Configuration(_))
        ));
    }
}
