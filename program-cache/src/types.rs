//! Identifier and handle types shared by the cache, the staging buffer and
//! the backend.

use std::fmt;

/// Opaque native shader-object identifier.
///
/// Shader objects are compiled by an external shader generator; this crate
/// only pairs them into programs. The value `0` is the null shader and is
/// never accepted by the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ShaderId(pub u32);

impl ShaderId {
    /// The null shader id.
    pub const NULL: Self = Self(0);

    /// Create a shader id from its raw native value.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw native value.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Whether this is the null shader id.
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for ShaderId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ShaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a program: the fragment shader and the vertex shader it was
/// linked from.
///
/// The pair is ordered, `(a, b)` and `(b, a)` are different programs. The
/// 64-bit form returned by [`ShaderPairKey::to_bits`] is the key used by the
/// persistent program store; it places the fragment id in the high half and
/// the vertex id in the low half.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShaderPairKey {
    /// Fragment (pixel) shader.
    pub fragment: ShaderId,
    /// Vertex shader.
    pub vertex: ShaderId,
}

impl ShaderPairKey {
    /// Create a key from a fragment and vertex shader pair.
    pub const fn new(fragment: ShaderId, vertex: ShaderId) -> Self {
        Self { fragment, vertex }
    }

    /// Pack into the 64-bit stable identity.
    pub const fn to_bits(self) -> u64 {
        ((self.fragment.0 as u64) << 32) | self.vertex.0 as u64
    }

    /// Unpack a 64-bit stable identity.
    pub const fn from_bits(bits: u64) -> Self {
        Self {
            fragment: ShaderId((bits >> 32) as u32),
            vertex: ShaderId(bits as u32),
        }
    }

    /// Whether either half is the null shader.
    pub const fn has_null(self) -> bool {
        self.fragment.is_null() || self.vertex.is_null()
    }
}

impl fmt::Display for ShaderPairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(fs {}, vs {})", self.fragment, self.vertex)
    }
}

/// Handle to a native program object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u32);

/// Handle to a native buffer object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

/// Location of a resolved uniform inside a linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub i32);

/// Index of a uniform block inside a linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformBlockIndex(pub u32);

/// A retrieved program binary together with its driver format tag.
///
/// Format tags are platform and driver specific. A binary is only loadable
/// by a driver that reports the same tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramBinary {
    /// Driver binary format tag.
    pub format: u32,
    /// Opaque driver binary.
    pub data: Vec<u8>,
}

impl ProgramBinary {
    /// Size of the encoded format tag prefix.
    const HEADER_SIZE: usize = std::mem::size_of::<u32>();

    /// Create a binary from a format tag and its data.
    pub fn new(format: u32, data: Vec<u8>) -> Self {
        Self { format, data }
    }

    /// Encode as the value stored in a program store: the format tag
    /// (little-endian) followed by the binary.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::HEADER_SIZE + self.data.len());
        out.extend_from_slice(&self.format.to_le_bytes());
        out.extend_from_slice(&self.data);
        out
    }

    /// Decode a stored value. Returns `None` if the value is too short to
    /// carry a format tag or carries no binary.
    pub fn decode(value: &[u8]) -> Option<Self> {
        if value.len() <= Self::HEADER_SIZE {
            return None;
        }
        let (tag, data) = value.split_at(Self::HEADER_SIZE);
        let format = u32::from_le_bytes([tag[0], tag[1], tag[2], tag[3]]);
        Some(Self {
            format,
            data: data.to_vec(),
        })
    }

    /// Size of the binary in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the binary is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn test_pair_key_roundtrip(a: u32, b: u32) {
            let key = ShaderPairKey::new(ShaderId(a), ShaderId(b));
            let back = ShaderPairKey::from_bits(key.to_bits());
            prop_assert_eq!(back, key);
            prop_assert_eq!(back.fragment.raw(), a);
            prop_assert_eq!(back.vertex.raw(), b);
        }

        #[test]
        fn test_pair_key_is_order_sensitive(a: u32, b: u32) {
            prop_assume!(a != b);
            let ab = ShaderPairKey::new(ShaderId(a), ShaderId(b));
            let ba = ShaderPairKey::new(ShaderId(b), ShaderId(a));
            prop_assert_ne!(ab, ba);
            prop_assert_ne!(ab.to_bits(), ba.to_bits());
        }
    }

    #[test]
    fn test_pair_key_layout() {
        let key = ShaderPairKey::new(ShaderId(7), ShaderId(3));
        assert_eq!(key.to_bits(), (7u64 << 32) | 3);
    }

    #[test]
    fn test_pair_key_null_detection() {
        assert!(ShaderPairKey::new(ShaderId::NULL, ShaderId(1)).has_null());
        assert!(ShaderPairKey::new(ShaderId(1), ShaderId::NULL).has_null());
        assert!(!ShaderPairKey::new(ShaderId(1), ShaderId(2)).has_null());
    }

    #[test]
    fn test_program_binary_encoding() {
        let binary = ProgramBinary::new(0x8E7D, vec![1, 2, 3, 4, 5]);
        let encoded = binary.encode();
        assert_eq!(&encoded[..4], &0x8E7Du32.to_le_bytes());
        assert_eq!(ProgramBinary::decode(&encoded), Some(binary));
    }

    #[test]
    fn test_program_binary_rejects_short_values() {
        assert_eq!(ProgramBinary::decode(&[]), None);
        assert_eq!(ProgramBinary::decode(&[1, 2, 3, 4]), None);
    }
}
