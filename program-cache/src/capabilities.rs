//! Platform capability descriptor.
//!
//! Capabilities are read from the backend once when a session starts and
//! stay fixed for the session's lifetime. Every capability-dependent branch
//! in the cache and the staging buffer goes through the predicates here.

use bitflags::bitflags;

bitflags! {
    /// Optional program features reported by the platform.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CapabilityFlags: u32 {
        /// Uniforms can be grouped into blocks backed by buffer ranges.
        const UNIFORM_BLOCKS = 1 << 0;
        /// Fragment outputs can be bound with a blend index.
        const DUAL_SOURCE_BLEND = 1 << 1;
        /// Linked programs can be retrieved as binaries and reloaded.
        const PROGRAM_BINARY = 1 << 2;
    }
}

impl Default for CapabilityFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Capabilities of the platform a session renders on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlatformCapabilities {
    /// Feature flags.
    pub flags: CapabilityFlags,
    /// Minimum offset alignment for uniform buffer range bindings.
    pub uniform_buffer_offset_alignment: u64,
}

impl Default for PlatformCapabilities {
    fn default() -> Self {
        Self {
            flags: CapabilityFlags::all(),
            uniform_buffer_offset_alignment: 256,
        }
    }
}

impl PlatformCapabilities {
    /// Create a descriptor from flags and alignment.
    pub fn new(flags: CapabilityFlags, uniform_buffer_offset_alignment: u64) -> Self {
        Self {
            flags,
            uniform_buffer_offset_alignment,
        }
    }

    /// Set the feature flags.
    pub fn with_flags(mut self, flags: CapabilityFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the uniform buffer offset alignment.
    pub fn with_alignment(mut self, alignment: u64) -> Self {
        self.uniform_buffer_offset_alignment = alignment;
        self
    }

    pub fn supports_uniform_blocks(&self) -> bool {
        self.flags.contains(CapabilityFlags::UNIFORM_BLOCKS)
    }

    pub fn supports_dual_source_blend(&self) -> bool {
        self.flags.contains(CapabilityFlags::DUAL_SOURCE_BLEND)
    }

    pub fn supports_program_binary(&self) -> bool {
        self.flags.contains(CapabilityFlags::PROGRAM_BINARY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capabilities() {
        let caps = PlatformCapabilities::default();
        assert!(caps.supports_uniform_blocks());
        assert!(caps.supports_dual_source_blend());
        assert!(caps.supports_program_binary());
        assert_eq!(caps.uniform_buffer_offset_alignment, 256);
    }

    #[test]
    fn test_capability_predicates() {
        let caps = PlatformCapabilities::default().with_flags(CapabilityFlags::DUAL_SOURCE_BLEND);
        assert!(!caps.supports_uniform_blocks());
        assert!(caps.supports_dual_source_blend());
        assert!(!caps.supports_program_binary());

        let caps = caps.with_flags(CapabilityFlags::empty()).with_alignment(16);
        assert!(!caps.supports_dual_source_blend());
        assert_eq!(caps.uniform_buffer_offset_alignment, 16);
    }
}
