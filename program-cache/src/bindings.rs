//! Fixed binding tables applied to every program.
//!
//! Vertex attribute slots, fragment outputs, uniform names and sampler units
//! are the same for every program the cache builds, so vertex buffer layouts
//! and texture bindings stay program-agnostic.

use static_assertions::const_assert_eq;

/// Uniform block binding point for fragment-stage constants.
pub const FRAGMENT_BLOCK_BINDING: u32 = 1;
/// Uniform block binding point for vertex-stage constants.
pub const VERTEX_BLOCK_BINDING: u32 = 2;

/// Uniform block holding fragment-stage constants.
pub const FRAGMENT_BLOCK_NAME: &str = "PSBlock";
/// Uniform block holding vertex-stage constants.
pub const VERTEX_BLOCK_NAME: &str = "VSBlock";

// ============================================================================
// Vertex attributes
// ============================================================================

pub const POSITION_ATTRIB: u32 = 0;
pub const POSMTX_ATTRIB: u32 = 1;
pub const NORM0_ATTRIB: u32 = 2;
pub const NORM1_ATTRIB: u32 = 3;
pub const NORM2_ATTRIB: u32 = 4;
pub const COLOR0_ATTRIB: u32 = 5;
pub const COLOR1_ATTRIB: u32 = 6;
pub const TEXTURE0_ATTRIB: u32 = 8;

/// Number of texture coordinate channels.
pub const TEXCOORD_CHANNELS: usize = 8;

/// Attribute name to slot bindings, in the order they are applied.
pub const ATTRIBUTE_BINDINGS: [(&str, u32); 15] = [
    ("rawpos", POSITION_ATTRIB),
    ("fposmtx", POSMTX_ATTRIB),
    ("color0", COLOR0_ATTRIB),
    ("color1", COLOR1_ATTRIB),
    ("rawnorm0", NORM0_ATTRIB),
    ("rawnorm1", NORM1_ATTRIB),
    ("rawnorm2", NORM2_ATTRIB),
    ("tex0", TEXTURE0_ATTRIB),
    ("tex1", TEXTURE0_ATTRIB + 1),
    ("tex2", TEXTURE0_ATTRIB + 2),
    ("tex3", TEXTURE0_ATTRIB + 3),
    ("tex4", TEXTURE0_ATTRIB + 4),
    ("tex5", TEXTURE0_ATTRIB + 5),
    ("tex6", TEXTURE0_ATTRIB + 6),
    ("tex7", TEXTURE0_ATTRIB + 7),
];

const_assert_eq!(ATTRIBUTE_BINDINGS.len(), 7 + TEXCOORD_CHANNELS);

// ============================================================================
// Fragment outputs
// ============================================================================

/// A fragment output bound before linking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentOutput {
    pub name: &'static str,
    pub color_number: u32,
    /// Blend source index, only used with dual-source blending.
    pub index: u32,
}

/// Outputs bound when dual-source blending is available.
pub const DUAL_SOURCE_OUTPUTS: [FragmentOutput; 2] = [
    FragmentOutput {
        name: "ocol0",
        color_number: 0,
        index: 0,
    },
    FragmentOutput {
        name: "ocol1",
        color_number: 0,
        index: 1,
    },
];

/// Output bound without dual-source blending.
pub const SINGLE_OUTPUT: FragmentOutput = FragmentOutput {
    name: "ocol0",
    color_number: 0,
    index: 0,
};

// ============================================================================
// Uniforms
// ============================================================================

/// Named uniforms resolved after linking.
///
/// The first ten live in the fragment stage, the rest in the vertex stage.
/// With uniform blocks only [`Uniform::Colors`] is resolved individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Uniform {
    Colors,
    KColors,
    Alpha,
    TexDims,
    ZBias,
    IndTexScale,
    IndTexMtx,
    Fog,
    PixelLights,
    PixelMaterials,
    PosNormalMatrix,
    Projection,
    Materials,
    Lights,
    TexMatrices,
    TransformMatrices,
    NormalMatrices,
    PostTransformMatrices,
    DepthParams,
}

/// Number of entries in [`Uniform`].
pub const NUM_UNIFORMS: usize = 19;

/// Uniform names, indexed by [`Uniform`].
pub const UNIFORM_NAMES: [&str; NUM_UNIFORMS] = [
    "color",
    "k",
    "alphaRef",
    "texdim",
    "czbias",
    "cindscale",
    "cindmtx",
    "cfog",
    "cPLights",
    "cPmtrl",
    "cpnmtx",
    "cproj",
    "cmtrl",
    "clights",
    "ctexmtx",
    "ctrmtx",
    "cnmtx",
    "cpostmtx",
    "cDepth",
];

const_assert_eq!(Uniform::DepthParams as usize + 1, NUM_UNIFORMS);

impl Uniform {
    /// Every uniform, in table order.
    pub const ALL: [Uniform; NUM_UNIFORMS] = [
        Uniform::Colors,
        Uniform::KColors,
        Uniform::Alpha,
        Uniform::TexDims,
        Uniform::ZBias,
        Uniform::IndTexScale,
        Uniform::IndTexMtx,
        Uniform::Fog,
        Uniform::PixelLights,
        Uniform::PixelMaterials,
        Uniform::PosNormalMatrix,
        Uniform::Projection,
        Uniform::Materials,
        Uniform::Lights,
        Uniform::TexMatrices,
        Uniform::TransformMatrices,
        Uniform::NormalMatrices,
        Uniform::PostTransformMatrices,
        Uniform::DepthParams,
    ];

    /// Index into the uniform location table.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Uniform name in generated shaders.
    pub const fn name(self) -> &'static str {
        UNIFORM_NAMES[self as usize]
    }
}

// ============================================================================
// Samplers
// ============================================================================

/// Number of texture sampler uniforms.
pub const NUM_SAMPLERS: usize = 10;

/// Sampler uniform names. Sampler `i` is bound to texture unit `i`.
pub const SAMPLER_UNIFORMS: [&str; NUM_SAMPLERS] = [
    "samp0", "samp1", "samp2", "samp3", "samp4", "samp5", "samp6", "samp7", "samp8", "samp9",
];
