//! File kinds identified by their leading 32-bit magic.
//!
//! Used only to name extracted files; nothing here parses the formats.

const fn le(tag: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*tag)
}

const fn be(tag: &[u8; 4]) -> u32 {
    u32::from_be_bytes(*tag)
}

macro_rules! data_kinds {
    ($($(#[$meta:meta])* $variant:ident = $code:expr => $ext:expr,)*) => {
        /// Known file kinds.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum DataKind {
            $($(#[$meta])* $variant,)*
        }

        impl DataKind {
            /// Every known kind.
            pub const ALL: &'static [DataKind] = &[$(DataKind::$variant,)*];

            /// Magic value identifying this kind.
            pub const fn code(self) -> u32 {
                match self {
                    $(DataKind::$variant => $code,)*
                }
            }

            /// Preferred file extension, if the kind is a standalone file.
            pub const fn extension(self) -> Option<&'static str> {
                match self {
                    $(DataKind::$variant => $ext,)*
                }
            }
        }
    };
}

data_kinds! {
    /// Zeroed header.
    Raw = 0 => Some("bin"),
    StructTable = 0x1612_1900 => Some("struct"),
    Sarc = le(b"SARC") => Some("sarc"),
    ElixirArchive = le(b"EARC") => Some("elixir"),
    Spkg = le(b"SPKG") => Some("spkg"),
    /// Sound bank (stream).
    Ktsr = le(b"KTSR") => Some("ktsl2stbin"),
    /// Sound bank (assets).
    Ktsc = le(b"KTSC") => Some("ktsl2asbin"),
    Ktss = le(b"KTSS") => Some("ktss"),
    Kovs = le(b"KOVS") => Some("kvs"),
    Scene = le(b"SCEN") => Some("scene"),
    ShaderPack = le(b"3SPK") => Some("shaderpack"),
    Swgq = le(b"SWGQ") => Some("swgq"),
    River = le(b"RIVE") => Some("river"),
    Rig = be(b"RIGB") => Some("rig"),
    Datd = le(b"DATD") => Some("datd"),
    Lcd0 = be(b"0LCD") => Some("lcd0"),
    Webm = 0xA3DF_451A => Some("webm"),
    ModelGroup = le(b"MDLK") => Some("g1mg"),
    ScreenLayout = be(b"KSCL") => Some("kscl"),
    ScreenLayoutTexture = be(b"KSLT") => Some("kslt"),
    VideoSource = le(b"G1VS") => Some("g1vs"),
    Font = le(b"G1N_") => Some("g1n"),
    TextLocalization19 = le(&[b'X', b'L', 0x13, 0]) => Some("text"),
    TextureGroup = be(b"G1TG") => Some("g1t"),
    Model = be(b"G1M_") => Some("g1m"),
    AnimationV2 = be(b"G2A_") => Some("g2a"),
    Animation = be(b"G1A_") => Some("g1a"),
    EffectManager = be(b"G1EM") => Some("g1em"),
    Effect = be(b"G1FX") => Some("g1fx"),
    SeBin = be(b"SLO_") => Some("sebin"),
    PostFx = be(b"KPS_") => Some("postfx"),
    ModelSkeleton = be(b"G1MS") => None,
    ModelFormat = be(b"G1MF") => None,
    ModelGeometry = be(b"G1MG") => None,
    ModelMatrix = be(b"G1MM") => None,
    ModelExtra = be(b"EXTR") => None,
    ModelCollision = be(b"COLL") => None,
    ModelClothDriver = be(b"NUNO") => None,
    ModelCloth = be(b"NUNV") => None,
    ModelClothSurface = be(b"NUNS") => None,
    ModelSoftbody = be(b"SOFT") => None,
    ModelHair = be(b"HAIR") => None,
    Gmpk = le(b"GMPK") => Some("gmpk"),
    Gapk = le(b"GAPK") => Some("gapk"),
    Gepk = le(b"GEPK") => Some("gepk"),
    /// Chunked container with 64 KiB chunks.
    Compressed = 0x0001_0000 => Some("gz"),
    /// Chunked container with 128 KiB chunks.
    CompressedChonky = 0x0002_0000 => Some("gz"),
}

impl DataKind {
    /// Look up a kind by its magic value.
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.code() == code)
    }

    /// Identify a buffer by its first four bytes.
    ///
    /// Buffers shorter than four bytes are never identified.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        let magic: [u8; 4] = data.get(..4)?.try_into().ok()?;
        Self::from_code(u32::from_le_bytes(magic))
    }

    /// Check if the kind is a chunked container.
    pub const fn is_container(self) -> bool {
        matches!(self, Self::Compressed | Self::CompressedChonky)
    }
}
