use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Element type tag. Names match the framework spelling found in
/// existing manifests (`torch.float32`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum DType {
    #[default]
    F32,
    F64,
    I8,
    I16,
    I32,
    I64,
    U8,
}

impl DType {
    pub const ALL: [DType; 7] = [
        DType::F32,
        DType::F64,
        DType::I8,
        DType::I16,
        DType::I32,
        DType::I64,
        DType::U8,
    ];

    pub fn size(&self) -> usize {
        match self {
            DType::I8 | DType::U8 => 1,
            DType::I16 => 2,
            DType::F32 | DType::I32 => 4,
            DType::F64 | DType::I64 => 8,
        }
    }

    /// Name written to manifests.
    pub fn name(&self) -> &'static str {
        match self {
            DType::F32 => "torch.float32",
            DType::F64 => "torch.float64",
            DType::I8 => "torch.int8",
            DType::I16 => "torch.int16",
            DType::I32 => "torch.int32",
            DType::I64 => "torch.int64",
            DType::U8 => "torch.uint8",
        }
    }

    fn short_name(&self) -> &'static str {
        self.name().trim_start_matches("torch.")
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

impl FromStr for DType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let bare = s.trim().trim_start_matches("torch.");
        let found = DType::ALL.into_iter().find(|d| {
            d.short_name() == bare
                || match d {
                    DType::F32 => bare == "f32" || bare == "float",
                    DType::F64 => bare == "f64" || bare == "double",
                    DType::I8 => bare == "i8",
                    DType::I16 => bare == "i16" || bare == "short",
                    DType::I32 => bare == "i32" || bare == "int",
                    DType::I64 => bare == "i64" || bare == "long",
                    DType::U8 => bare == "u8",
                }
        });
        found.ok_or_else(|| Error::UnknownDType(s.to_string()))
    }
}

impl From<DType> for String {
    fn from(dtype: DType) -> Self { dtype.name().to_string() }
}

impl TryFrom<String> for DType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Error> { value.parse() }
}

/// Rust scalar types that can live in a [`crate::Tensor`].
pub trait Element: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    const DTYPE: DType;

    fn write_le(self, out: &mut [u8]);
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_element {
    ($($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: DType = DType::$dtype;

                fn write_le(self, out: &mut [u8]) { out.copy_from_slice(&self.to_le_bytes()); }

                fn read_le(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(raw)
                }
            }
        )*
    };
}

impl_element! {
    f32 => F32,
    f64 => F64,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
}
