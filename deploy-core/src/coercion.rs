//! Coercion of textual arguments into the typed values a contract expects
//!
//! Arguments arrive as one comma-separated string. Each token is checked
//! against the declared type of its parameter, and the whole list is rejected
//! if any token does not map unambiguously onto its type. Nothing here touches
//! the network.

use std::{
    fmt::{self, Display},
    str::FromStr,
};

use alloy::dyn_abi::DynSolValue;
use alloy_primitives::{Address, Bytes, B256, I256, U256};

use crate::errors::DeployError;

/// The number of hex digits in an address
const ADDRESS_HEX_LEN: usize = 40;

/// The largest fixed-size byte array type
const MAX_FIXED_BYTES: usize = 32;

/// The widest integer type
const MAX_INT_BITS: usize = 256;

/// The declared type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    /// `uint<bits>`
    Uint(usize),
    /// `int<bits>`
    Int(usize),
    /// `bool`
    Bool,
    /// `address`
    Address,
    /// `string`
    String,
    /// `bytes`
    Bytes,
    /// `bytes<size>`
    FixedBytes(usize),
}

impl FromStr for TypeTag {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unsupported = || DeployError::UnsupportedParameterType(s.to_string());

        let tag = match s {
            "bool" => TypeTag::Bool,
            "address" => TypeTag::Address,
            "string" => TypeTag::String,
            "bytes" => TypeTag::Bytes,
            "uint" => TypeTag::Uint(MAX_INT_BITS),
            "int" => TypeTag::Int(MAX_INT_BITS),
            _ => {
                if let Some(bits) = s.strip_prefix("uint") {
                    TypeTag::Uint(parse_int_width(bits).ok_or_else(unsupported)?)
                } else if let Some(bits) = s.strip_prefix("int") {
                    TypeTag::Int(parse_int_width(bits).ok_or_else(unsupported)?)
                } else if let Some(size) = s.strip_prefix("bytes") {
                    let size = parse_decimal(size)
                        .filter(|size| (1..=MAX_FIXED_BYTES).contains(size))
                        .ok_or_else(unsupported)?;
                    TypeTag::FixedBytes(size)
                } else {
                    return Err(unsupported());
                }
            }
        };

        Ok(tag)
    }
}

impl Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Uint(bits) => write!(f, "uint{}", bits),
            TypeTag::Int(bits) => write!(f, "int{}", bits),
            TypeTag::Bool => write!(f, "bool"),
            TypeTag::Address => write!(f, "address"),
            TypeTag::String => write!(f, "string"),
            TypeTag::Bytes => write!(f, "bytes"),
            TypeTag::FixedBytes(size) => write!(f, "bytes{}", size),
        }
    }
}

/// Parse an integer bit width, a multiple of 8 between 8 and 256
fn parse_int_width(s: &str) -> Option<usize> {
    parse_decimal(s).filter(|bits| bits % 8 == 0 && (8..=MAX_INT_BITS).contains(bits))
}

/// Parse a plain decimal number without sign or leading zeros
fn parse_decimal(s: &str) -> Option<usize> {
    if s.is_empty() || s.starts_with('0') || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// An argument coerced into its parameter's type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedArgument {
    /// An unsigned integer of the given width
    Uint {
        /// The value
        value: U256,
        /// The bit width of the parameter
        bits: usize,
    },
    /// A signed integer of the given width
    Int {
        /// The value
        value: I256,
        /// The bit width of the parameter
        bits: usize,
    },
    /// A boolean
    Bool(bool),
    /// An address
    Address(Address),
    /// A string
    String(String),
    /// A dynamic byte sequence
    Bytes(Bytes),
    /// A fixed-size byte array
    FixedBytes {
        /// The bytes
        value: Bytes,
        /// The declared size
        size: usize,
    },
}

impl TypedArgument {
    /// The type this argument was coerced into
    pub fn type_tag(&self) -> TypeTag {
        match self {
            TypedArgument::Uint { bits, .. } => TypeTag::Uint(*bits),
            TypedArgument::Int { bits, .. } => TypeTag::Int(*bits),
            TypedArgument::Bool(_) => TypeTag::Bool,
            TypedArgument::Address(_) => TypeTag::Address,
            TypedArgument::String(_) => TypeTag::String,
            TypedArgument::Bytes(_) => TypeTag::Bytes,
            TypedArgument::FixedBytes { size, .. } => TypeTag::FixedBytes(*size),
        }
    }
}

impl From<&TypedArgument> for DynSolValue {
    fn from(arg: &TypedArgument) -> Self {
        match arg {
            TypedArgument::Uint { value, bits } => DynSolValue::Uint(*value, *bits),
            TypedArgument::Int { value, bits } => DynSolValue::Int(*value, *bits),
            TypedArgument::Bool(b) => DynSolValue::Bool(*b),
            TypedArgument::Address(a) => DynSolValue::Address(*a),
            TypedArgument::String(s) => DynSolValue::String(s.clone()),
            TypedArgument::Bytes(b) => DynSolValue::Bytes(b.to_vec()),
            TypedArgument::FixedBytes { value, size } => {
                DynSolValue::FixedBytes(B256::right_padding_from(value), *size)
            }
        }
    }
}

/// ABI-encode arguments as the parameters of a function or constructor
pub fn encode_arguments(args: &[TypedArgument]) -> Vec<u8> {
    if args.is_empty() {
        return Vec::new();
    }
    DynSolValue::Tuple(args.iter().map(DynSolValue::from).collect()).abi_encode_params()
}

/// Split the textual argument form into tokens
///
/// An empty string means no arguments. Tokens are trimmed, and an empty token
/// between two commas is rejected.
pub fn parse_raw_args(raw: &str) -> Result<Option<Vec<String>>, DeployError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }

    raw.split(',')
        .enumerate()
        .map(|(position, token)| {
            let token = token.trim();
            if token.is_empty() {
                Err(DeployError::InvalidArgument {
                    position,
                    token: token.to_string(),
                    reason: "empty argument".to_string(),
                })
            } else {
                Ok(token.to_string())
            }
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// Coerce raw tokens into the given parameter types
pub fn coerce(
    raw_args: &[String],
    target_types: &[TypeTag],
) -> Result<Vec<TypedArgument>, DeployError> {
    if raw_args.len() != target_types.len() {
        return Err(DeployError::ArityMismatch {
            expected: target_types.len(),
            actual: raw_args.len(),
        });
    }

    raw_args
        .iter()
        .zip(target_types)
        .enumerate()
        .map(|(position, (token, ty))| coerce_one(position, token, *ty))
        .collect()
}

/// Coerce a single token into a parameter type
pub fn coerce_one(
    position: usize,
    token: &str,
    ty: TypeTag,
) -> Result<TypedArgument, DeployError> {
    let invalid = |reason: &str| DeployError::InvalidArgument {
        position,
        token: token.to_string(),
        reason: reason.to_string(),
    };
    let out_of_range = || DeployError::ArgumentOutOfRange {
        position,
        token: token.to_string(),
        ty: ty.to_string(),
    };

    match ty {
        TypeTag::Uint(bits) => {
            let (negative, digits) = split_sign(token).ok_or_else(|| invalid("not an integer"))?;
            let magnitude = U256::from_str_radix(digits, 10).map_err(|_| out_of_range())?;
            if negative && !magnitude.is_zero() {
                return Err(out_of_range());
            }
            if magnitude.bit_len() > bits {
                return Err(out_of_range());
            }
            Ok(TypedArgument::Uint {
                value: magnitude,
                bits,
            })
        }
        TypeTag::Int(bits) => {
            let (negative, digits) = split_sign(token).ok_or_else(|| invalid("not an integer"))?;
            let magnitude = U256::from_str_radix(digits, 10).map_err(|_| out_of_range())?;

            // The range of an N-bit two's complement integer is [-2^(N-1), 2^(N-1) - 1]
            let limit = U256::from(1) << (bits - 1);
            let in_range = if negative {
                magnitude <= limit
            } else {
                magnitude < limit
            };
            if !in_range {
                return Err(out_of_range());
            }

            let value = if negative {
                I256::ZERO.wrapping_sub(I256::from_raw(magnitude))
            } else {
                I256::from_raw(magnitude)
            };
            Ok(TypedArgument::Int { value, bits })
        }
        TypeTag::Bool => match token {
            "true" => Ok(TypedArgument::Bool(true)),
            "false" => Ok(TypedArgument::Bool(false)),
            _ => Err(invalid("expected `true` or `false`")),
        },
        TypeTag::Address => parse_address(token)
            .map(TypedArgument::Address)
            .ok_or_else(|| invalid("expected 0x followed by 40 hex digits with a valid checksum")),
        TypeTag::String => Ok(TypedArgument::String(token.to_string())),
        TypeTag::Bytes => parse_hex_bytes(token)
            .map(TypedArgument::Bytes)
            .ok_or_else(|| invalid("expected 0x-prefixed hex")),
        TypeTag::FixedBytes(size) => {
            let value = parse_hex_bytes(token).ok_or_else(|| invalid("expected 0x-prefixed hex"))?;
            if value.len() != size {
                return Err(invalid(&format!("expected exactly {} bytes", size)));
            }
            Ok(TypedArgument::FixedBytes { value, size })
        }
    }
}

/// Split an integer token into its sign and digits
///
/// Returns `None` unless the token is an optional sign followed by at least one
/// ASCII digit.
fn split_sign(token: &str) -> Option<(bool, &str)> {
    let (negative, digits) = match token.as_bytes().first()? {
        b'-' => (true, &token[1..]),
        b'+' => (false, &token[1..]),
        _ => (false, token),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((negative, digits))
}

/// Parse an address, enforcing the checksum on mixed-case input
fn parse_address(token: &str) -> Option<Address> {
    let hex = token.strip_prefix("0x")?;
    if hex.len() != ADDRESS_HEX_LEN || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    let has_lower = hex.bytes().any(|b| b.is_ascii_lowercase());
    let has_upper = hex.bytes().any(|b| b.is_ascii_uppercase());
    if has_lower && has_upper {
        Address::parse_checksummed(token, None).ok()
    } else {
        Address::from_str(token).ok()
    }
}

/// Parse a 0x-prefixed, even-length hex string
fn parse_hex_bytes(token: &str) -> Option<Bytes> {
    let hex = token.strip_prefix("0x")?;
    if hex.len() % 2 != 0 {
        return None;
    }
    hex::decode(hex).ok().map(Bytes::from)
}
