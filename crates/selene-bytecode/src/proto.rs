//! Function prototypes and their binary dump format
//!
//! A `Proto` is the compiled, heap-independent form of a scripted function.
//! `dump` produces a self-checking byte image that `undump` turns back into
//! a verified `Proto`; closures are relocated between interpreters this way.

use crate::encoder::{BytecodeReader, BytecodeWriter, DecodeError};
use crate::verify::{verify_proto, VerifyError};
use std::sync::Arc;
use thiserror::Error;

/// Magic number for Selene prototype dumps: "SLNB"
pub const MAGIC: [u8; 4] = *b"SLNB";

/// Current dump format version
pub const VERSION: u32 = 1;

/// Size of the dump header: magic + version + checksum
pub const HEADER_SIZE: usize = 12;

/// Name of the upvalue through which a function reaches its globals
pub const ENV_UPVALUE: &str = "_ENV";

/// Deepest prototype nesting accepted when decoding
const MAX_NESTING: usize = 200;

/// Prototype dump/undump errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtoError {
    /// Decode error
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Invalid magic number
    #[error("Invalid magic number: expected SLNB, got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Unsupported version
    #[error("Unsupported version: {0} (current: {VERSION})")]
    UnsupportedVersion(u32),

    /// Checksum mismatch
    #[error("Checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch {
        /// Checksum stored in the header
        expected: u32,
        /// Checksum computed over the payload
        actual: u32,
    },

    /// Bytes left over after the prototype
    #[error("{0} trailing bytes after prototype")]
    TrailingBytes(usize),

    /// Prototypes nested deeper than the decoder accepts
    #[error("Prototype nesting exceeds {MAX_NESTING}")]
    TooDeep,

    /// The decoded prototype failed verification
    #[error("Verification failed: {0}")]
    Verify(#[from] VerifyError),
}

/// Constant pool entry
#[derive(Debug, Clone)]
pub enum Constant {
    /// Number literal
    Number(f64),
    /// String literal
    String(String),
}

impl PartialEq for Constant {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Constant::Number(a), Constant::Number(b)) => a.to_bits() == b.to_bits(),
            (Constant::String(a), Constant::String(b)) => a == b,
            _ => false,
        }
    }
}

/// Where a closure takes an upvalue from when it is instantiated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    /// A local slot of the enclosing function
    Local(u8),
    /// An upvalue of the enclosing function
    Upvalue(u8),
}

/// Upvalue descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpvalueDesc {
    /// Variable name, `_ENV` for the globals slot
    pub name: String,
    /// Capture source in the enclosing function
    pub capture: Capture,
}

impl UpvalueDesc {
    /// Whether this slot is the globals slot
    pub fn is_env(&self) -> bool {
        self.name == ENV_UPVALUE
    }
}

/// Compiled function prototype
#[derive(Debug, Clone, PartialEq)]
pub struct Proto {
    /// Declared function name
    pub name: String,
    /// Number of fixed parameters (occupying the first local slots)
    pub param_count: u8,
    /// Whether extra arguments are kept as varargs
    pub is_vararg: bool,
    /// Number of local slots
    pub local_count: u8,
    /// Local slots captured by nested closures; these live in shared cells
    pub captured_locals: Vec<u8>,
    /// Constant pool
    pub constants: Vec<Constant>,
    /// Upvalue descriptors
    pub upvalues: Vec<UpvalueDesc>,
    /// Nested prototypes, instantiated by `Closure`
    pub protos: Vec<Arc<Proto>>,
    /// Instruction stream
    pub code: Vec<u8>,
}

impl Proto {
    /// Index of the globals upvalue, if the function has one
    pub fn env_slot(&self) -> Option<usize> {
        self.upvalues.iter().position(UpvalueDesc::is_env)
    }

    /// Number of captured variables
    pub fn upvalue_count(&self) -> usize {
        self.upvalues.len()
    }

    /// Whether a local slot is captured by a nested closure
    pub fn is_captured(&self, slot: u8) -> bool {
        self.captured_locals.contains(&slot)
    }

    /// Encode this prototype (without header)
    pub fn encode(&self, writer: &mut BytecodeWriter) {
        writer.emit_string(&self.name);
        writer.emit_u8(self.param_count);
        writer.emit_u8(self.is_vararg as u8);
        writer.emit_u8(self.local_count);

        writer.emit_u8(self.captured_locals.len() as u8);
        writer.emit_bytes(&self.captured_locals);

        writer.emit_u32(self.constants.len() as u32);
        for constant in &self.constants {
            match constant {
                Constant::Number(n) => {
                    writer.emit_u8(0);
                    writer.emit_f64(*n);
                }
                Constant::String(s) => {
                    writer.emit_u8(1);
                    writer.emit_string(s);
                }
            }
        }

        writer.emit_u32(self.upvalues.len() as u32);
        for upvalue in &self.upvalues {
            writer.emit_string(&upvalue.name);
            match upvalue.capture {
                Capture::Local(slot) => {
                    writer.emit_u8(0);
                    writer.emit_u8(slot);
                }
                Capture::Upvalue(index) => {
                    writer.emit_u8(1);
                    writer.emit_u8(index);
                }
            }
        }

        writer.emit_u32(self.protos.len() as u32);
        for proto in &self.protos {
            proto.encode(writer);
        }

        writer.emit_u32(self.code.len() as u32);
        writer.emit_bytes(&self.code);
    }

    /// Decode a prototype (without header)
    pub fn decode(reader: &mut BytecodeReader<'_>) -> Result<Self, ProtoError> {
        Self::decode_nested(reader, 0)
    }

    fn decode_nested(reader: &mut BytecodeReader<'_>, depth: usize) -> Result<Self, ProtoError> {
        if depth > MAX_NESTING {
            return Err(ProtoError::TooDeep);
        }

        let name = reader.read_string()?;
        let param_count = reader.read_u8()?;
        let is_vararg = reader.read_u8()? != 0;
        let local_count = reader.read_u8()?;

        let captured_len = reader.read_u8()? as usize;
        let captured_locals = reader.read_bytes(captured_len)?.to_vec();

        let constant_count = reader.read_u32()? as usize;
        let mut constants = Vec::with_capacity(constant_count.min(reader.remaining()));
        for _ in 0..constant_count {
            let offset = reader.position();
            let constant = match reader.read_u8()? {
                0 => Constant::Number(reader.read_f64()?),
                1 => Constant::String(reader.read_string()?),
                tag => return Err(DecodeError::InvalidTag(tag, offset).into()),
            };
            constants.push(constant);
        }

        let upvalue_count = reader.read_u32()? as usize;
        let mut upvalues = Vec::with_capacity(upvalue_count.min(reader.remaining()));
        for _ in 0..upvalue_count {
            let name = reader.read_string()?;
            let offset = reader.position();
            let capture = match reader.read_u8()? {
                0 => Capture::Local(reader.read_u8()?),
                1 => Capture::Upvalue(reader.read_u8()?),
                tag => return Err(DecodeError::InvalidTag(tag, offset).into()),
            };
            upvalues.push(UpvalueDesc { name, capture });
        }

        let proto_count = reader.read_u32()? as usize;
        let mut protos = Vec::with_capacity(proto_count.min(reader.remaining()));
        for _ in 0..proto_count {
            protos.push(Arc::new(Self::decode_nested(reader, depth + 1)?));
        }

        let code_len = reader.read_u32()? as usize;
        let code = reader.read_bytes(code_len)?.to_vec();

        Ok(Self {
            name,
            param_count,
            is_vararg,
            local_count,
            captured_locals,
            constants,
            upvalues,
            protos,
            code,
        })
    }
}

/// Serialize a prototype into a checksummed byte image
///
/// Format:
/// - Header: magic (4 bytes) + version (u32) + checksum (u32)
/// - Payload: the encoded prototype tree
pub fn dump(proto: &Proto) -> Vec<u8> {
    let mut writer = BytecodeWriter::with_capacity(HEADER_SIZE + proto.code.len() * 2);
    writer.emit_bytes(&MAGIC);
    writer.emit_u32(VERSION);
    let checksum_offset = writer.offset();
    writer.emit_u32(0);

    proto.encode(&mut writer);

    let checksum = crc32fast::hash(&writer.buffer[HEADER_SIZE..]);
    writer.patch_u32(checksum_offset, checksum);
    writer.into_bytes()
}

/// Rebuild a prototype from a byte image produced by [`dump`]
///
/// The header, checksum and bytecode are all validated before returning.
pub fn undump(data: &[u8]) -> Result<Proto, ProtoError> {
    let mut reader = BytecodeReader::new(data);

    let magic: [u8; 4] = reader
        .read_bytes(4)?
        .try_into()
        .map_err(|_| DecodeError::UnexpectedEnd(0))?;
    if magic != MAGIC {
        return Err(ProtoError::InvalidMagic(magic));
    }

    let version = reader.read_u32()?;
    if version != VERSION {
        return Err(ProtoError::UnsupportedVersion(version));
    }

    let stored_checksum = reader.read_u32()?;
    let calculated_checksum = crc32fast::hash(&data[HEADER_SIZE..]);
    if stored_checksum != calculated_checksum {
        return Err(ProtoError::ChecksumMismatch {
            expected: stored_checksum,
            actual: calculated_checksum,
        });
    }

    let proto = Proto::decode(&mut reader)?;
    if reader.has_more() {
        return Err(ProtoError::TrailingBytes(reader.remaining()));
    }

    verify_proto(&proto)?;
    Ok(proto)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::Opcode;

    fn sample() -> Proto {
        let inner = Proto {
            name: "inner".to_string(),
            param_count: 0,
            is_vararg: false,
            local_count: 0,
            captured_locals: vec![],
            constants: vec![],
            upvalues: vec![UpvalueDesc {
                name: "n".to_string(),
                capture: Capture::Local(0),
            }],
            protos: vec![],
            code: vec![Opcode::GetUpval.to_u8(), 0, Opcode::Return.to_u8(), 1],
        };
        Proto {
            name: "outer".to_string(),
            param_count: 1,
            is_vararg: true,
            local_count: 1,
            captured_locals: vec![0],
            constants: vec![Constant::Number(1.5), Constant::String("k".to_string())],
            upvalues: vec![UpvalueDesc {
                name: ENV_UPVALUE.to_string(),
                capture: Capture::Upvalue(0),
            }],
            protos: vec![Arc::new(inner)],
            code: vec![
                Opcode::Closure.to_u8(),
                0,
                0,
                Opcode::Return.to_u8(),
                1,
            ],
        }
    }

    #[test]
    fn test_dump_header() {
        let bytes = dump(&sample());
        assert_eq!(&bytes[0..4], &MAGIC);
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), VERSION);
    }

    #[test]
    fn test_undump_restores_nested_protos() {
        let proto = sample();
        let restored = undump(&dump(&proto)).unwrap();
        assert_eq!(restored, proto);
        assert_eq!(restored.env_slot(), Some(0));
        assert!(restored.is_captured(0));
        assert_eq!(restored.protos[0].upvalues[0].capture, Capture::Local(0));
    }

    #[test]
    fn test_undump_detects_corruption() {
        let mut bytes = dump(&sample());
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(
            undump(&bytes),
            Err(ProtoError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_undump_rejects_foreign_data() {
        assert!(matches!(
            undump(b"\x1bLua\x01\x00\x00\x00\x00\x00\x00\x00"),
            Err(ProtoError::InvalidMagic(_))
        ));

        let mut bytes = dump(&sample());
        bytes[4] = 9;
        assert_eq!(undump(&bytes), Err(ProtoError::UnsupportedVersion(9)));

        assert!(matches!(undump(b"SL"), Err(ProtoError::Decode(_))));
    }

    #[test]
    fn test_undump_runs_verifier() {
        let mut proto = sample();
        proto.code = vec![Opcode::GetLocal.to_u8(), 7, Opcode::Return.to_u8(), 1];
        assert!(matches!(undump(&dump(&proto)), Err(ProtoError::Verify(_))));
    }
}
