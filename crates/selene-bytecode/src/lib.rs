//! Selene Bytecode Definitions
//!
//! This crate provides the instruction set, the function prototype format
//! and its checksummed dump, a verifier, and an assembler used by hosts
//! and tests to build prototypes directly.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod builder;
pub mod encoder;
pub mod opcode;
pub mod proto;
pub mod verify;

pub use builder::{Label, ProtoBuilder};
pub use encoder::{BytecodeReader, BytecodeWriter, DecodeError};
pub use opcode::{Opcode, MULTI};
pub use proto::{dump, undump, Capture, Constant, Proto, ProtoError, UpvalueDesc, ENV_UPVALUE};
pub use verify::{verify_proto, VerifyError};
