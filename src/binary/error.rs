use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Error {
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("invalid utf-8 in name")]
    InvalidUtf8,
    #[error("integer representation too long")]
    VarintTooLong,
    #[error("bad magic number (expected \\0asm)")]
    BadMagic,
    #[error("unsupported binary version: {0}")]
    UnsupportedVersion(u32),
    #[error("unknown section id: {0:#04x}")]
    UnknownSectionId(u8),
    #[error("unknown value type: {0:#04x}")]
    UnknownValueType(u8),
    #[error("malformed function type: expected 0x60, got {0:#04x}")]
    MalformedFuncType(u8),
    #[error("invalid reference type: {0:#04x}")]
    InvalidRefType(u8),
    #[error("invalid limits flag: {0:#04x}")]
    InvalidLimitsFlag(u8),
    #[error("invalid global mutability: {0:#04x}")]
    InvalidMutability(u8),
    #[error("unhandled import descriptor: {0:#04x}")]
    UnhandledImportDesc(u8),
    #[error("unhandled export descriptor: {0:#04x}")]
    UnhandledExportDesc(u8),
    #[error("unhandled element segment flags: {0:#04x}")]
    UnhandledElementFlags(u8),
    #[error("unhandled data segment flags: {0:#04x}")]
    UnhandledDataFlags(u8),
    #[error("unknown opcode: {0:#04x}")]
    UnknownOpcode(u8),
    #[error("unknown 0xfc-prefixed opcode: {0}")]
    UnknownMiscOpcode(u32),
    #[error("invalid block type: {0}")]
    InvalidBlockType(i64),
    #[error("else outside of an if block")]
    UnexpectedElse,
    #[error("branch depth {0} exceeds the enclosing labels")]
    BranchDepthOutOfRange(u32),
    #[error("control structures nested deeper than {0}")]
    NestingTooDeep(usize),
    #[error("too many locals: {0}")]
    TooManyLocals(u64),
    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),
}
