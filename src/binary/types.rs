use super::instruction::Instruction;
use num_derive::FromPrimitive;

// https://webassembly.github.io/spec/core/binary/types.html#value-types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum ValueType {
    I32 = 0x7f,
    I64 = 0x7e,
    F32 = 0x7d,
    F64 = 0x7c,
    V128 = 0x7b,
    FuncRef = 0x70,
    ExternRef = 0x6f,
}

impl ValueType {
    pub fn is_ref(&self) -> bool {
        matches!(self, Self::FuncRef | Self::ExternRef)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FuncType {
    pub params: Vec<ValueType>,
    pub results: Vec<ValueType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub min: u32,
    pub max: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableType {
    pub elem_type: ValueType,
    pub limits: Limits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum Mutability {
    Const = 0x00,
    Var = 0x01,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalType {
    pub value_type: ValueType,
    pub mutability: Mutability,
}

/// A terminated instruction sequence, without its closing `end`.
pub type Expr = Vec<Instruction>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub module: String,
    pub field: String,
    pub desc: ImportDesc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportDesc {
    Func(u32),
    Table(TableType),
    Memory(Limits),
    Global(GlobalType),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub name: String,
    pub desc: ExportDesc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportDesc {
    Func(u32),
    Table(u32),
    Memory(u32),
    Global(u32),
    Tag(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Global {
    pub global_type: GlobalType,
    pub init_expr: Expr,
}

/// An active element segment. Flags selecting passive or declarative
/// segments, or an explicit table, fail with `UnhandledElementFlags`, so
/// `table_index` is always 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub elem_type: ValueType,
    pub table_index: u32,
    pub offset: Expr,
    pub init: Vec<Expr>,
}

/// A data segment. `init` borrows the module bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data<'a> {
    pub memory_index: Option<u32>,
    pub offset: Option<Expr>,
    pub init: &'a [u8],
}

impl Data<'_> {
    pub fn is_passive(&self) -> bool {
        self.offset.is_none()
    }
}

/// Location of one function body, recorded by the code section header pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeHeader {
    /// Absolute offset of the body's first byte (the locals vector).
    pub offset: usize,
    pub length: usize,
    /// Signature index from the function section at the same position.
    pub type_index: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Local {
    pub index: u32,
    pub value_type: ValueType,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FunctionBody {
    pub locals: Vec<Local>,
    pub code: Expr,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Custom<'a> {
    pub name: String,
    pub data: &'a [u8],
    /// Absolute offset of `data`.
    pub offset: usize,
}
