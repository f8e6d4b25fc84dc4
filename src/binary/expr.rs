use super::error::Error;
use super::instruction::{Block, BlockType, IfElse, Ieee32, Ieee64, Instruction, MemoryArg};
use super::opcode::{self, Opcode};
use super::reader::Reader;
use super::section::{decode_ref_type, decode_value_type};
use super::types::{CodeHeader, Expr, FunctionBody, Local, ValueType};
use anyhow::{bail, Context as _, Result};
use log::trace;
use num_traits::FromPrimitive as _;

/// Upper bound on the number of locals a single body may declare.
pub const MAX_LOCALS: u64 = 50_000;

/// Upper bound on open labels, the expression itself included.
pub const MAX_NESTING: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LabelKind {
    Block,
    Loop,
    If,
}

/// A structured instruction whose `end` has not been read yet.
#[derive(Debug)]
struct Frame {
    label: u32,
    kind: LabelKind,
    block_type: BlockType,
    code: Vec<Instruction>,
    /// Set once an `if` has seen its `else`; `code` then collects the else arm.
    then_body: Option<Vec<Instruction>>,
}

impl Frame {
    fn into_instruction(self) -> Instruction {
        let Frame {
            label,
            kind,
            block_type,
            code,
            then_body,
        } = self;
        match kind {
            LabelKind::Block => Instruction::Block(Block {
                label,
                block_type,
                body: code,
            }),
            LabelKind::Loop => Instruction::Loop(Block {
                label,
                block_type,
                body: code,
            }),
            LabelKind::If => match then_body {
                None => Instruction::If(IfElse {
                    label,
                    block_type,
                    then_body: code,
                    else_body: None,
                }),
                Some(then_body) => Instruction::If(IfElse {
                    label,
                    block_type,
                    then_body,
                    else_body: Some(code),
                }),
            },
        }
    }
}

/// Decode state for one expression or function body. The expression itself
/// is the outermost label; `frames` holds the structures opened inside it,
/// innermost last.
#[derive(Debug, Default)]
struct ExprDecoder {
    body: Vec<Instruction>,
    frames: Vec<Frame>,
    next_label: u32,
}

macro_rules! plain_instructions {
    ($($name:ident),* $(,)?) => {
        fn plain_instruction(opcode: Opcode) -> Option<Instruction> {
            match opcode {
                $(Opcode::$name => Some(Instruction::$name),)*
                _ => None,
            }
        }
    };
}

plain_instructions!(
    Unreachable, Nop, Return, Drop, Select, RefIsNull,
    I32Eqz, I32Eq, I32Ne, I32LtS, I32LtU, I32GtS, I32GtU, I32LeS, I32LeU, I32GeS, I32GeU,
    I64Eqz, I64Eq, I64Ne, I64LtS, I64LtU, I64GtS, I64GtU, I64LeS, I64LeU, I64GeS, I64GeU,
    F32Eq, F32Ne, F32Lt, F32Gt, F32Le, F32Ge,
    F64Eq, F64Ne, F64Lt, F64Gt, F64Le, F64Ge,
    I32Clz, I32Ctz, I32Popcnt, I32Add, I32Sub, I32Mul, I32DivS, I32DivU, I32RemS, I32RemU,
    I32And, I32Or, I32Xor, I32Shl, I32ShrS, I32ShrU, I32Rotl, I32Rotr,
    I64Clz, I64Ctz, I64Popcnt, I64Add, I64Sub, I64Mul, I64DivS, I64DivU, I64RemS, I64RemU,
    I64And, I64Or, I64Xor, I64Shl, I64ShrS, I64ShrU, I64Rotl, I64Rotr,
    F32Abs, F32Neg, F32Ceil, F32Floor, F32Trunc, F32Nearest, F32Sqrt,
    F32Add, F32Sub, F32Mul, F32Div, F32Min, F32Max, F32Copysign,
    F64Abs, F64Neg, F64Ceil, F64Floor, F64Trunc, F64Nearest, F64Sqrt,
    F64Add, F64Sub, F64Mul, F64Div, F64Min, F64Max, F64Copysign,
    I32WrapI64, I32TruncF32S, I32TruncF32U, I32TruncF64S, I32TruncF64U,
    I64ExtendI32S, I64ExtendI32U, I64TruncF32S, I64TruncF32U, I64TruncF64S, I64TruncF64U,
    F32ConvertI32S, F32ConvertI32U, F32ConvertI64S, F32ConvertI64U, F32DemoteF64,
    F64ConvertI32S, F64ConvertI32U, F64ConvertI64S, F64ConvertI64U, F64PromoteF32,
    I32ReinterpretF32, I64ReinterpretF64, F32ReinterpretI32, F64ReinterpretI64,
    I32Extend8S, I32Extend16S, I64Extend8S, I64Extend16S, I64Extend32S,
);

impl ExprDecoder {
    fn code(&mut self) -> &mut Vec<Instruction> {
        match self.frames.last_mut() {
            Some(frame) => &mut frame.code,
            None => &mut self.body,
        }
    }

    fn open(&mut self, kind: LabelKind, reader: &mut Reader) -> Result<()> {
        let block_type = decode_block_type(reader)?;
        // the expression itself holds one label
        if self.frames.len() + 1 >= MAX_NESTING {
            bail!(Error::NestingTooDeep(MAX_NESTING));
        }
        self.next_label += 1;
        self.frames.push(Frame {
            label: self.next_label,
            kind,
            block_type,
            code: vec![],
            then_body: None,
        });
        Ok(())
    }

    fn else_arm(&mut self) -> Result<()> {
        match self.frames.last_mut() {
            Some(frame) if frame.kind == LabelKind::If && frame.then_body.is_none() => {
                frame.then_body = Some(std::mem::take(&mut frame.code));
                Ok(())
            }
            _ => bail!(Error::UnexpectedElse),
        }
    }

    /// Decodes instructions up to the `end` that closes the expression.
    fn expr(mut self, reader: &mut Reader) -> Result<Expr> {
        loop {
            let byte = reader.byte()?;
            let opcode = Opcode::from_u8(byte).ok_or(Error::UnknownOpcode(byte))?;
            trace!("decode opcode: {:?}", opcode);
            match opcode {
                Opcode::Block => self.open(LabelKind::Block, reader)?,
                Opcode::Loop => self.open(LabelKind::Loop, reader)?,
                Opcode::If => self.open(LabelKind::If, reader)?,
                Opcode::Else => self.else_arm()?,
                Opcode::End => match self.frames.pop() {
                    Some(frame) => {
                        let inst = frame.into_instruction();
                        self.code().push(inst);
                    }
                    None => return Ok(self.body),
                },
                _ => {
                    let inst = self.instruction(opcode, reader)?;
                    self.code().push(inst);
                }
            }
        }
    }

    /// Reads a relative branch depth and checks it names an open label.
    fn branch(&self, reader: &mut Reader) -> Result<u32> {
        let depth = reader.u32()?;
        match self.frames.iter().rev().nth(depth as usize) {
            Some(target) => trace!(
                "branch depth {} targets {:?} label {}",
                depth,
                target.kind,
                target.label
            ),
            None if depth as usize == self.frames.len() => {
                trace!("branch depth {} targets the expression", depth)
            }
            None => bail!(Error::BranchDepthOutOfRange(depth)),
        }
        Ok(depth)
    }

    fn instruction(&self, opcode: Opcode, reader: &mut Reader) -> Result<Instruction> {
        let inst = match opcode {
            Opcode::Br => Instruction::Br(self.branch(reader)?),
            Opcode::BrIf => Instruction::BrIf(self.branch(reader)?),
            Opcode::BrTable => {
                let targets = reader.vec(|r| self.branch(r))?;
                let default = self.branch(reader)?;
                Instruction::BrTable(targets, default)
            }
            Opcode::Call => Instruction::Call(reader.u32()?),
            Opcode::CallIndirect => Instruction::CallIndirect {
                type_index: reader.u32()?,
                table_index: reader.u32()?,
            },
            Opcode::SelectTyped => Instruction::SelectTyped(reader.vec(decode_value_type)?),
            Opcode::LocalGet => Instruction::LocalGet(reader.u32()?),
            Opcode::LocalSet => Instruction::LocalSet(reader.u32()?),
            Opcode::LocalTee => Instruction::LocalTee(reader.u32()?),
            Opcode::GlobalGet => Instruction::GlobalGet(reader.u32()?),
            Opcode::GlobalSet => Instruction::GlobalSet(reader.u32()?),
            Opcode::TableGet => Instruction::TableGet(reader.u32()?),
            Opcode::TableSet => Instruction::TableSet(reader.u32()?),
            Opcode::I32Load => Instruction::I32Load(decode_memory_arg(reader)?),
            Opcode::I64Load => Instruction::I64Load(decode_memory_arg(reader)?),
            Opcode::F32Load => Instruction::F32Load(decode_memory_arg(reader)?),
            Opcode::F64Load => Instruction::F64Load(decode_memory_arg(reader)?),
            Opcode::I32Load8S => Instruction::I32Load8S(decode_memory_arg(reader)?),
            Opcode::I32Load8U => Instruction::I32Load8U(decode_memory_arg(reader)?),
            Opcode::I32Load16S => Instruction::I32Load16S(decode_memory_arg(reader)?),
            Opcode::I32Load16U => Instruction::I32Load16U(decode_memory_arg(reader)?),
            Opcode::I64Load8S => Instruction::I64Load8S(decode_memory_arg(reader)?),
            Opcode::I64Load8U => Instruction::I64Load8U(decode_memory_arg(reader)?),
            Opcode::I64Load16S => Instruction::I64Load16S(decode_memory_arg(reader)?),
            Opcode::I64Load16U => Instruction::I64Load16U(decode_memory_arg(reader)?),
            Opcode::I64Load32S => Instruction::I64Load32S(decode_memory_arg(reader)?),
            Opcode::I64Load32U => Instruction::I64Load32U(decode_memory_arg(reader)?),
            Opcode::I32Store => Instruction::I32Store(decode_memory_arg(reader)?),
            Opcode::I64Store => Instruction::I64Store(decode_memory_arg(reader)?),
            Opcode::F32Store => Instruction::F32Store(decode_memory_arg(reader)?),
            Opcode::F64Store => Instruction::F64Store(decode_memory_arg(reader)?),
            Opcode::I32Store8 => Instruction::I32Store8(decode_memory_arg(reader)?),
            Opcode::I32Store16 => Instruction::I32Store16(decode_memory_arg(reader)?),
            Opcode::I64Store8 => Instruction::I64Store8(decode_memory_arg(reader)?),
            Opcode::I64Store16 => Instruction::I64Store16(decode_memory_arg(reader)?),
            Opcode::I64Store32 => Instruction::I64Store32(decode_memory_arg(reader)?),
            Opcode::MemorySize => Instruction::MemorySize(reader.u32()?),
            Opcode::MemoryGrow => Instruction::MemoryGrow(reader.u32()?),
            Opcode::I32Const => Instruction::I32Const(reader.i32()?),
            Opcode::I64Const => Instruction::I64Const(reader.i64()?),
            Opcode::F32Const => Instruction::F32Const(Ieee32(u32::from_le_bytes(reader.array()?))),
            Opcode::F64Const => Instruction::F64Const(Ieee64(u64::from_le_bytes(reader.array()?))),
            Opcode::RefNull => Instruction::RefNull(decode_ref_type(reader)?),
            Opcode::RefFunc => Instruction::RefFunc(reader.u32()?),
            Opcode::Misc => decode_misc_instruction(reader)?,
            other => plain_instruction(other).ok_or(Error::UnknownOpcode(other as u8))?,
        };
        Ok(inst)
    }
}

// https://webassembly.github.io/spec/core/binary/instructions.html#numeric-instructions
fn decode_misc_instruction(reader: &mut Reader) -> Result<Instruction> {
    let op = reader.u32()?;
    trace!("decode 0xfc opcode: {}", op);
    let inst = match op {
        opcode::I32_TRUNC_SAT_F32_S => Instruction::I32TruncSatF32S,
        opcode::I32_TRUNC_SAT_F32_U => Instruction::I32TruncSatF32U,
        opcode::I32_TRUNC_SAT_F64_S => Instruction::I32TruncSatF64S,
        opcode::I32_TRUNC_SAT_F64_U => Instruction::I32TruncSatF64U,
        opcode::I64_TRUNC_SAT_F32_S => Instruction::I64TruncSatF32S,
        opcode::I64_TRUNC_SAT_F32_U => Instruction::I64TruncSatF32U,
        opcode::I64_TRUNC_SAT_F64_S => Instruction::I64TruncSatF64S,
        opcode::I64_TRUNC_SAT_F64_U => Instruction::I64TruncSatF64U,
        opcode::MEMORY_INIT => Instruction::MemoryInit {
            data_index: reader.u32()?,
            memory: reader.u32()?,
        },
        opcode::DATA_DROP => Instruction::DataDrop(reader.u32()?),
        opcode::MEMORY_COPY => Instruction::MemoryCopy {
            dst: reader.u32()?,
            src: reader.u32()?,
        },
        opcode::MEMORY_FILL => Instruction::MemoryFill(reader.u32()?),
        // the element index comes before the table index in the encoding
        opcode::TABLE_INIT => Instruction::TableInit {
            elem_index: reader.u32()?,
            table: reader.u32()?,
        },
        opcode::ELEM_DROP => Instruction::ElemDrop(reader.u32()?),
        opcode::TABLE_COPY => Instruction::TableCopy {
            dst: reader.u32()?,
            src: reader.u32()?,
        },
        opcode::TABLE_GROW => Instruction::TableGrow(reader.u32()?),
        opcode::TABLE_SIZE => Instruction::TableSize(reader.u32()?),
        opcode::TABLE_FILL => Instruction::TableFill(reader.u32()?),
        _ => bail!(Error::UnknownMiscOpcode(op)),
    };
    Ok(inst)
}

fn decode_block_type(reader: &mut Reader) -> Result<BlockType> {
    let byte = reader.peek()?;
    if byte == 0x40 {
        reader.byte()?;
        return Ok(BlockType::Empty);
    }
    if let Some(value_type) = ValueType::from_u8(byte) {
        reader.byte()?;
        return Ok(BlockType::Value(value_type));
    }
    // otherwise a type index, encoded as a positive s33
    let index = reader.i64()?;
    let index = u32::try_from(index).map_err(|_| Error::InvalidBlockType(index))?;
    Ok(BlockType::TypeIndex(index))
}

fn decode_memory_arg(reader: &mut Reader) -> Result<MemoryArg> {
    let arg = MemoryArg {
        align: reader.u32()?,
        offset: reader.u32()?,
    };
    Ok(arg)
}

/// Decodes one `end`-terminated expression, such as a global initializer or
/// a segment offset.
pub fn decode_expr(reader: &mut Reader) -> Result<Expr> {
    ExprDecoder::default().expr(reader)
}

/// Decodes a function body positioned at `reader`: the locals declaration
/// followed by the instruction stream. Local indices start at `param_count`.
/// The reader must hold exactly one body.
pub fn decode_function_body(reader: &mut Reader, param_count: u32) -> Result<FunctionBody> {
    let groups = reader.vec(|r| Ok((r.u32()?, decode_value_type(r)?)))?;

    let total = groups.iter().map(|(count, _)| u64::from(*count)).sum::<u64>();
    if total > MAX_LOCALS {
        bail!(Error::TooManyLocals(total));
    }

    let mut locals = Vec::with_capacity(total as usize);
    let mut index = param_count;
    for (count, value_type) in groups {
        for _ in 0..count {
            locals.push(Local { index, value_type });
            index = index.saturating_add(1);
        }
    }

    let code = decode_expr(reader)?;
    reader.finish()?;

    Ok(FunctionBody { locals, code })
}

/// Decodes the body a code header points at. `bytes` is the buffer the
/// header's offsets were recorded against. Safe to call any number of times,
/// from any thread.
pub fn decode_function_body_at(
    bytes: &[u8],
    header: &CodeHeader,
    param_count: u32,
) -> Result<FunctionBody> {
    let body = header
        .offset
        .checked_add(header.length)
        .and_then(|end| bytes.get(header.offset..end))
        .ok_or(Error::UnexpectedEnd)?;
    let mut reader = Reader::with_base(body, header.offset);
    let result = decode_function_body(&mut reader, param_count);
    result.with_context(|| {
        format!(
            "failed to decode function body at offset {:#x} (stopped at {:#x})",
            header.offset,
            reader.position()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn expr(bytes: &[u8]) -> Result<Expr> {
        let mut reader = Reader::new(bytes);
        let expr = decode_expr(&mut reader)?;
        reader.finish()?;
        Ok(expr)
    }

    fn kind(err: &anyhow::Error) -> Option<&Error> {
        err.downcast_ref::<Error>()
    }

    #[test]
    fn decode_const_expr() -> Result<()> {
        assert_eq!(expr(&[0x41, 0x00, 0x0b])?, vec![Instruction::I32Const(0)]);
        assert_eq!(expr(&[0x42, 0x7f, 0x0b])?, vec![Instruction::I64Const(-1)]);
        assert_eq!(expr(&[0x23, 0x02, 0x0b])?, vec![Instruction::GlobalGet(2)]);
        assert_eq!(expr(&[0xd2, 0x05, 0x0b])?, vec![Instruction::RefFunc(5)]);
        assert_eq!(
            expr(&[0xd0, 0x6f, 0x0b])?,
            vec![Instruction::RefNull(ValueType::ExternRef)]
        );
        Ok(())
    }

    #[test]
    fn decode_float_const_verbatim() -> Result<()> {
        // a NaN with a payload survives untouched
        let code = expr(&[0x43, 0x01, 0x00, 0xc0, 0x7f, 0x0b])?;
        assert_eq!(code, vec![Instruction::F32Const(Ieee32(0x7fc0_0001))]);

        let code = expr(&[0x44, 0, 0, 0, 0, 0, 0, 0xf0, 0x3f, 0x0b])?;
        assert_eq!(code, vec![Instruction::F64Const(Ieee64(1.0f64.to_bits()))]);
        let Instruction::F64Const(value) = code[0] else {
            panic!("expected f64.const");
        };
        assert_eq!(value.value(), 1.0);
        Ok(())
    }

    #[test]
    fn nested_branch_keeps_relative_depth() -> Result<()> {
        // block { block { br 1 } }
        let code = expr(&[0x02, 0x40, 0x02, 0x40, 0x0c, 0x01, 0x0b, 0x0b, 0x0b])?;
        assert_eq!(
            code,
            vec![Instruction::Block(Block {
                label: 1,
                block_type: BlockType::Empty,
                body: vec![Instruction::Block(Block {
                    label: 2,
                    block_type: BlockType::Empty,
                    body: vec![Instruction::Br(1)],
                })],
            })]
        );
        Ok(())
    }

    #[test]
    fn decode_if_else() -> Result<()> {
        // if (result i32) i32.const 1 else i32.const 2 end
        let code = expr(&[0x04, 0x7f, 0x41, 0x01, 0x05, 0x41, 0x02, 0x0b, 0x0b])?;
        assert_eq!(
            code,
            vec![Instruction::If(IfElse {
                label: 1,
                block_type: BlockType::Value(ValueType::I32),
                then_body: vec![Instruction::I32Const(1)],
                else_body: Some(vec![Instruction::I32Const(2)]),
            })]
        );

        // if without else, typed by index
        let code = expr(&[0x04, 0x03, 0x01, 0x0b, 0x0b])?;
        assert_eq!(
            code,
            vec![Instruction::If(IfElse {
                label: 1,
                block_type: BlockType::TypeIndex(3),
                then_body: vec![Instruction::Nop],
                else_body: None,
            })]
        );
        Ok(())
    }

    #[test]
    fn sibling_blocks_get_sequential_labels() -> Result<()> {
        // loop { br 0 } block { br_table [0 1] 0 }
        let code = expr(&[
            0x03, 0x40, 0x0c, 0x00, 0x0b, 0x02, 0x40, 0x0e, 0x02, 0x00, 0x01, 0x00, 0x0b, 0x0b,
        ])?;
        assert_eq!(
            code,
            vec![
                Instruction::Loop(Block {
                    label: 1,
                    block_type: BlockType::Empty,
                    body: vec![Instruction::Br(0)],
                }),
                Instruction::Block(Block {
                    label: 2,
                    block_type: BlockType::Empty,
                    body: vec![Instruction::BrTable(vec![0, 1], 0)],
                }),
            ]
        );
        Ok(())
    }

    #[test]
    fn branch_past_outermost_label() {
        // block { br 2 }
        let err = expr(&[0x02, 0x40, 0x0c, 0x02, 0x0b, 0x0b]).unwrap_err();
        assert_eq!(kind(&err), Some(&Error::BranchDepthOutOfRange(2)));
    }

    #[test]
    fn else_outside_if() {
        let err = expr(&[0x02, 0x40, 0x05, 0x0b, 0x0b]).unwrap_err();
        assert_eq!(kind(&err), Some(&Error::UnexpectedElse));
        let err = expr(&[0x05]).unwrap_err();
        assert_eq!(kind(&err), Some(&Error::UnexpectedElse));
    }

    #[test]
    fn unknown_opcode() {
        let err = expr(&[0x41, 0x00, 0x06, 0x0b]).unwrap_err();
        assert_eq!(kind(&err), Some(&Error::UnknownOpcode(0x06)));
        let err = expr(&[0xfc, 0x12, 0x0b]).unwrap_err();
        assert_eq!(kind(&err), Some(&Error::UnknownMiscOpcode(0x12)));
    }

    fn nested_blocks(depth: usize) -> Vec<u8> {
        let mut bytes = vec![];
        for _ in 0..depth {
            bytes.extend_from_slice(&[0x02, 0x40]);
        }
        bytes.extend(std::iter::repeat(0x0b).take(depth + 1));
        bytes
    }

    #[test]
    fn nesting_limit() {
        let err = expr(&nested_blocks(MAX_NESTING)).unwrap_err();
        assert_eq!(kind(&err), Some(&Error::NestingTooDeep(MAX_NESTING)));
    }

    #[test]
    fn deepest_nesting_decodes() -> Result<()> {
        let depth = MAX_NESTING - 1;
        let code = expr(&nested_blocks(depth))?;
        let mut levels = 0;
        let mut current = &code;
        while let [Instruction::Block(block)] = current.as_slice() {
            levels += 1;
            assert_eq!(block.label, levels);
            current = &block.body;
        }
        assert!(current.is_empty());
        assert_eq!(levels as usize, depth);
        Ok(())
    }

    #[test]
    fn branch_from_deep_nesting() -> Result<()> {
        // 500 blocks; the innermost branches to the expression itself
        let mut bytes = vec![];
        for _ in 0..500 {
            bytes.extend_from_slice(&[0x02, 0x40]);
        }
        let br = bytes.len();
        bytes.extend_from_slice(&[0x0c, 0xf4, 0x03]); // br 500
        bytes.extend(std::iter::repeat(0x0b).take(501));
        assert!(expr(&bytes).is_ok());

        bytes[br + 1] = 0xf5; // br 501
        let err = expr(&bytes).unwrap_err();
        assert_eq!(kind(&err), Some(&Error::BranchDepthOutOfRange(501)));
        Ok(())
    }

    #[test]
    fn missing_end() {
        let err = expr(&[0x02, 0x40, 0x01, 0x0b]).unwrap_err();
        assert_eq!(kind(&err), Some(&Error::UnexpectedEnd));
    }

    #[test]
    fn decode_memory_and_misc() -> Result<()> {
        let code = expr(&[
            0x28, 0x02, 0x10, // i32.load align=2 offset=16
            0x3f, 0x00, // memory.size
            0xfc, 0x0a, 0x00, 0x00, // memory.copy
            0xfc, 0x08, 0x01, 0x00, // memory.init 1
            0xfc, 0x00, // i32.trunc_sat_f32_s
            0x11, 0x02, 0x00, // call_indirect type 2
            0x1c, 0x01, 0x7e, // select (result i64)
            0x0b,
        ])?;
        assert_eq!(
            code,
            vec![
                Instruction::I32Load(MemoryArg {
                    align: 2,
                    offset: 16
                }),
                Instruction::MemorySize(0),
                Instruction::MemoryCopy { dst: 0, src: 0 },
                Instruction::MemoryInit {
                    data_index: 1,
                    memory: 0
                },
                Instruction::I32TruncSatF32S,
                Instruction::CallIndirect {
                    type_index: 2,
                    table_index: 0
                },
                Instruction::SelectTyped(vec![ValueType::I64]),
            ]
        );
        Ok(())
    }

    #[test]
    fn decode_body_with_locals() -> Result<()> {
        // two params; locals: 2 x i32, 1 x f64; body: local.get 3 drop
        let bytes = [0x02, 0x02, 0x7f, 0x01, 0x7c, 0x20, 0x03, 0x1a, 0x0b];
        let mut reader = Reader::new(&bytes);
        let body = decode_function_body(&mut reader, 2)?;
        assert_eq!(
            body.locals,
            vec![
                Local {
                    index: 2,
                    value_type: ValueType::I32
                },
                Local {
                    index: 3,
                    value_type: ValueType::I32
                },
                Local {
                    index: 4,
                    value_type: ValueType::F64
                },
            ]
        );
        assert_eq!(body.code, vec![Instruction::LocalGet(3), Instruction::Drop]);
        Ok(())
    }

    #[test]
    fn too_many_locals() {
        // 0xffffffff locals of i32
        let bytes = [0x01, 0xff, 0xff, 0xff, 0xff, 0x0f, 0x7f, 0x0b];
        let mut reader = Reader::new(&bytes);
        let err = decode_function_body(&mut reader, 0).unwrap_err();
        assert_eq!(kind(&err), Some(&Error::TooManyLocals(u64::from(u32::MAX))));
    }

    #[test]
    fn body_at_header_is_repeatable() -> Result<()> {
        let bytes = [0xaa, 0xbb, 0x00, 0x41, 0x07, 0x0b];
        let header = CodeHeader {
            offset: 2,
            length: 4,
            type_index: Some(0),
        };
        let first = decode_function_body_at(&bytes, &header, 0)?;
        let second = decode_function_body_at(&bytes, &header, 0)?;
        assert_eq!(first, second);
        assert_eq!(first.code, vec![Instruction::I32Const(7)]);

        let header = CodeHeader { length: 5, ..header };
        let err = decode_function_body_at(&bytes, &header, 0).unwrap_err();
        assert_eq!(kind(&err), Some(&Error::UnexpectedEnd));
        Ok(())
    }

    #[test]
    fn body_with_trailing_bytes() {
        let bytes = [0x00, 0x0b, 0x01];
        let mut reader = Reader::new(&bytes);
        let err = decode_function_body(&mut reader, 0).unwrap_err();
        assert_eq!(kind(&err), Some(&Error::TrailingBytes(1)));
    }
}
