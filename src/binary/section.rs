use super::error::Error;
use super::expr::decode_expr;
use super::instruction::Instruction;
use super::reader::Reader;
use super::types::*;
use anyhow::{bail, Result};
use log::trace;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum SectionID {
    Custom = 0x00,
    Type = 0x01,
    Import = 0x02,
    Function = 0x03,
    Table = 0x04,
    Memory = 0x05,
    Global = 0x06,
    Export = 0x07,
    Start = 0x08,
    Element = 0x09,
    Code = 0x0a,
    Data = 0x0b,
    DataCount = 0x0c,
}

// https://webassembly.github.io/spec/core/binary/modules.html#sections
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Section<'a> {
    Custom(Custom<'a>),
    Type(Vec<FuncType>),
    Import(Vec<Import>),
    Function(Vec<u32>),
    Table(Vec<TableType>),
    Memory(Vec<Limits>),
    Global(Vec<Global>),
    Export(Vec<Export>),
    Start(u32),
    Element(Vec<Element>),
    Code(Vec<CodeHeader>),
    Data(Vec<Data<'a>>),
    DataCount(u32),
}

/// Decodes one section payload. The reader must be bounded to exactly the
/// payload; anything left over is an error. `function_types` is the function
/// section decoded so far, used to label code headers.
pub fn decode<'a>(
    id: SectionID,
    reader: &mut Reader<'a>,
    function_types: &[u32],
) -> Result<Section<'a>> {
    let section = match id {
        SectionID::Custom => Section::Custom(decode_custom_section(reader)?),
        SectionID::Type => Section::Type(decode_type_section(reader)?),
        SectionID::Import => Section::Import(decode_import_section(reader)?),
        SectionID::Function => Section::Function(decode_function_section(reader)?),
        SectionID::Table => Section::Table(decode_table_section(reader)?),
        SectionID::Memory => Section::Memory(decode_memory_section(reader)?),
        SectionID::Global => Section::Global(decode_global_section(reader)?),
        SectionID::Export => Section::Export(decode_export_section(reader)?),
        SectionID::Start => Section::Start(reader.u32()?),
        SectionID::Element => Section::Element(decode_element_section(reader)?),
        SectionID::Code => Section::Code(decode_code_section(reader, function_types)?),
        SectionID::Data => Section::Data(decode_data_section(reader)?),
        SectionID::DataCount => Section::DataCount(reader.u32()?),
    };
    reader.finish()?;
    Ok(section)
}

pub fn decode_value_type(reader: &mut Reader) -> Result<ValueType> {
    let byte = reader.byte()?;
    let value_type = ValueType::from_u8(byte).ok_or(Error::UnknownValueType(byte))?;
    Ok(value_type)
}

pub fn decode_ref_type(reader: &mut Reader) -> Result<ValueType> {
    let byte = reader.byte()?;
    match ValueType::from_u8(byte) {
        Some(value_type) if value_type.is_ref() => Ok(value_type),
        _ => bail!(Error::InvalidRefType(byte)),
    }
}

// https://webassembly.github.io/spec/core/binary/types.html#function-types
pub fn decode_func_type(reader: &mut Reader) -> Result<FuncType> {
    let tag = reader.byte()?;
    if tag != 0x60 {
        bail!(Error::MalformedFuncType(tag));
    }
    let params = reader.vec(decode_value_type)?;
    let results = reader.vec(decode_value_type)?;
    Ok(FuncType { params, results })
}

pub fn decode_limits(reader: &mut Reader) -> Result<Limits> {
    let flag = reader.byte()?;
    let min = reader.u32()?;
    let max = match flag {
        0x00 => None,
        0x01 => Some(reader.u32()?),
        _ => bail!(Error::InvalidLimitsFlag(flag)),
    };
    Ok(Limits { min, max })
}

pub fn decode_table_type(reader: &mut Reader) -> Result<TableType> {
    let elem_type = decode_ref_type(reader)?;
    let limits = decode_limits(reader)?;
    Ok(TableType { elem_type, limits })
}

pub fn decode_global_type(reader: &mut Reader) -> Result<GlobalType> {
    let value_type = decode_value_type(reader)?;
    let flag = reader.byte()?;
    let mutability = Mutability::from_u8(flag).ok_or(Error::InvalidMutability(flag))?;
    Ok(GlobalType {
        value_type,
        mutability,
    })
}

fn decode_import_desc(reader: &mut Reader) -> Result<ImportDesc> {
    let tag = reader.byte()?;
    let desc = match tag {
        0x00 => ImportDesc::Func(reader.u32()?),
        0x01 => ImportDesc::Table(decode_table_type(reader)?),
        0x02 => ImportDesc::Memory(decode_limits(reader)?),
        0x03 => ImportDesc::Global(decode_global_type(reader)?),
        // 0x04 (tags) is not supported
        _ => bail!(Error::UnhandledImportDesc(tag)),
    };
    Ok(desc)
}

const EXPORT_DESCS: [fn(u32) -> ExportDesc; 5] = [
    ExportDesc::Func,
    ExportDesc::Table,
    ExportDesc::Memory,
    ExportDesc::Global,
    ExportDesc::Tag,
];

fn decode_export_desc(reader: &mut Reader) -> Result<ExportDesc> {
    let tag = reader.byte()?;
    let desc = EXPORT_DESCS
        .get(tag as usize)
        .ok_or(Error::UnhandledExportDesc(tag))?;
    Ok(desc(reader.u32()?))
}

/// Reads the custom section's name. The remaining bytes are returned as-is.
pub fn decode_custom_section<'a>(reader: &mut Reader<'a>) -> Result<Custom<'a>> {
    let name = reader.name()?;
    let offset = reader.position();
    let data = reader.rest();
    trace!("custom section {:?}: {} bytes", name, data.len());
    Ok(Custom { name, data, offset })
}

pub fn decode_type_section(reader: &mut Reader) -> Result<Vec<FuncType>> {
    reader.vec(decode_func_type)
}

pub fn decode_import_section(reader: &mut Reader) -> Result<Vec<Import>> {
    reader.vec(|reader| {
        let module = reader.name()?;
        let field = reader.name()?;
        let desc = decode_import_desc(reader)?;
        trace!("import {}.{}: {:?}", module, field, desc);
        Ok(Import {
            module,
            field,
            desc,
        })
    })
}

pub fn decode_function_section(reader: &mut Reader) -> Result<Vec<u32>> {
    reader.vec(|reader| reader.u32())
}

pub fn decode_table_section(reader: &mut Reader) -> Result<Vec<TableType>> {
    reader.vec(decode_table_type)
}

pub fn decode_memory_section(reader: &mut Reader) -> Result<Vec<Limits>> {
    reader.vec(decode_limits)
}

pub fn decode_global_section(reader: &mut Reader) -> Result<Vec<Global>> {
    reader.vec(|reader| {
        let global_type = decode_global_type(reader)?;
        let init_expr = decode_expr(reader)?;
        Ok(Global {
            global_type,
            init_expr,
        })
    })
}

pub fn decode_export_section(reader: &mut Reader) -> Result<Vec<Export>> {
    reader.vec(|reader| {
        let name = reader.name()?;
        let desc = decode_export_desc(reader)?;
        trace!("export {}: {:?}", name, desc);
        Ok(Export { name, desc })
    })
}

/// Only bit 2 of the flags is understood: clear means a vector of function
/// indices, set means a vector of initializer expressions. Every segment is
/// active on table 0; the passive and declarative forms are rejected.
pub fn decode_element_section(reader: &mut Reader) -> Result<Vec<Element>> {
    reader.vec(|reader| {
        let flags = reader.byte()?;
        if flags & !0b100 != 0 {
            bail!(Error::UnhandledElementFlags(flags));
        }
        let offset = decode_expr(reader)?;
        let init = if flags & 0b100 == 0 {
            reader.vec(|reader| Ok(vec![Instruction::RefFunc(reader.u32()?)]))?
        } else {
            reader.vec(decode_expr)?
        };
        Ok(Element {
            elem_type: ValueType::FuncRef,
            table_index: 0,
            offset,
            init,
        })
    })
}

/// Locates each function body without decoding it.
pub fn decode_code_section(reader: &mut Reader, function_types: &[u32]) -> Result<Vec<CodeHeader>> {
    let mut index = 0;
    reader.vec(|reader| {
        let length = reader.size()?;
        let offset = reader.position();
        reader.skip(length)?;
        let header = CodeHeader {
            offset,
            length,
            type_index: function_types.get(index).copied(),
        };
        index += 1;
        Ok(header)
    })
}

pub fn decode_data_section<'a>(reader: &mut Reader<'a>) -> Result<Vec<Data<'a>>> {
    reader.vec(|reader| {
        let flags = reader.byte()?;
        let (memory_index, offset) = match flags {
            0x00 => (Some(0), Some(decode_expr(reader)?)),
            0x01 => (None, None),
            _ => bail!(Error::UnhandledDataFlags(flags)),
        };
        let size = reader.size()?;
        let init = reader.slice(size)?;
        Ok(Data {
            memory_index,
            offset,
            init,
        })
    })
}
