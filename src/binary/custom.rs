//! Decoders for the `name` and `producers` custom sections.

use super::reader::Reader;
use anyhow::Result;
use log::trace;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;
use std::collections::BTreeMap;
use std::fmt;

pub type NameMap = BTreeMap<u32, String>;
pub type IndirectNameMap = BTreeMap<u32, NameMap>;

// https://webassembly.github.io/spec/core/appendix/custom.html#name-section
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
enum NameSubsectionID {
    Module = 0,
    Function = 1,
    Local = 2,
    Global = 7,
    Data = 9,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NameSection {
    pub module: Option<String>,
    pub functions: NameMap,
    pub locals: IndirectNameMap,
    pub globals: NameMap,
    pub data: NameMap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerField {
    pub name: String,
    pub values: Vec<ProducerValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerValue {
    pub name: String,
    pub version: String,
}

/// Something worth telling the caller about that did not stop the decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    UnknownNameSubsection { id: u8, size: usize, offset: usize },
    DataCountMismatch { declared: u32, actual: usize },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownNameSubsection { id, size, offset } => write!(
                f,
                "skipped unknown name subsection {} ({} bytes at {:#x})",
                id, size, offset
            ),
            Self::DataCountMismatch { declared, actual } => write!(
                f,
                "data count section declares {} segments, data section has {}",
                declared, actual
            ),
        }
    }
}

fn decode_name_map(reader: &mut Reader) -> Result<NameMap> {
    let entries = reader.vec(|reader| Ok((reader.u32()?, reader.name()?)))?;
    Ok(entries.into_iter().collect())
}

fn decode_indirect_name_map(reader: &mut Reader) -> Result<IndirectNameMap> {
    let entries = reader.vec(|reader| Ok((reader.u32()?, decode_name_map(reader)?)))?;
    Ok(entries.into_iter().collect())
}

/// Decodes the payload of a `name` custom section. Subsections this decoder
/// does not know are skipped by their size and reported to `diagnostics`.
pub fn decode_name_section(
    reader: &mut Reader,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<NameSection> {
    let mut names = NameSection::default();
    while !reader.is_end() {
        let id = reader.byte()?;
        let size = reader.size()?;
        let offset = reader.position();
        let payload = reader.slice(size)?;
        let Some(kind) = NameSubsectionID::from_u8(id) else {
            diagnostics.push(Diagnostic::UnknownNameSubsection { id, size, offset });
            continue;
        };
        trace!("name subsection {:?}: {} bytes", kind, size);

        let mut sub = Reader::with_base(payload, offset);
        match kind {
            NameSubsectionID::Module => names.module = Some(sub.name()?),
            NameSubsectionID::Function => names.functions = decode_name_map(&mut sub)?,
            NameSubsectionID::Local => names.locals = decode_indirect_name_map(&mut sub)?,
            NameSubsectionID::Global => names.globals = decode_name_map(&mut sub)?,
            NameSubsectionID::Data => names.data = decode_name_map(&mut sub)?,
        }
        sub.finish()?;
    }
    Ok(names)
}

// https://github.com/WebAssembly/tool-conventions/blob/main/ProducersSection.md
pub fn decode_producers_section(reader: &mut Reader) -> Result<Vec<ProducerField>> {
    let fields = reader.vec(|reader| {
        let name = reader.name()?;
        let values = reader.vec(|reader| {
            Ok(ProducerValue {
                name: reader.name()?,
                version: reader.name()?,
            })
        })?;
        Ok(ProducerField { name, values })
    })?;
    reader.finish()?;
    Ok(fields)
}
