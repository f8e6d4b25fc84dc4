use super::custom::{
    decode_name_section, decode_producers_section, Diagnostic, NameSection, ProducerField,
};
use super::error::Error;
use super::expr::decode_function_body_at;
use super::reader::Reader;
use super::section::{self, Section, SectionID};
use super::types::*;
use anyhow::{bail, Context as _, Result};
use log::{debug, warn};
use num_traits::FromPrimitive as _;

const MAGIC: &[u8; 4] = b"\0asm";
const VERSION: u32 = 1;

// https://webassembly.github.io/spec/core/binary/modules.html#binary-module
#[derive(Debug, Default)]
pub struct Module<'a> {
    pub version: u32,
    pub custom_sections: Vec<Custom<'a>>,
    pub names: Option<NameSection>,
    pub producers: Option<Vec<ProducerField>>,
    pub type_section: Option<Vec<FuncType>>,
    pub import_section: Option<Vec<Import>>,
    pub function_section: Option<Vec<u32>>,
    pub table_section: Option<Vec<TableType>>,
    pub memory_section: Option<Vec<Limits>>,
    pub global_section: Option<Vec<Global>>,
    pub export_section: Option<Vec<Export>>,
    pub start_section: Option<u32>,
    pub element_section: Option<Vec<Element>>,
    pub code_section: Option<Vec<CodeHeader>>,
    pub data_section: Option<Vec<Data<'a>>>,
    pub data_count: Option<u32>,
    pub diagnostics: Vec<Diagnostic>,
    bytes: &'a [u8],
}

/// Walks the module preamble and the top-level section records.
pub struct Decoder<'a> {
    bytes: &'a [u8],
    reader: Reader<'a>,
}

impl<'a> Decoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            reader: Reader::new(bytes),
        }
    }

    pub fn decode_header(&mut self) -> Result<u32> {
        let magic = self.reader.array::<4>().map_err(|_| Error::BadMagic)?;
        if &magic != MAGIC {
            bail!(Error::BadMagic);
        }
        let version = u32::from_le_bytes(self.reader.array()?);
        if version != VERSION {
            bail!(Error::UnsupportedVersion(version));
        }
        Ok(version)
    }

    pub fn decode_section_header(&mut self) -> Result<(SectionID, usize)> {
        let byte = self.reader.byte()?;
        let id = SectionID::from_u8(byte).ok_or(Error::UnknownSectionId(byte))?;
        let size = self.reader.size()?;
        Ok((id, size))
    }

    pub fn decode(&mut self) -> Result<Module<'a>> {
        let version = self.decode_header()?;
        let mut module = Module {
            version,
            bytes: self.bytes,
            ..Module::default()
        };
        while !self.reader.is_end() {
            let start = self.reader.position();
            let (id, size) = self
                .decode_section_header()
                .with_context(|| format!("failed to read section header at offset {:#x}", start))?;
            let offset = self.reader.position();
            let payload = self.reader.slice(size).with_context(|| {
                format!("{:?} section at offset {:#x} overruns the module", id, start)
            })?;
            debug!("section {:?}: {} bytes at {:#x}", id, size, offset);

            let mut reader = Reader::with_base(payload, offset);
            let function_types = module.function_section.as_deref().unwrap_or_default();
            let result = section::decode(id, &mut reader, function_types);
            let section = result.with_context(|| {
                format!(
                    "failed to decode {:?} section at offset {:#x} (stopped at {:#x})",
                    id,
                    start,
                    reader.position()
                )
            })?;
            module.add_section(section)?;
        }
        module.check_data_count();
        for diagnostic in &module.diagnostics {
            warn!("{}", diagnostic);
        }
        Ok(module)
    }
}

impl<'a> Module<'a> {
    pub fn decode(bytes: &'a [u8]) -> Result<Self> {
        Decoder::new(bytes).decode()
    }

    fn add_section(&mut self, section: Section<'a>) -> Result<()> {
        match section {
            Section::Custom(custom) => {
                self.add_custom_section(&custom)?;
                self.custom_sections.push(custom);
            }
            Section::Type(types) => self.type_section = Some(types),
            Section::Import(imports) => self.import_section = Some(imports),
            Section::Function(functions) => self.function_section = Some(functions),
            Section::Table(tables) => self.table_section = Some(tables),
            Section::Memory(memories) => self.memory_section = Some(memories),
            Section::Global(globals) => self.global_section = Some(globals),
            Section::Export(exports) => self.export_section = Some(exports),
            Section::Start(index) => self.start_section = Some(index),
            Section::Element(elements) => self.element_section = Some(elements),
            Section::Code(headers) => self.code_section = Some(headers),
            Section::Data(data) => self.data_section = Some(data),
            Section::DataCount(count) => self.data_count = Some(count),
        }
        Ok(())
    }

    fn add_custom_section(&mut self, custom: &Custom<'a>) -> Result<()> {
        let mut reader = Reader::with_base(custom.data, custom.offset);
        match custom.name.as_str() {
            "name" => {
                let names = decode_name_section(&mut reader, &mut self.diagnostics)
                    .context("failed to decode name section")?;
                self.names = Some(names);
            }
            "producers" => {
                let producers = decode_producers_section(&mut reader)
                    .context("failed to decode producers section")?;
                self.producers = Some(producers);
            }
            _ => {}
        }
        Ok(())
    }

    fn check_data_count(&mut self) {
        let Some(declared) = self.data_count else {
            return;
        };
        let actual = self.data_section.as_ref().map_or(0, Vec::len);
        if declared as usize != actual {
            self.diagnostics
                .push(Diagnostic::DataCountMismatch { declared, actual });
        }
    }

    fn imported_functions(&self) -> impl Iterator<Item = u32> + '_ {
        self.import_section
            .iter()
            .flatten()
            .filter_map(|import| match import.desc {
                ImportDesc::Func(type_index) => Some(type_index),
                _ => None,
            })
    }

    pub fn imported_function_count(&self) -> u32 {
        self.imported_functions().count() as u32
    }

    pub fn func_type(&self, type_index: u32) -> Option<&FuncType> {
        self.type_section.as_ref()?.get(type_index as usize)
    }

    /// Signature of a function in the function index space: imported
    /// functions first, then those declared by the function section.
    pub fn function_type(&self, func_index: u32) -> Option<&FuncType> {
        let imported = self.imported_function_count() as usize;
        let type_index = match (func_index as usize).checked_sub(imported) {
            None => self.imported_functions().nth(func_index as usize)?,
            Some(defined) => *self.function_section.as_ref()?.get(defined)?,
        };
        self.func_type(type_index)
    }

    pub fn module_name(&self) -> Option<&str> {
        self.names.as_ref()?.module.as_deref()
    }

    pub fn function_name(&self, func_index: u32) -> Option<&str> {
        self.names.as_ref()?.functions.get(&func_index).map(String::as_str)
    }

    pub fn global_name(&self, global_index: u32) -> Option<&str> {
        self.names.as_ref()?.globals.get(&global_index).map(String::as_str)
    }

    pub fn data_name(&self, data_index: u32) -> Option<&str> {
        self.names.as_ref()?.data.get(&data_index).map(String::as_str)
    }

    pub fn local_name(&self, func_index: u32, local_index: u32) -> Option<&str> {
        self.names
            .as_ref()?
            .locals
            .get(&func_index)?
            .get(&local_index)
            .map(String::as_str)
    }

    pub fn code_headers(&self) -> &[CodeHeader] {
        self.code_section.as_deref().unwrap_or_default()
    }

    /// Decodes the body of the `code_index`-th entry of the code section.
    pub fn decode_function_body(&self, code_index: usize) -> Result<FunctionBody> {
        let header = self
            .code_headers()
            .get(code_index)
            .with_context(|| format!("no function body at code index {}", code_index))?;
        let param_count = header
            .type_index
            .and_then(|index| self.func_type(index))
            .map_or(0, |func_type| func_type.params.len() as u32);
        // header offsets count from the start of the module, preamble included
        decode_function_body_at(self.bytes, header, param_count)
    }

    pub fn decode_function_bodies(&self) -> Result<Vec<FunctionBody>> {
        (0..self.code_headers().len())
            .map(|index| self.decode_function_body(index))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::instruction::Instruction;
    use pretty_assertions::assert_eq;

    fn module_bytes(sections: &[(u8, &[u8])]) -> Vec<u8> {
        let mut bytes = b"\0asm\x01\0\0\0".to_vec();
        for (id, payload) in sections {
            bytes.push(*id);
            bytes.push(payload.len() as u8);
            bytes.extend_from_slice(payload);
        }
        bytes
    }

    #[test]
    fn decode_empty_module() -> Result<()> {
        let bytes = module_bytes(&[]);
        let module = Module::decode(&bytes)?;
        assert_eq!(module.version, 1);
        assert!(module.type_section.is_none());
        assert!(module.diagnostics.is_empty());
        Ok(())
    }

    #[test]
    fn decode_bad_preamble() {
        let err = Module::decode(b"\0asx\x01\0\0\0").unwrap_err();
        assert_eq!(err.downcast_ref::<Error>(), Some(&Error::BadMagic));
        let err = Module::decode(b"\0as").unwrap_err();
        assert_eq!(err.downcast_ref::<Error>(), Some(&Error::BadMagic));
        let err = Module::decode(b"\0asm\x02\0\0\0").unwrap_err();
        assert_eq!(err.downcast_ref::<Error>(), Some(&Error::UnsupportedVersion(2)));
    }

    #[test]
    fn decode_unknown_section_id() {
        let bytes = module_bytes(&[(0x0d, &[])]);
        let err = Module::decode(&bytes).unwrap_err();
        assert_eq!(err.downcast_ref::<Error>(), Some(&Error::UnknownSectionId(0x0d)));
    }

    #[test]
    fn section_errors_carry_offset() {
        // type section with a bad func type tag at offset 10
        let bytes = module_bytes(&[(0x01, &[0x01, 0x50])]);
        let err = Module::decode(&bytes).unwrap_err();
        assert_eq!(err.downcast_ref::<Error>(), Some(&Error::MalformedFuncType(0x50)));
        let message = format!("{:#}", err);
        assert!(message.contains("Type section at offset 0x8"), "{}", message);
    }

    #[test]
    fn lazy_function_bodies() -> Result<()> {
        let bytes = module_bytes(&[
            (0x01, &[0x01, 0x60, 0x01, 0x7f, 0x01, 0x7f]), // (i32) -> i32
            (0x03, &[0x01, 0x00]),
            (0x0a, &[0x01, 0x06, 0x01, 0x01, 0x7e, 0x20, 0x00, 0x0b]),
        ]);
        let module = Module::decode(&bytes)?;
        let headers = module.code_headers();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].type_index, Some(0));
        assert_eq!(&bytes[headers[0].offset..][..headers[0].length], &[0x01, 0x01, 0x7e, 0x20, 0x00, 0x0b]);

        let body = module.decode_function_body(0)?;
        assert_eq!(
            body.locals,
            vec![Local {
                index: 1,
                value_type: ValueType::I64
            }]
        );
        assert_eq!(body.code, vec![Instruction::LocalGet(0)]);
        assert_eq!(module.decode_function_bodies()?, vec![body]);
        assert!(module.decode_function_body(1).is_err());
        Ok(())
    }

    #[test]
    fn function_index_space_includes_imports() -> Result<()> {
        let bytes = module_bytes(&[
            (0x01, &[0x02, 0x60, 0x00, 0x00, 0x60, 0x01, 0x7d, 0x00]),
            (0x02, &[0x01, 0x01, b'm', 0x01, b'f', 0x00, 0x01]),
            (0x03, &[0x01, 0x00]),
        ]);
        let module = Module::decode(&bytes)?;
        assert_eq!(module.function_type(0).map(|t| t.params.clone()), Some(vec![ValueType::F32]));
        assert_eq!(module.function_type(1), Some(&FuncType::default()));
        assert_eq!(module.function_type(2), None);
        Ok(())
    }

    #[test]
    fn name_lookups() -> Result<()> {
        let mut custom = vec![0x04];
        custom.extend_from_slice(b"name");
        custom.extend_from_slice(&[
            0x00, 0x02, 0x01, b'm', // module "m"
            0x03, 0x01, 0x00, // unknown subsection 3
            0x01, 0x04, 0x01, 0x00, 0x01, b'f', // functions {0: f}
        ]);
        let bytes = module_bytes(&[(0x00, &custom)]);
        let module = Module::decode(&bytes)?;
        assert_eq!(module.module_name(), Some("m"));
        assert_eq!(module.function_name(0), Some("f"));
        assert_eq!(module.function_name(1), None);
        assert_eq!(module.local_name(0, 0), None);
        assert_eq!(module.custom_sections.len(), 1);
        assert_eq!(
            module.diagnostics,
            vec![Diagnostic::UnknownNameSubsection {
                id: 3,
                size: 1,
                offset: 21,
            }]
        );
        Ok(())
    }

    #[test]
    fn data_count_mismatch_is_reported() -> Result<()> {
        let bytes = module_bytes(&[(0x0c, &[0x02]), (0x0b, &[0x01, 0x01, 0x00])]);
        let module = Module::decode(&bytes)?;
        assert_eq!(module.data_section.as_ref().map(Vec::len), Some(1));
        assert_eq!(
            module.diagnostics,
            vec![Diagnostic::DataCountMismatch {
                declared: 2,
                actual: 1,
            }]
        );
        Ok(())
    }

    #[test]
    fn section_overrunning_module() {
        let mut bytes = module_bytes(&[(0x01, &[0x00])]);
        bytes[9] = 0x05;
        let err = Module::decode(&bytes).unwrap_err();
        assert_eq!(err.downcast_ref::<Error>(), Some(&Error::UnexpectedEnd));
    }
}
