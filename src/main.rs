use anyhow::{Context as _, Result};
use clap::Parser;
use log::{info, LevelFilter};
use std::fs;
use std::path::PathBuf;
use wasm_decode::Module;

/// Decode a WebAssembly binary and print its structure.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Path to a .wasm file
    file: PathBuf,

    /// Decode every function body and print its instructions
    #[arg(long)]
    bodies: bool,

    /// Print the contents of the name section
    #[arg(long)]
    names: bool,

    /// More logging (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let bytes = fs::read(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    info!("decoding {} ({} bytes)", args.file.display(), bytes.len());
    let module = Module::decode(&bytes)?;

    print_sections(&module);
    if args.names {
        print_names(&module);
    }
    if args.bodies {
        print_bodies(&module)?;
    }
    Ok(())
}

fn print_sections(module: &Module) {
    println!("version {}", module.version);
    for custom in &module.custom_sections {
        println!("custom {:?}: {} bytes", custom.name, custom.data.len());
    }
    for (index, func_type) in module.type_section.iter().flatten().enumerate() {
        println!(
            "type[{}]: {:?} -> {:?}",
            index, func_type.params, func_type.results
        );
    }
    for import in module.import_section.iter().flatten() {
        println!("import {}.{}: {:?}", import.module, import.field, import.desc);
    }
    for (index, table) in module.table_section.iter().flatten().enumerate() {
        println!("table[{}]: {:?}", index, table);
    }
    for (index, limits) in module.memory_section.iter().flatten().enumerate() {
        println!("memory[{}]: {:?}", index, limits);
    }
    for (index, global) in module.global_section.iter().flatten().enumerate() {
        let name = module.global_name(index as u32).unwrap_or_default();
        println!(
            "global[{}] {}: {:?} = {:?}",
            index, name, global.global_type, global.init_expr
        );
    }
    for export in module.export_section.iter().flatten() {
        println!("export {:?}: {:?}", export.name, export.desc);
    }
    if let Some(start) = module.start_section {
        println!("start: func[{}]", start);
    }
    for (index, element) in module.element_section.iter().flatten().enumerate() {
        println!(
            "elem[{}]: table {}, offset {:?}, {} entries",
            index,
            element.table_index,
            element.offset,
            element.init.len()
        );
    }
    let imported = module.imported_function_count();
    for (index, header) in module.code_headers().iter().enumerate() {
        let func_index = imported + index as u32;
        let name = module.function_name(func_index).unwrap_or_default();
        println!(
            "func[{}] {}: type {:?}, {} bytes at {:#x}",
            func_index, name, header.type_index, header.length, header.offset
        );
    }
    for (index, data) in module.data_section.iter().flatten().enumerate() {
        let name = module.data_name(index as u32).unwrap_or_default();
        println!(
            "data[{}] {}: memory {:?}, offset {:?}, {} bytes",
            index,
            name,
            data.memory_index,
            data.offset,
            data.init.len()
        );
    }
    for producer in module.producers.iter().flatten() {
        let values: Vec<_> = producer
            .values
            .iter()
            .map(|value| format!("{} {}", value.name, value.version))
            .collect();
        println!("producer {}: {}", producer.name, values.join(", "));
    }
}

fn print_names(module: &Module) {
    let Some(names) = &module.names else {
        println!("no name section");
        return;
    };
    if let Some(name) = &names.module {
        println!("module name: {}", name);
    }
    for (index, name) in &names.functions {
        println!("function name[{}]: {}", index, name);
        for (local, local_name) in names.locals.get(index).into_iter().flatten() {
            println!("  local[{}]: {}", local, local_name);
        }
    }
}

fn print_bodies(module: &Module) -> Result<()> {
    let imported = module.imported_function_count();
    for index in 0..module.code_headers().len() {
        let body = module.decode_function_body(index)?;
        let func_index = imported + index as u32;
        println!(
            "func[{}]: {} locals, {} instructions",
            func_index,
            body.locals.len(),
            body.code.len()
        );
        for local in &body.locals {
            let name = module
                .local_name(func_index, local.index)
                .unwrap_or_default();
            println!("  local[{}] {}: {:?}", local.index, name, local.value_type);
        }
        for inst in &body.code {
            println!("  {:?}", inst);
        }
    }
    Ok(())
}
