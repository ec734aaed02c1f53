//! Text rendering of archive entries and resource tables.

use std::io::Write;

use anyhow::Result;
use redarc_formats::ArchiveFile;
use redarc_formats::ResourceChunk;

use crate::config::DumpOptions;

/// One line describing an archive entry.
pub fn write_entry_summary(out: &mut impl Write, file: &ArchiveFile) -> Result<()> {
    writeln!(
        out,
        "{:>6} {:016X} {:>10} bytes {} {} deps sha1={}",
        file.index,
        file.id(),
        file.data.len(),
        if file.compressed { "packed" } else { "raw   " },
        file.dependencies.len(),
        hex::encode(file.entry.hash)
    )?;
    Ok(())
}

/// Print the tables selected in `options`.
pub fn write_chunk(out: &mut impl Write, chunk: &ResourceChunk<'_>, options: &DumpOptions) -> Result<()> {
    if options.names {
        write_names(out, chunk)?;
    }
    if options.imports {
        write_imports(out, chunk)?;
    }
    if options.properties {
        write_properties(out, chunk)?;
    }
    if options.exports {
        write_exports(out, chunk)?;
    }
    if options.buffers {
        write_buffers(out, chunk)?;
    }
    if options.embedded {
        write_embedded(out, chunk)?;
    }
    Ok(())
}

pub fn write_names(out: &mut impl Write, chunk: &ResourceChunk<'_>) -> Result<()> {
    writeln!(out, "names ({})", chunk.names().len())?;
    for (index, name) in chunk.names().iter().enumerate() {
        let name = name?;
        writeln!(
            out,
            "  [{index}] {} hash={:08X}",
            chunk.name_text(&name)?,
            name.hash
        )?;
    }
    Ok(())
}

/// Imports with zero flags are not printed.
pub fn write_imports(out: &mut impl Write, chunk: &ResourceChunk<'_>) -> Result<()> {
    writeln!(out, "imports ({})", chunk.imports().len())?;
    for (index, import) in chunk.imports().iter().enumerate() {
        let import = import?;
        if import.flags == 0 {
            continue;
        }
        writeln!(
            out,
            "  [{index}] {} {} flags={:04X}",
            chunk.import_class_name(&import)?,
            chunk.import_depot_path(&import)?,
            import.flags
        )?;
    }
    Ok(())
}

pub fn write_properties(out: &mut impl Write, chunk: &ResourceChunk<'_>) -> Result<()> {
    writeln!(out, "properties ({})", chunk.properties().len())?;
    for (index, property) in chunk.properties().iter().enumerate() {
        let property = property?;
        writeln!(
            out,
            "  [{index}] {}.{} hash={:016X}",
            chunk.property_class_name(&property)?,
            chunk.property_name(&property)?,
            property.hash
        )?;
    }
    Ok(())
}

/// Exports with their payload range, parent and children.
pub fn write_exports(out: &mut impl Write, chunk: &ResourceChunk<'_>) -> Result<()> {
    let graph = chunk.export_graph()?;
    writeln!(out, "exports ({})", chunk.exports().len())?;
    for (index, export) in chunk.exports().iter().enumerate() {
        let export = export?;
        writeln!(
            out,
            "  {} data={:#x}+{}",
            chunk.export_display_name(index)?,
            export.data_offset,
            export.data_size
        )?;
        if let Some(parent) = graph.parent(index)? {
            writeln!(out, "    parent {}", chunk.export_display_name(parent)?)?;
        }
        for &child in graph.children(index)? {
            writeln!(out, "    child {}", chunk.export_display_name(child)?)?;
        }
    }
    Ok(())
}

pub fn write_buffers(out: &mut impl Write, chunk: &ResourceChunk<'_>) -> Result<()> {
    writeln!(out, "buffers ({})", chunk.buffers().len())?;
    for buffer in chunk.buffers() {
        let buffer = buffer?;
        writeln!(
            out,
            "  [{}] offset={:#x} disk={} mem={} flags={:08X}",
            buffer.index, buffer.offset, buffer.disk_size, buffer.mem_size, buffer.flags
        )?;
    }
    Ok(())
}

/// Embedded records; the import link is shown but is not reliable.
pub fn write_embedded(out: &mut impl Write, chunk: &ResourceChunk<'_>) -> Result<()> {
    writeln!(out, "embedded ({})", chunk.embedded().len())?;
    for (index, embedded) in chunk.embedded().iter().enumerate() {
        let embedded = embedded?;
        let import = match chunk.embedded_import(&embedded)? {
            Some(import) => chunk.import_depot_path(&import)?.into_owned(),
            None => "-".to_string(),
        };
        writeln!(
            out,
            "  [{index}] {} import={import} (provisional) data={:#x}+{}",
            chunk.embedded_path(&embedded)?,
            embedded.data_offset,
            embedded.data_size
        )?;
    }
    Ok(())
}
