use bincode::{deserialize_from, serialize_into};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;

use crate::graph::TourGraph;

fn write_draft<W: Write>(graph: &TourGraph, sink: W) -> std::io::Result<()> {
    let encoder = GzEncoder::new(sink, Compression::default());
    let mut writer = BufWriter::new(encoder);

    serialize_into(&mut writer, graph)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    let encoder = writer.into_inner().map_err(|e| e.into_error())?;
    encoder.finish()?;
    Ok(())
}

fn read_draft<R: Read>(source: R) -> std::io::Result<TourGraph> {
    let decoder = GzDecoder::new(source);
    let mut reader = BufReader::new(decoder);

    let graph: TourGraph = deserialize_from(&mut reader)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    // Drafts are files on disk and may be stale or edited by hand.
    let (graph, dropped) = graph.revalidate();
    for message in &dropped {
        log::warn!("Draft load skipped {}", message);
    }
    Ok(graph)
}

/// Save an unfinished tour as a gzip-compressed bincode draft.
pub fn save_draft(graph: &TourGraph, path: impl AsRef<Path>) -> std::io::Result<()> {
    write_draft(graph, File::create(path)?)
}

pub fn load_draft(path: impl AsRef<Path>) -> std::io::Result<TourGraph> {
    read_draft(File::open(path)?)
}

pub fn draft_to_bytes(graph: &TourGraph) -> std::io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_draft(graph, &mut buffer)?;
    Ok(buffer)
}

pub fn draft_from_bytes(bytes: &[u8]) -> std::io::Result<TourGraph> {
    read_draft(Cursor::new(bytes))
}
