//! NDJSON block codec, optionally gzip framed.
//!
//! # Format
//!
//! One JSON object per block, in input order, each followed by `\n`:
//! ```text
//! {"number":200,"id":"...","parentId":"...","parentNum":199,"timestamp":"...","payload":"..."}
//! {"number":201,"id":"...","parentId":"...","parentNum":200,"timestamp":"...","payload":"..."}
//! ```
//!
//! With [`NdjsonCompression::Gzip`] the same lines are wrapped in a single
//! gzip member written with a fixed mtime, so identical bundles produce
//! identical objects.

use std::io::{BufRead, BufReader, BufWriter, Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::{Compression, GzBuilder};
use serde::{Deserialize, Serialize};

use super::{BlockWriter, BlockWriterFactory, CodecError};
use crate::block::Block;

/// Outer framing of the NDJSON stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NdjsonCompression {
    None,
    #[default]
    Gzip,
}

impl NdjsonCompression {
    /// Conventional object suffix for this framing.
    pub fn suffix(self) -> &'static str {
        match self {
            NdjsonCompression::None => ".ndjson",
            NdjsonCompression::Gzip => ".ndjson.gz",
        }
    }
}

/// Factory for [`NdjsonBlockWriter`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct NdjsonWriterFactory {
    compression: NdjsonCompression,
}

impl NdjsonWriterFactory {
    pub fn new(compression: NdjsonCompression) -> Self {
        Self { compression }
    }
}

impl BlockWriterFactory for NdjsonWriterFactory {
    fn new_writer(&self, sink: Box<dyn Write + Send>) -> Result<Box<dyn BlockWriter>, CodecError> {
        let sink = BufWriter::new(sink);
        let out = match self.compression {
            NdjsonCompression::None => Framing::Plain(sink),
            NdjsonCompression::Gzip => Framing::Gzip(
                GzBuilder::new()
                    .mtime(0)
                    .operating_system(255)
                    .write(sink, Compression::default()),
            ),
        };
        Ok(Box::new(NdjsonBlockWriter {
            out,
            line: Vec::with_capacity(1024),
        }))
    }
}

type Sink = BufWriter<Box<dyn Write + Send>>;

enum Framing {
    Plain(Sink),
    Gzip(GzEncoder<Sink>),
}

/// Writes one JSON line per block.
pub struct NdjsonBlockWriter {
    out: Framing,
    line: Vec<u8>,
}

impl BlockWriter for NdjsonBlockWriter {
    fn write_block(&mut self, block: &Block) -> Result<(), CodecError> {
        self.line.clear();
        serde_json::to_writer(&mut self.line, block).map_err(|source| CodecError::Encode {
            number: block.number,
            source,
        })?;
        self.line.push(b'\n');

        match &mut self.out {
            Framing::Plain(w) => w.write_all(&self.line)?,
            Framing::Gzip(w) => w.write_all(&self.line)?,
        }
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<(), CodecError> {
        let mut sink = match self.out {
            Framing::Plain(w) => w,
            Framing::Gzip(w) => w.finish()?,
        };
        sink.flush()?;
        Ok(())
    }
}

/// Iterator over NDJSON blocks.
///
/// Parses lazily, one `Result<Block>` per non-empty line.
pub struct NdjsonBlocks<R: BufRead> {
    reader: R,
    line_buffer: String,
    line_number: usize,
}

impl<R: BufRead> NdjsonBlocks<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_buffer: String::new(),
            line_number: 0,
        }
    }
}

impl NdjsonBlocks<Box<dyn BufRead + Send>> {
    /// Stream blocks from `reader`, undoing `compression` first.
    pub fn open<R: Read + Send + 'static>(reader: R, compression: NdjsonCompression) -> Self {
        let reader: Box<dyn BufRead + Send> = match compression {
            NdjsonCompression::None => Box::new(BufReader::new(reader)),
            NdjsonCompression::Gzip => Box::new(BufReader::new(GzDecoder::new(reader))),
        };
        Self::new(reader)
    }
}

impl<R: BufRead> Iterator for NdjsonBlocks<R> {
    type Item = Result<Block, CodecError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.line_buffer.clear();

            match self.reader.read_line(&mut self.line_buffer) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line_number += 1;

                    let line = self.line_buffer.trim();
                    if line.is_empty() {
                        continue;
                    }

                    return Some(serde_json::from_str::<Block>(line).map_err(|source| {
                        CodecError::Json {
                            line: self.line_number,
                            source,
                        }
                    }));
                }
                Err(e) => return Some(Err(CodecError::Io(e))),
            }
        }
    }
}

/// Decode every block in `bytes`.
pub fn read_blocks(bytes: &[u8], compression: NdjsonCompression) -> Result<Vec<Block>, CodecError> {
    match compression {
        NdjsonCompression::None => NdjsonBlocks::new(BufReader::new(bytes)).collect(),
        NdjsonCompression::Gzip => NdjsonBlocks::new(BufReader::new(GzDecoder::new(bytes))).collect(),
    }
}
