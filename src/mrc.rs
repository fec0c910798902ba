
// MRC file (from the Medical Research Council, in the UK)
// https://en.wikipedia.org/wiki/MRC_(file_format)

// format specification:
// https://www.ccpem.ac.uk/mrc_format/mrc2014.php

use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use byteorder::{ByteOrder, ReadBytesExt, WriteBytesExt, BE, LE};

use crate::logging::ResultExt;


const HEADER_BYTES: usize = 1024;

// byte offset of the machine stamp, word 54
const MACHST_OFFSET: usize = 4*(54 - 1);


/// The size fields of an MRC header, enough to describe an image or a stack of movie frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MrcHeader {
	pub nx: u32,
	pub ny: u32,
	pub nz: u32
}

impl MrcHeader {

	pub fn read(path: impl AsRef<Path>) -> Result<Self> {

		let path = path.as_ref();

		let mut file = File::open(path)
			.context(format!("Failed to open MRC file: {}", path.to_string_lossy()))?;
		let mut buf = [0u8; HEADER_BYTES];
		file.read_exact(&mut buf)
			.context(format!("MRC file too short for a header: {}", path.to_string_lossy()))?;

		// the machine stamp says which byte order the rest of the header uses (note 11)
		// but older writers sometimes left it zeroed, so assume little-endian then
		let header = match buf[MACHST_OFFSET] {
			0x11 => Self::decode::<BE>(&buf),
			_ => Self::decode::<LE>(&buf)
		};
		header.context(format!("Invalid MRC header: {}", path.to_string_lossy()))
	}

	fn decode<B:ByteOrder>(buf: &[u8]) -> Result<Self> {

		let mut cursor = Cursor::new(buf);
		let nx = cursor.read_i32::<B>()?;
		let ny = cursor.read_i32::<B>()?;
		let nz = cursor.read_i32::<B>()?;

		if nx < 0 || ny < 0 || nz < 0 {
			bail!("Negative dimensions: {}x{}x{}", nx, ny, nz);
		}

		Ok(Self {
			nx: nx as u32,
			ny: ny as u32,
			nz: nz as u32
		})
	}

	/// writes a header-only MRC file, with no voxel data
	pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {

		let path = path.as_ref();

		let mut file = File::create(path)
			.context(format!("Failed to open file for writing: {}", path.to_string_lossy()))?;
		let mut writer = BufWriter::new(&mut file);

		// the header is 256 (4-byte) words, or 1024 bytes total

		// write the dimensions (words 1-3)
		writer.write_u32::<LE>(self.nx)?;
		writer.write_u32::<LE>(self.ny)?;
		writer.write_u32::<LE>(self.nz)?;

		// use mode 0: 8 bit signed int
		writer.write_u32::<LE>(0)?;

		// we're at word 5 now: skip to word 54
		writer.write_all(&[0u8; 4*(54 - 5)])?;

		// write the machine stamp: signal little-endianess (note 11)
		writer.write_all(&[0x44, 0x44, 0x00, 0x00])?;

		// we're at word 55 now: skip to the end of the header (word 257)
		writer.write_all(&[0u8; 4*(257 - 55)])?;

		// write buffers should be flushed before dropping
		writer.flush()?;

		Ok(())
	}
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDims {
	pub width: u32,
	pub height: u32,
	pub depth: u32
}

impl From<MrcHeader> for ImageDims {

	fn from(header: MrcHeader) -> Self {
		Self {
			width: header.nx,
			height: header.ny,
			depth: header.nz
		}
	}
}


/// Looks up the dimensions of an image file.
/// Images that don't exist or can't be read have no dimensions, that's not an error.
pub trait ImageProbe {
	fn dims(&self, path: &Path) -> Option<ImageDims>;
}


/// Reads dimensions from MRC headers on the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct MrcProbe;

impl ImageProbe for MrcProbe {

	fn dims(&self, path: &Path) -> Option<ImageDims> {
		MrcHeader::read(path)
			.map(ImageDims::from)
			.best_effort("Image dimensions")
	}
}
