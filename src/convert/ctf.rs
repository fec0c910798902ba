
use anyhow::{bail, Context, Result};

use crate::convert::movies::TAG_MOVIE;
use crate::schema::{CtfMetadata, RELION_DEFOCUS_HANDEDNESS};
use crate::star::{DataBlock, Table};


pub const TAG_DEFOCUS_U: &str = "_rlnDefocusU";
pub const TAG_DEFOCUS_V: &str = "_rlnDefocusV";
pub const TAG_DEFOCUS_ANGLE: &str = "_rlnDefocusAngle";


/// Reads per-tilt CTF estimates out of a tilt series table.
/// Tables written before CTF estimation ran don't have any, and that's fine.
pub struct CtfExtractor {
	table: Option<Table>
}

impl CtfExtractor {

	pub fn new(block: &DataBlock) -> Result<Self> {

		// no defocus at all means no CTF estimation yet,
		// but a defocus without the rest of the estimate means a broken table
		let table =
			if block.find_alongside(TAG_MOVIE, &[TAG_DEFOCUS_U]).is_some() {
				let table = block.find_alongside(TAG_MOVIE, &[TAG_DEFOCUS_U, TAG_DEFOCUS_V, TAG_DEFOCUS_ANGLE])
					.context(format!("Tilt series {} has {} but not {} and {}", block.name(), TAG_DEFOCUS_U, TAG_DEFOCUS_V, TAG_DEFOCUS_ANGLE))?;
				Some(table)
			} else if block.has_tag(TAG_DEFOCUS_U) {
				bail!("Tilt series {} has {} outside of the movie loop", block.name(), TAG_DEFOCUS_U);
			} else {
				None
			};

		Ok(Self {
			table
		})
	}

	pub fn has_ctf(&self) -> bool {
		self.table.is_some()
	}

	/// `index` is the row of the movie in the tilt series table
	pub fn get(&self, index: usize) -> Result<Option<CtfMetadata>> {

		let Some(table) = &self.table
			else { return Ok(None); };

		Ok(Some(CtfMetadata {
			defocus_u: table.get_f64(index, 0)?,
			defocus_v: table.get_f64(index, 1)?,
			defocus_angle: table.get_f64(index, 2)?,
			defocus_handedness: RELION_DEFOCUS_HANDEDNESS
		}))
	}
}
