
use anyhow::{bail, Result};

use crate::convert::movies::TAG_MOVIE;
use crate::schema::TiltSeriesMicrographAlignment;
use crate::star::{DataBlock, Table};


const TAGS: [&str; 5] = [
	"_rlnTomoXShiftAngst",
	"_rlnTomoYShiftAngst",
	"_rlnTomoXTilt",
	"_rlnTomoYTilt",
	"_rlnTomoZRot"
];


/// Reads the tilt series alignment of each tilt image.
/// Before alignment has run, every tilt image gets the identity alignment.
pub struct AlignmentExtractor {
	table: Option<Table>
}

impl AlignmentExtractor {

	pub fn new(block: &DataBlock) -> Result<Self> {

		let table = block.find_alongside(TAG_MOVIE, &TAGS);
		if table.is_none() && block.find(&TAGS).is_some() {
			bail!("Tilt series {} has alignment columns outside of the movie loop", block.name());
		}

		Ok(Self {
			table
		})
	}

	pub fn is_aligned(&self) -> bool {
		self.table.is_some()
	}

	/// `index` is the row of the movie in the tilt series table,
	/// `pixel_size` in A/px converts the shifts from A into pixels
	pub fn get(&self, index: usize, pixel_size: f64) -> Result<TiltSeriesMicrographAlignment> {

		let Some(table) = &self.table
			else { return Ok(TiltSeriesMicrographAlignment::default()); };

		if !(pixel_size > 0.0) {
			bail!("Pixel size must be positive to convert shifts, not {}", pixel_size);
		}

		Ok(TiltSeriesMicrographAlignment {
			x_shift: table.get_f64(index, 0)?/pixel_size,
			y_shift: table.get_f64(index, 1)?/pixel_size,
			x_tilt: table.get_f64(index, 2)?,
			y_tilt: table.get_f64(index, 3)?,
			z_rot: table.get_f64(index, 4)?
		})
	}
}


#[cfg(test)]
mod test {

	use galvanic_assert::{assert_that, matchers::*};

	use crate::star::StarFile;
	use super::*;


	#[test]
	fn aligned() {

		let star = StarFile::parse(r#"
data_TS_01
loop_
_rlnMicrographMovieName
_rlnTomoXTilt
_rlnTomoYTilt
_rlnTomoZRot
_rlnTomoXShiftAngst
_rlnTomoYShiftAngst
frames/a.mrc 0.0 0.5 85.0 34.84 -13.5
"#).unwrap();

		let alignment = AlignmentExtractor::new(star.require_block("TS_01").unwrap())
			.unwrap();
		assert_that!(&alignment.is_aligned(), eq(true));

		let a = alignment.get(0, 0.675).unwrap();
		assert_that!(&a.x_shift, close_to(51.6148, 1e-4));
		assert_that!(&a.y_shift, close_to(-20.0, 1e-9));
		assert_that!(&a.x_tilt, eq(0.0));
		assert_that!(&a.y_tilt, eq(0.5));
		assert_that!(&a.z_rot, eq(85.0));

		assert_that!(&alignment.get(0, 0.0).is_err(), eq(true));
		assert_that!(&alignment.get(1, 0.675).is_err(), eq(true));
	}

	#[test]
	fn not_aligned() {

		let star = StarFile::parse(r#"
data_TS_01
loop_
_rlnMicrographMovieName
_rlnTomoXShiftAngst
frames/a.mrc 34.84
"#).unwrap();

		let alignment = AlignmentExtractor::new(star.require_block("TS_01").unwrap())
			.unwrap();
		assert_that!(&alignment.is_aligned(), eq(false));
		assert_that!(&alignment.get(0, 0.675).unwrap(), eq(TiltSeriesMicrographAlignment::default()));
	}

	#[test]
	fn separate_loop() {

		let star = StarFile::parse(r#"
data_TS_01
loop_
_rlnMicrographMovieName
frames/a.mrc
loop_
_rlnTomoXShiftAngst
_rlnTomoYShiftAngst
_rlnTomoXTilt
_rlnTomoYTilt
_rlnTomoZRot
1.0 2.0 0.0 0.0 85.0
"#).unwrap();

		assert_that!(&AlignmentExtractor::new(star.require_block("TS_01").unwrap()).is_err(), eq(true));
	}
}
