
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::trace;

use crate::convert::dose::{accumulated_dose, MovieExposure};
use crate::mrc::{ImageDims, ImageProbe};
use crate::schema::{AcquisitionMetadata, Annotation, CtfMetadata, ImageInfo, MovieFrame, MovieStack, TiltSeriesMicrograph, TiltSeriesMicrographAlignment, Transformation};
use crate::star::DataBlock;


/// every per-movie column lives in the loop with this tag
pub const TAG_MOVIE: &str = "_rlnMicrographMovieName";
const TAG_TILT: &str = "_rlnTomoNominalStageTiltAngle";
const TAG_PRE_EXPOSURE: &str = "_rlnMicrographPreExposure";
const TAG_FRAME_COUNT: &str = "_rlnTomoTiltMovieFrameCount";


/// One tilt image, as recorded by the microscope: a stack of movie frames
#[derive(Debug, Clone, PartialEq)]
pub struct TiltMovie {
	pub stack_path: String,
	/// degrees
	pub tilt: f64,
	/// e-/A^2 before the movie started
	pub pre_exposure: f64,
	pub frame_count: u32,
	/// A/px
	pub pixel_size: f64,
	/// None if the stack file couldn't be read
	pub dims: Option<ImageDims>
}

impl TiltMovie {

	pub fn exposure(&self) -> MovieExposure {
		MovieExposure {
			pre_exposure: self.pre_exposure,
			frame_count: self.frame_count
		}
	}
}


/// Reads the movies of a tilt series, in table order.
/// Paths in the table are relative to the project folder.
pub fn read_movies(block: &DataBlock, pixel_size: f64, project_dir: &Path, probe: &dyn ImageProbe) -> Result<Vec<TiltMovie>> {

	let table = block.find_alongside(TAG_MOVIE, &[TAG_MOVIE, TAG_TILT, TAG_PRE_EXPOSURE, TAG_FRAME_COUNT])
		.context(format!("Tilt series {} is missing movie columns, need: {}, {}, {}, {}",
			block.name(), TAG_MOVIE, TAG_TILT, TAG_PRE_EXPOSURE, TAG_FRAME_COUNT))?;

	(0 .. table.len())
		.map(|i| {
			let stack_path = table.get_str(i, 0)?
				.to_string();
			let frame_count = table.get_u32(i, 3)?;
			if frame_count == 0 {
				bail!("Movie {} in tilt series {} has no frames", stack_path, block.name());
			}
			let dims = probe.dims(&project_dir.join(&stack_path));
			trace!("Movie {}: dims={:?}", stack_path, dims);
			Ok(TiltMovie {
				tilt: table.get_f64(i, 1)?,
				pre_exposure: table.get_f64(i, 2)?,
				frame_count,
				pixel_size,
				dims,
				stack_path
			})
		})
		.collect()
}


/// Stands in for the per-frame shifts until they're read from the motion correction output
fn motion_correction_placeholder() -> Transformation {
	Transformation::MotionCorrection {
		matrix: [[1.0, 0.0], [0.0, 1.0]],
		annotations: vec![Annotation::new("placeholder: motion correction shifts not read from the motion correction job")]
	}
}


/// Splits a movie into its frames.
/// CTF is estimated per tilt image, so every frame shares the movie's CTF.
pub fn frames(movie: &TiltMovie, dose_per_frame: f64, ctf: Option<CtfMetadata>) -> MovieStack {
	MovieStack {
		path: movie.stack_path.clone(),
		frames: (0 .. movie.frame_count)
			.map(|frame_i| MovieFrame {
				image: ImageInfo {
					path: movie.stack_path.clone(),
					section: Some(frame_i),
					width: movie.dims.map(|d| d.width),
					height: movie.dims.map(|d| d.height)
				},
				acquisition: AcquisitionMetadata {
					nominal_tilt_angle: movie.tilt,
					accumulated_dose: accumulated_dose(movie.pre_exposure, dose_per_frame, frame_i),
					ctf: ctf.clone()
				},
				motion_correction_transformations: vec![motion_correction_placeholder()]
			})
			.collect()
	}
}


/// Merges a movie into one projection image, carrying the state after its last frame
pub fn project(stack: &MovieStack, alignment: TiltSeriesMicrographAlignment) -> Option<TiltSeriesMicrograph> {
	let last = stack.frames.last()?;
	Some(TiltSeriesMicrograph {
		image: ImageInfo {
			section: None,
			.. last.image.clone()
		},
		acquisition: last.acquisition.clone(),
		refined_tilt_angle: None,
		alignment
	})
}


#[cfg(test)]
mod test {

	use galvanic_assert::{assert_that, matchers::*};

	use crate::star::StarFile;
	use super::*;


	struct NoProbe;

	impl ImageProbe for NoProbe {
		fn dims(&self, _path: &Path) -> Option<ImageDims> {
			None
		}
	}

	fn movie() -> TiltMovie {
		TiltMovie {
			stack_path: "my_stack.mrc".to_string(),
			tilt: 3.5,
			pre_exposure: 1.5,
			frame_count: 10,
			pixel_size: 0.675,
			dims: None
		}
	}

	#[test]
	fn read() {

		let star = StarFile::parse(r#"
data_TS_01
loop_
_rlnMicrographMovieName #1
_rlnTomoTiltMovieFrameCount #2
_rlnTomoNominalStageTiltAngle #3
_rlnTomoNominalTiltAxisAngle #4
_rlnMicrographPreExposure #5
frames/TS_01_000_0.0.mrc 8 0.001 85.0 0.0
frames/TS_01_001_3.0.mrc 10 3.001 85.0 3.0
"#).unwrap();

		let movies = read_movies(star.require_block("TS_01").unwrap(), 0.675, Path::new("."), &NoProbe)
			.unwrap();
		assert_that!(&movies, eq(vec![
			TiltMovie {
				stack_path: "frames/TS_01_000_0.0.mrc".to_string(),
				tilt: 0.001,
				pre_exposure: 0.0,
				frame_count: 8,
				pixel_size: 0.675,
				dims: None
			},
			TiltMovie {
				stack_path: "frames/TS_01_001_3.0.mrc".to_string(),
				tilt: 3.001,
				pre_exposure: 3.0,
				frame_count: 10,
				pixel_size: 0.675,
				dims: None
			}
		]));
	}

	#[test]
	fn read_missing_columns() {
		let star = StarFile::parse("data_TS_01\nloop_\n_rlnMicrographMovieName\na.mrc\n").unwrap();
		assert_that!(&read_movies(star.require_block("TS_01").unwrap(), 0.675, Path::new("."), &NoProbe).is_err(), eq(true));
	}

	#[test]
	fn read_non_finite() {
		let star = StarFile::parse(r#"
data_TS_01
loop_
_rlnMicrographMovieName
_rlnTomoTiltMovieFrameCount
_rlnTomoNominalStageTiltAngle
_rlnMicrographPreExposure
frames/a.mrc 8 0.0 0.0
frames/b.mrc 8 3.0 nan
"#).unwrap();
		let err = read_movies(star.require_block("TS_01").unwrap(), 0.675, Path::new("."), &NoProbe)
			.unwrap_err();
		assert_that!(&err.to_string().contains("not a finite number"), eq(true));
	}

	#[test]
	fn split_frames() {

		let stack = frames(&movie(), 1.0, None);
		assert_that!(&stack.path.as_str(), eq("my_stack.mrc"));
		assert_that!(&stack.frames.len(), eq(10));

		let doses = stack.frames.iter()
			.map(|f| f.acquisition.accumulated_dose)
			.collect::<Vec<_>>();
		assert_that!(&doses, eq(vec![2.5, 3.5, 4.5, 5.5, 6.5, 7.5, 8.5, 9.5, 10.5, 11.5]));

		for (i, frame) in stack.frames.iter().enumerate() {
			assert_that!(&frame.image.section, eq(Some(i as u32)));
			assert_that!(&frame.image.path.as_str(), eq("my_stack.mrc"));
			assert_that!(&frame.acquisition.nominal_tilt_angle, eq(3.5));
			assert_that!(&frame.acquisition.ctf, eq(None));
			assert_that!(&frame.motion_correction_transformations.len(), eq(1));
		}
	}

	#[test]
	fn merge() {

		let ctf = CtfMetadata {
			defocus_u: 1.0,
			defocus_v: 2.0,
			defocus_angle: 3.0,
			defocus_handedness: -1
		};
		let mut movie = movie();
		movie.dims = Some(ImageDims {
			width: 4096,
			height: 4096,
			depth: 10
		});
		let stack = frames(&movie, 1.0, Some(ctf.clone()));
		let alignment = TiltSeriesMicrographAlignment {
			z_rot: 85.0,
			.. TiltSeriesMicrographAlignment::default()
		};
		let micrograph = project(&stack, alignment.clone())
			.unwrap();

		assert_that!(&micrograph, eq(TiltSeriesMicrograph {
			image: ImageInfo {
				path: "my_stack.mrc".to_string(),
				section: None,
				width: Some(4096),
				height: Some(4096)
			},
			acquisition: AcquisitionMetadata {
				nominal_tilt_angle: 3.5,
				accumulated_dose: 11.5,
				ctf: Some(ctf)
			},
			refined_tilt_angle: None,
			alignment
		}));
	}
}
