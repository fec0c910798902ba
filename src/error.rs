
use std::path::PathBuf;

use thiserror::Error;


/// Fatal conversion errors.
///
/// Everything else that can go wrong during a conversion is either an I/O or parse failure
/// (reported as a plain `anyhow::Error` with context), or a best-effort lookup that quietly
/// degrades to a missing value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {

	/// the caller asked for tilt series the group file doesn't list
	#[error("Tilt series {} not found in tilt series group starfile", .0.join(", "))]
	MissingTiltSeries(Vec<String>),

	#[error("Output should be a prefix or dir name, not a file name: {}", .0.to_string_lossy())]
	OutputPathHasSuffix(PathBuf),

	#[error("Tilt series {0} has no movies")]
	EmptyTiltSeries(String),

	/// dose rates come from differences between successive movies, so one movie isn't enough
	#[error("Tilt series {0} has only one movie, can't reconstruct the dose per frame")]
	SingleMovieTiltSeries(String)
}
