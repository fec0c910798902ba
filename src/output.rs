
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tracing::info;

use crate::convert::Conversion;
use crate::error::ConvertError;
use crate::json::ToJson;


const MOVIE_COLLECTION_SUFFIX: &str = "movie_collection";
const TILT_SERIES_SUFFIX: &str = "tilt_series";
const DATASET_NAME: &str = "dataset";


/// Where the JSON documents go: into a folder, or next to a file name prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
	Dir(PathBuf),
	Prefix(PathBuf)
}

impl OutputTarget {

	/// A trailing `/` or an existing folder means a folder, anything else is a prefix.
	/// Prefixes that look like file names (eg `out.json`) are rejected.
	pub fn parse(output: impl AsRef<str>) -> Result<Self> {

		let output = output.as_ref();
		if output.is_empty() {
			bail!("Output path is empty");
		}

		let path = PathBuf::from(output);
		if output.ends_with('/') || path.is_dir() {
			return Ok(Self::Dir(path));
		}

		if path.extension().is_some() {
			bail!(ConvertError::OutputPathHasSuffix(path));
		}

		Ok(Self::Prefix(path))
	}

	/// Makes the folders the documents will be written into
	pub fn prepare(&self) -> Result<()> {

		let dir = match self {
			Self::Dir(dir) => Some(dir.as_path()),
			Self::Prefix(prefix) => prefix.parent()
				.filter(|parent| !parent.as_os_str().is_empty())
		};

		if let Some(dir) = dir {
			fs::create_dir_all(dir)
				.context(format!("Failed to create output folder: {}", dir.to_string_lossy()))?;
		}

		Ok(())
	}

	fn path(&self, name: &str) -> PathBuf {
		match self {
			Self::Dir(dir) => dir.join(format!("{}.json", name)),
			Self::Prefix(prefix) => {
				let mut path = OsString::from(prefix.as_os_str());
				path.push(format!("_{}.json", name));
				PathBuf::from(path)
			}
		}
	}

	pub fn movie_collection_path(&self, ts_name: &str) -> PathBuf {
		self.path(&format!("{}_{}", ts_name, MOVIE_COLLECTION_SUFFIX))
	}

	pub fn tilt_series_path(&self, ts_name: &str) -> PathBuf {
		self.path(&format!("{}_{}", ts_name, TILT_SERIES_SUFFIX))
	}

	pub fn dataset_path(&self) -> PathBuf {
		self.path(DATASET_NAME)
	}
}


/// Writes the two documents of every converted tilt series,
/// and the dataset document if it has a name.
/// Returns the paths of the written files.
pub fn write(target: &OutputTarget, conversion: &Conversion, dataset: Option<&str>) -> Result<Vec<PathBuf>> {

	target.prepare()?;

	let mut paths = Vec::new();
	for (ts_name, collection) in &conversion.movie_collections {
		let path = target.movie_collection_path(ts_name);
		write_json(&path, collection.to_json())?;
		paths.push(path);
	}
	for (ts_name, tilt_series) in &conversion.tilt_series {
		let path = target.tilt_series_path(ts_name);
		write_json(&path, tilt_series.to_json())?;
		paths.push(path);
	}

	if let Some(name) = dataset {
		let path = target.dataset_path();
		write_json(&path, conversion.dataset(name).to_json())?;
		paths.push(path);
	}

	info!("Wrote {} files", paths.len());

	Ok(paths)
}


fn write_json(path: &Path, json: Value) -> Result<()> {
	let text = serde_json::to_string_pretty(&json)
		.context(format!("Failed to serialize: {}", path.to_string_lossy()))?;
	fs::write(path, text)
		.context(format!("Failed to write file: {}", path.to_string_lossy()))
}


/// One line per tilt series, for when nothing gets written
pub fn summary(conversion: &Conversion) -> Vec<String> {
	conversion.tilt_series.iter()
		.map(|(ts_name, tilt_series)| {
			let frames = conversion.movie_collections.get(ts_name)
				.map(|collection| collection.movie_stack_sets.iter()
					.flat_map(|set| &set.movie_stacks)
					.map(|stack| stack.frames.len())
					.sum::<usize>()
				)
				.unwrap_or(0);
			let ctf = tilt_series.micrographs.iter()
				.any(|micrograph| micrograph.acquisition.ctf.is_some());
			format!("{}: {} tilts, {} frames, ctf={}", ts_name, tilt_series.micrographs.len(), frames, ctf)
		})
		.collect()
}
