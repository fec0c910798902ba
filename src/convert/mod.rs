
pub mod alignment;
pub mod ctf;
pub mod dose;
pub mod movies;
pub mod provenance;


use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use crate::config::ConverterConfig;
use crate::error::ConvertError;
use crate::mrc::{ImageProbe, MrcProbe};
use crate::schema::{Annotation, DataSet, MovieStackCollection, MovieStackSet, Region, TiltSeriesMicrographStack, TomoImageSet};
use crate::star::StarFile;

use self::alignment::AlignmentExtractor;
use self::ctf::CtfExtractor;
use self::provenance::{Provenance, ReferencePaths};


const GROUP_BLOCK: &str = "global";
const TAG_TOMO_NAME: &str = "_rlnTomoName";
const TAG_TOMO_STAR_FILE: &str = "_rlnTomoTiltSeriesStarFile";
const TAG_PIXEL_SIZE: &str = "_rlnMicrographOriginalPixelSize";


/// One row of the tilt series group table
#[derive(Debug, Clone, PartialEq)]
pub struct GroupEntry {
	pub name: String,
	pub star_file: String,
	/// A/px
	pub pixel_size: f64
}


/// Everything a conversion produced, by tilt series name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversion {
	pub movie_collections: BTreeMap<String,MovieStackCollection>,
	pub tilt_series: BTreeMap<String,TiltSeriesMicrographStack>
}

impl Conversion {

	pub fn names(&self) -> impl Iterator<Item=&str> {
		self.tilt_series.keys()
			.map(String::as_str)
	}

	/// Composes the dataset: each tilt series gets its own region
	pub fn dataset(&self, name: impl Into<String>) -> DataSet {
		DataSet {
			name: name.into(),
			regions: self.tilt_series.iter()
				.map(|(ts_name, tilt_series)| Region {
					tomo_imaging: vec![TomoImageSet {
						raw_movies: self.movie_collections.get(ts_name).cloned(),
						tilt_series: Some(tilt_series.clone())
					}]
				})
				.collect()
		}
	}
}


/// Converts a RELION tilt series group (the global table plus one table per tilt series)
/// into CETS movie collections and tilt series.
pub struct TiltSeriesGroupConverter {
	input_file: PathBuf,
	project_dir: PathBuf,
	config: ConverterConfig,
	probe: Box<dyn ImageProbe>,
	references: ReferencePaths,
	provenance: Option<Provenance>
}

impl TiltSeriesGroupConverter {

	pub fn new(input_file: impl Into<PathBuf>, config: ConverterConfig) -> Self {
		Self {
			input_file: input_file.into(),
			project_dir: PathBuf::from("."),
			config,
			probe: Box::new(MrcProbe),
			references: ReferencePaths::default(),
			provenance: None
		}
	}

	/// the folder the paths inside the STAR files are relative to
	pub fn with_project_dir(mut self, project_dir: impl Into<PathBuf>) -> Self {
		self.project_dir = project_dir.into();
		self
	}

	pub fn with_gain_file(mut self, path: Option<String>) -> Self {
		self.references.gain_file = path;
		self
	}

	pub fn with_defect_file(mut self, path: Option<String>) -> Self {
		self.references.defect_file = path;
		self
	}

	pub fn with_probe(mut self, probe: impl ImageProbe + 'static) -> Self {
		self.probe = Box::new(probe);
		self
	}

	pub fn references(&self) -> &ReferencePaths {
		&self.references
	}

	/// Reads the group table: one entry per tilt series, in file order
	pub fn read_group(&self) -> Result<Vec<GroupEntry>> {

		let star = StarFile::read(&self.input_file)?;
		let block = star.require_block(GROUP_BLOCK)?;
		let table = block.find(&[TAG_TOMO_NAME, TAG_TOMO_STAR_FILE, TAG_PIXEL_SIZE])
			.context(format!("Tilt series group is missing columns, need: {}, {}, {}",
				TAG_TOMO_NAME, TAG_TOMO_STAR_FILE, TAG_PIXEL_SIZE))?;

		(0 .. table.len())
			.map(|i| {
				let name = table.get_str(i, 0)?.to_string();
				let pixel_size = table.get_f64(i, 2)?;
				if !(pixel_size > 0.0) {
					bail!("Tilt series {} has a non-positive pixel size: {}", name, pixel_size);
				}
				Ok(GroupEntry {
					star_file: table.get_str(i, 1)?.to_string(),
					pixel_size,
					name
				})
			})
			.collect()
	}

	/// Converts the tilt series named in `names`, or all of them if None.
	/// Asking for tilt series the group doesn't have is an error, and nothing gets converted.
	#[tracing::instrument(skip_all, level = 5, name = "Convert", fields(input = %self.input_file.to_string_lossy()))]
	pub fn convert(&mut self, names: Option<&[String]>) -> Result<Conversion> {

		let group = self.read_group()?;
		let selected = select(&group, names)?;
		info!("Converting {} of {} tilt series", selected.len(), group.len());

		let mut conversion = Conversion::default();
		for entry in selected {
			let (collection, tilt_series) = self.convert_tilt_series(entry)
				.context(format!("Failed to convert tilt series {}", entry.name))?;
			conversion.movie_collections.insert(entry.name.clone(), collection);
			conversion.tilt_series.insert(entry.name.clone(), tilt_series);
		}

		// the gain and defect files are shared by the whole group
		let provenance = self.provenance().clone();
		for collection in conversion.movie_collections.values_mut() {
			collection.gain_file = provenance.gain_file.clone();
			collection.defect_file = provenance.defect_file.clone();
		}

		Ok(conversion)
	}

	/// Resolves the gain and defect files, the first time only
	pub fn provenance(&mut self) -> &Provenance {
		if self.provenance.is_none() {
			let provenance = provenance::resolve(
				&self.input_file,
				&self.project_dir,
				&mut self.references,
				&self.config.provenance,
				self.probe.as_ref()
			);
			debug!("Provenance: {:?}", provenance);
			self.provenance = Some(provenance);
		}
		self.provenance.get_or_insert_with(Provenance::default)
	}

	fn convert_tilt_series(&self, entry: &GroupEntry) -> Result<(MovieStackCollection, TiltSeriesMicrographStack)> {

		let star = StarFile::read(self.project_dir.join(&entry.star_file))?;
		let block = star.require_block(&entry.name)?;

		let tilt_movies = movies::read_movies(block, entry.pixel_size, &self.project_dir, self.probe.as_ref())?;
		let exposures = tilt_movies.iter()
			.map(|movie| movie.exposure())
			.collect::<Vec<_>>();
		let dose_rates = dose::dose_rates(&entry.name, &exposures, self.config.dose.single_movie_dose_per_frame)?;

		// the CTF and alignment columns live in the same loop as the movies,
		// so row i describes the same movie everywhere
		let ctf = CtfExtractor::new(block)?;
		let alignment = AlignmentExtractor::new(block)?;
		info!("Tilt series {}: {} movies, ctf={}, aligned={}", entry.name, tilt_movies.len(), ctf.has_ctf(), alignment.is_aligned());

		let mut stacks = Vec::with_capacity(tilt_movies.len());
		let mut micrographs = Vec::with_capacity(tilt_movies.len());
		for (i, (movie, dose_per_frame)) in tilt_movies.iter().zip(dose_rates).enumerate() {
			let stack = movies::frames(movie, dose_per_frame, ctf.get(i)?);
			let micrograph = movies::project(&stack, alignment.get(i, movie.pixel_size)?)
				.context(format!("Movie {} has no frames", movie.stack_path))?;
			stacks.push(stack);
			micrographs.push(micrograph);
		}

		let collection = MovieStackCollection {
			movie_stack_sets: vec![MovieStackSet {
				movie_stacks: stacks,
				annotations: vec![Annotation::new(format!("Raw images for tilt series name: {}", entry.name))]
			}],
			gain_file: None,
			defect_file: None
		};
		let tilt_series = TiltSeriesMicrographStack {
			path: entry.star_file.clone(),
			micrographs
		};

		Ok((collection, tilt_series))
	}
}


/// Picks the requested entries out of the group, keeping the group's order
fn select<'g>(group: &'g [GroupEntry], names: Option<&[String]>) -> Result<Vec<&'g GroupEntry>> {

	let Some(names) = names
		else { return Ok(group.iter().collect()); };

	let missing = names.iter()
		.filter(|name| !group.iter().any(|entry| &entry.name == *name))
		.cloned()
		.collect::<Vec<_>>();
	if !missing.is_empty() {
		bail!(ConvertError::MissingTiltSeries(missing));
	}

	Ok(group.iter()
		.filter(|entry| names.contains(&entry.name))
		.collect())
}
