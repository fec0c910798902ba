
use std::fs;
use std::path::{Path, PathBuf};

use assert_fs::TempDir;
use serde_json::Value;

use cets_convert::mrc::MrcHeader;


pub const PIXEL_SIZE: f64 = 0.675;
pub const MOVIE_SIZE: u32 = 4096;


/// One row of a tilt series table
#[derive(Debug, Clone)]
pub struct Tilt {
	pub tilt: f64,
	pub pre_exposure: f64,
	pub frames: u32,
	/// defocus u, v, angle
	pub ctf: Option<[f64; 3]>,
	/// x shift (A), y shift (A), x tilt, y tilt, z rot
	pub alignment: Option<[f64; 5]>
}

impl Tilt {

	pub fn new(tilt: f64, pre_exposure: f64, frames: u32) -> Self {
		Self {
			tilt,
			pre_exposure,
			frames,
			ctf: None,
			alignment: None
		}
	}

	pub fn ctf(mut self, defocus_u: f64, defocus_v: f64, defocus_angle: f64) -> Self {
		self.ctf = Some([defocus_u, defocus_v, defocus_angle]);
		self
	}

	pub fn alignment(mut self, alignment: [f64; 5]) -> Self {
		self.alignment = Some(alignment);
		self
	}
}


/// a dose-symmetric tilt scheme: 0, +3, -3, +6, -6, ... with 3 e-/A^2 per tilt
pub fn dose_symmetric(count: usize, frames: u32) -> Vec<Tilt> {
	(0 .. count)
		.map(|i| {
			let step = ((i + 1)/2) as f64*3.0;
			let tilt = match i {
				0 => 0.0,
				i if i % 2 == 1 => step,
				_ => -step
			};
			Tilt::new(tilt, i as f64*3.0, frames)
		})
		.collect()
}


pub fn movie_path(ts_name: &str, index: usize, tilt: &Tilt) -> String {
	format!("frames/{}_{:03}_{:.1}.mrc", ts_name, index, tilt.tilt)
}


/// A RELION project folder in a temp dir
pub struct Project {
	dir: TempDir
}

impl Project {

	pub fn new() -> Self {
		Self {
			dir: TempDir::new()
				.expect("Failed to make temp folder")
		}
	}

	pub fn path(&self) -> &Path {
		self.dir.path()
	}

	pub fn join(&self, path: impl AsRef<Path>) -> PathBuf {
		self.path().join(path)
	}

	pub fn write(&self, path: impl AsRef<Path>, txt: impl AsRef<str>) -> PathBuf {
		let path = self.join(path);
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.expect(&format!("Failed to create folder: {}", parent.to_string_lossy()));
		}
		fs::write(&path, txt.as_ref())
			.expect(&format!("Failed to write file: {}", path.to_string_lossy()));
		path
	}

	pub fn write_mrc(&self, path: impl AsRef<Path>, nx: u32, ny: u32, nz: u32) {
		let path = self.join(path);
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.expect(&format!("Failed to create folder: {}", parent.to_string_lossy()));
		}
		MrcHeader { nx, ny, nz }
			.write(&path)
			.expect(&format!("Failed to write MRC file: {}", path.to_string_lossy()));
	}

	/// Writes the tilt series group of a job, one table per tilt series, and the movie headers.
	/// Returns the path to the group file.
	pub fn tilt_series_job(&self, job_dir: &str, tilt_series: &[(&str, Vec<Tilt>)]) -> PathBuf {

		let mut group = String::from("\ndata_global\n\nloop_\n_rlnTomoName #1\n_rlnTomoTiltSeriesStarFile #2\n_rlnMicrographOriginalPixelSize #3\n");

		for (ts_name, tilts) in tilt_series {
			let star_path = format!("{}/tilt_series/{}.star", job_dir, ts_name);
			group.push_str(&format!("{} {} {}\n", ts_name, star_path, PIXEL_SIZE));
			self.write(&star_path, tilt_series_star(ts_name, tilts));
			for (i, tilt) in tilts.iter().enumerate() {
				self.write_mrc(movie_path(ts_name, i, tilt), MOVIE_SIZE, MOVIE_SIZE, tilt.frames);
			}
		}

		self.write(format!("{}/tilt_series.star", job_dir), group)
	}

	pub fn read_json(&self, path: impl AsRef<Path>) -> Value {
		let path = self.join(path);
		let text = fs::read_to_string(&path)
			.expect(&format!("Failed to read file: {}", path.to_string_lossy()));
		serde_json::from_str(&text)
			.expect(&format!("Failed to parse JSON: {}", path.to_string_lossy()))
	}

	pub fn print(&self) {
		println!("Project Folder: {}", self.path().to_string_lossy());
		print_dir(self.path(), 1);
	}
}

impl AsRef<Path> for Project {
	fn as_ref(&self) -> &Path {
		self.path()
	}
}


fn print_dir(dir: &Path, depth: usize) {
	let Ok(entries) = fs::read_dir(dir)
		else { return; };
	for entry in entries.flatten() {
		println!("{}{}", "\t".repeat(depth), entry.file_name().to_string_lossy());
		if entry.path().is_dir() {
			print_dir(&entry.path(), depth + 1);
		}
	}
}


/// The per-tilt-series table, as written by RELION's tomography import and later jobs
pub fn tilt_series_star(ts_name: &str, tilts: &[Tilt]) -> String {

	let mut tags = vec![
		"_rlnMicrographMovieName",
		"_rlnTomoTiltMovieFrameCount",
		"_rlnTomoNominalStageTiltAngle",
		"_rlnTomoNominalTiltAxisAngle",
		"_rlnMicrographPreExposure",
		"_rlnVoltage"
	];
	let has_ctf = tilts.iter().all(|t| t.ctf.is_some());
	if has_ctf {
		tags.extend(["_rlnDefocusU", "_rlnDefocusV", "_rlnDefocusAngle"]);
	}
	let has_alignment = tilts.iter().all(|t| t.alignment.is_some());
	if has_alignment {
		tags.extend(["_rlnTomoXShiftAngst", "_rlnTomoYShiftAngst", "_rlnTomoXTilt", "_rlnTomoYTilt", "_rlnTomoZRot"]);
	}

	let mut star = format!("\n# version 50001\n\ndata_{}\n\nloop_\n", ts_name);
	for (i, tag) in tags.iter().enumerate() {
		star.push_str(&format!("{} #{}\n", tag, i + 1));
	}

	for (i, tilt) in tilts.iter().enumerate() {
		let mut row = vec![
			movie_path(ts_name, i, tilt),
			tilt.frames.to_string(),
			format!("{:.6}", tilt.tilt),
			"85.000000".to_string(),
			format!("{:.6}", tilt.pre_exposure),
			"300.000000".to_string()
		];
		if let (true, Some(ctf)) = (has_ctf, tilt.ctf) {
			row.extend(ctf.iter().map(|v| format!("{:.6}", v)));
		}
		if let (true, Some(alignment)) = (has_alignment, tilt.alignment) {
			row.extend(alignment.iter().map(|v| format!("{:.6}", v)));
		}
		star.push_str(&row.join(" "));
		star.push('\n');
	}

	star.push('\n');
	star
}
