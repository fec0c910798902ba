
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::ProvenanceConfig;
use crate::logging::ResultExt;
use crate::mrc::ImageProbe;
use crate::schema::{DefectFile, DetectorReference, GainFile};
use crate::star::StarFile;


/// Paths to the detector calibration files,
/// either given explicitly or discovered from the upstream job
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferencePaths {
	pub gain_file: Option<String>,
	pub defect_file: Option<String>
}


#[derive(Debug, Clone, Default, PartialEq)]
pub struct Provenance {
	pub gain_file: Option<GainFile>,
	pub defect_file: Option<DefectFile>
}


/// Finds the gain reference and defect files for the movies.
///
/// These aren't in the tilt series tables, but when the input was written by a motion correction
/// job, the job's options in the job.star next to the input name them. Those override the
/// explicit `paths`. Anything going wrong along the way just means no gain or defect file.
pub fn resolve(input_file: &Path, project_dir: &Path, paths: &mut ReferencePaths, config: &ProvenanceConfig, probe: &dyn ImageProbe) -> Provenance {

	let job_dir = input_file.parent()
		.unwrap_or(Path::new("."));
	let job_file = job_dir.join(&config.job_file_name);
	if !job_file.is_file() {
		debug!("No job file at {}, no gain or defect files", job_file.to_string_lossy());
		if paths.gain_file.is_some() || paths.defect_file.is_some() {
			warn!("Ignoring the explicit gain and defect files: they need a job file next to the input");
		}
		return Provenance::default();
	}

	resolve_job(&job_file, project_dir, paths, config, probe)
		.best_effort("Gain and defect files")
		.unwrap_or_default()
}


fn resolve_job(job_file: &Path, project_dir: &Path, paths: &mut ReferencePaths, config: &ProvenanceConfig, probe: &dyn ImageProbe) -> Result<Provenance> {

	let star = StarFile::read(job_file)?;

	let job_type = star.require_block("job")?
		.find_pair("_rlnJobTypeLabel")
		.context("Job file has no job type")?;
	debug!("Job type: {}", job_type);

	if job_type.starts_with(&config.motioncorr_job_prefix) {

		let options = star.require_block("joboptions_values")?
			.find(&["_rlnJobOptionVariable", "_rlnJobOptionValue"])
			.context("Job file has no job options")?;

		// empty option values mean the job ran without that file
		for row in options.rows() {
			let value = Some(row[1].clone())
				.filter(|v| !v.is_empty());
			if row[0] == config.gain_option {
				paths.gain_file = value;
			} else if row[0] == config.defect_option {
				paths.defect_file = value;
			}
		}

		info!("Motion correction job: gain={:?}, defect={:?}", paths.gain_file, paths.defect_file);
	}

	let reference = |path: &String| {
		let dims = probe.dims(&project_dir.join(path));
		DetectorReference {
			path: path.clone(),
			width: dims.map(|d| d.width),
			height: dims.map(|d| d.height)
		}
	};

	Ok(Provenance {
		gain_file: paths.gain_file.as_ref().map(reference),
		defect_file: paths.defect_file.as_ref().map(reference)
	})
}
