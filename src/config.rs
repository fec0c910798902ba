
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use toml::Table;


/// Tunables for a conversion.
/// Built explicitly and handed to the converter, so tests can swap in their own values.
#[derive(Debug, Clone, PartialEq)]
pub struct ConverterConfig {
	pub provenance: ProvenanceConfig,
	pub dose: DoseConfig
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvenanceConfig {

	/// name of the job-configuration file next to the input file
	pub job_file_name: String,

	/// job type labels starting with this prefix are motion correction jobs
	pub motioncorr_job_prefix: String,

	pub gain_option: String,
	pub defect_option: String
}

#[derive(Debug, Clone, PartialEq)]
pub struct DoseConfig {

	/// dose rate (e-/A^2/frame) to use for tilt series with only one movie,
	/// or None to reject those tilt series
	pub single_movie_dose_per_frame: Option<f64>
}

impl Default for ConverterConfig {

	fn default() -> Self {
		Self {
			provenance: ProvenanceConfig::default(),
			dose: DoseConfig::default()
		}
	}
}

impl Default for ProvenanceConfig {

	fn default() -> Self {
		Self {
			job_file_name: "job.star".to_string(),
			motioncorr_job_prefix: "relion.motioncorr".to_string(),
			gain_option: "fn_gain_ref".to_string(),
			defect_option: "fn_defect".to_string()
		}
	}
}

impl Default for DoseConfig {

	fn default() -> Self {
		Self {
			single_movie_dose_per_frame: None
		}
	}
}

impl ConverterConfig {

	pub fn read(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let toml = fs::read_to_string(path)
			.with_context(|| format!("Failed to read config file at: {}", path.to_string_lossy()))?;
		Self::parse(&toml)
			.with_context(|| format!("Failed to parse config file at: {}", path.to_string_lossy()))
	}

	/// every key is optional, missing keys keep their defaults
	pub fn parse(toml: &str) -> Result<Self> {

		let toml = toml.parse::<Table>()
			.context("Config file is not valid TOML")?;

		let mut config = Self::default();

		if let Some(toml_provenance) = toml.get("provenance") {
			let toml_provenance = toml_provenance.as_table()
				.context("provenance key is not a table")?;
			let provenance = &mut config.provenance;
			read_str(toml_provenance, "provenance", "job_file_name", &mut provenance.job_file_name)?;
			read_str(toml_provenance, "provenance", "motioncorr_job_prefix", &mut provenance.motioncorr_job_prefix)?;
			read_str(toml_provenance, "provenance", "gain_option", &mut provenance.gain_option)?;
			read_str(toml_provenance, "provenance", "defect_option", &mut provenance.defect_option)?;
		}

		if let Some(toml_dose) = toml.get("dose") {
			let toml_dose = toml_dose.as_table()
				.context("dose key is not a table")?;
			if let Some(value) = toml_dose.get("single_movie_dose_per_frame") {
				// accept integers too, TOML writers are not picky about 1 vs 1.0
				let dose = value.as_float()
					.or_else(|| value.as_integer().map(|i| i as f64))
					.context("dose.single_movie_dose_per_frame was not a number")?;
				if !(dose > 0.0) {
					bail!("dose.single_movie_dose_per_frame must be positive, not {}", dose);
				}
				config.dose.single_movie_dose_per_frame = Some(dose);
			}
		}

		Ok(config)
	}
}


fn read_str(table: &Table, section: &str, key: &str, dst: &mut String) -> Result<()> {
	if let Some(value) = table.get(key) {
		*dst = value.as_str()
			.with_context(|| format!("{}.{} was not a string", section, key))?
			.to_string();
	}
	Ok(())
}
