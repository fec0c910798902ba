
use anyhow::{bail, Result};
use tracing::warn;

use crate::error::ConvertError;


/// How much dose the specimen had seen before a movie started, and how many frames it took
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovieExposure {
	/// e-/A^2
	pub pre_exposure: f64,
	pub frame_count: u32
}


/// Reconstructs the dose rate (e-/A^2/frame) of each movie in a tilt series.
///
/// The table only records the dose accumulated before each movie, so a movie's dose rate
/// comes from the difference to the next movie's pre-exposure, spread across its frames.
/// Movies must be in acquisition order, which is the order of the table, not tilt order.
/// The last movie has no successor, so it gets the same rate as the movie before it.
///
/// A single movie has nothing to difference against: it gets the fallback rate, if any.
pub fn dose_rates(series_name: &str, exposures: &[MovieExposure], single_movie_rate: Option<f64>) -> Result<Vec<f64>> {

	match exposures {
		[] => bail!(ConvertError::EmptyTiltSeries(series_name.to_string())),
		[_] => {
			let Some(rate) = single_movie_rate
				else { bail!(ConvertError::SingleMovieTiltSeries(series_name.to_string())); };
			return Ok(vec![rate]);
		}
		_ => ()
	}

	let mut rates = exposures.windows(2)
		.enumerate()
		.map(|(i, pair)| {
			let (movie, next) = (pair[0], pair[1]);
			if movie.frame_count == 0 {
				bail!("Movie {} of tilt series {} has no frames", i, series_name);
			}
			let rate = (next.pre_exposure - movie.pre_exposure)/(movie.frame_count as f64);
			if !rate.is_finite() {
				bail!("Movie {} of tilt series {} has no usable dose rate, pre-exposures: {} then {}",
					i, series_name, movie.pre_exposure, next.pre_exposure);
			}
			Ok(rate)
		})
		.collect::<Result<Vec<_>>>()?;

	let last = rates[rates.len() - 1];
	rates.push(last);

	for (i, rate) in rates.iter().enumerate() {
		if *rate <= 0.0 {
			warn!("Tilt series {} movie {} has a non-positive dose rate: {}, are the movies out of order?", series_name, i, rate);
		}
	}

	Ok(rates)
}


/// The total dose after a frame, counting the frame itself
pub fn accumulated_dose(pre_exposure: f64, dose_per_frame: f64, frame_i: u32) -> f64 {
	pre_exposure + dose_per_frame*((frame_i + 1) as f64)
}
