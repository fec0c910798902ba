
// Records of the CETS tomography metadata schema, the output side of a conversion.
// Field names in the JSON documents follow the schema, not the Rust names.

use serde_json::{Map, Value};

use crate::json::{matrix, MapEx, ToJson};


/// RELION measures the astigmatism angle in the opposite direction to the schema
pub const RELION_DEFOCUS_HANDEDNESS: i32 = -1;


#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
	pub text: String
}

impl Annotation {

	pub fn new(text: impl Into<String>) -> Self {
		Self {
			text: text.into()
		}
	}
}


/// Where an image lives, and how big it is, if we could find out
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInfo {
	pub path: String,
	/// 0-based index into a stack file
	pub section: Option<u32>,
	pub width: Option<u32>,
	pub height: Option<u32>
}


/// What the microscope did to acquire an image
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionMetadata {
	/// degrees
	pub nominal_tilt_angle: f64,
	/// e-/A^2, including this image
	pub accumulated_dose: f64,
	pub ctf: Option<CtfMetadata>
}


#[derive(Debug, Clone, PartialEq)]
pub struct CtfMetadata {
	/// A, underfocus positive
	pub defocus_u: f64,
	/// A, underfocus positive
	pub defocus_v: f64,
	/// degrees
	pub defocus_angle: f64,
	pub defocus_handedness: i32
}


#[derive(Debug, Clone, PartialEq)]
pub enum Transformation {

	/// shifts in pixels
	Translation {
		x: f64,
		y: f64
	},

	/// the per-frame correction done by a motion correction job
	MotionCorrection {
		matrix: [[f64; 2]; 2],
		annotations: Vec<Annotation>
	}
}

impl Transformation {

	pub fn type_name(&self) -> &'static str {
		match self {
			Self::Translation { .. } => "translation",
			Self::MotionCorrection { .. } => "motion_correction"
		}
	}
}


#[derive(Debug, Clone, PartialEq)]
pub struct TiltSeriesMicrographAlignment {
	/// pixels
	pub x_shift: f64,
	/// pixels
	pub y_shift: f64,
	/// degrees
	pub x_tilt: f64,
	/// degrees
	pub y_tilt: f64,
	/// degrees
	pub z_rot: f64
}

impl Default for TiltSeriesMicrographAlignment {

	fn default() -> Self {
		Self {
			x_shift: 0.0,
			y_shift: 0.0,
			x_tilt: 0.0,
			y_tilt: 0.0,
			z_rot: 0.0
		}
	}
}

impl TiltSeriesMicrographAlignment {

	pub fn translation(&self) -> Transformation {
		Transformation::Translation {
			x: self.x_shift,
			y: self.y_shift
		}
	}
}


#[derive(Debug, Clone, PartialEq)]
pub struct MovieFrame {
	pub image: ImageInfo,
	pub acquisition: AcquisitionMetadata,
	pub motion_correction_transformations: Vec<Transformation>
}


#[derive(Debug, Clone, PartialEq)]
pub struct MovieStack {
	pub path: String,
	pub frames: Vec<MovieFrame>
}


/// The movie stacks of a single tilt series
#[derive(Debug, Clone, PartialEq)]
pub struct MovieStackSet {
	pub movie_stacks: Vec<MovieStack>,
	pub annotations: Vec<Annotation>
}


/// A detector calibration image, ie a gain reference or a defect map
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorReference {
	pub path: String,
	pub width: Option<u32>,
	pub height: Option<u32>
}

pub type GainFile = DetectorReference;
pub type DefectFile = DetectorReference;


/// Movie stacks that share the same gain and defect files
#[derive(Debug, Clone, PartialEq)]
pub struct MovieStackCollection {
	pub movie_stack_sets: Vec<MovieStackSet>,
	pub gain_file: Option<GainFile>,
	pub defect_file: Option<DefectFile>
}


/// A movie merged into a single projection image
#[derive(Debug, Clone, PartialEq)]
pub struct TiltSeriesMicrograph {
	pub image: ImageInfo,
	pub acquisition: AcquisitionMetadata,
	pub refined_tilt_angle: Option<f64>,
	pub alignment: TiltSeriesMicrographAlignment
}


#[derive(Debug, Clone, PartialEq)]
pub struct TiltSeriesMicrographStack {
	pub path: String,
	pub micrographs: Vec<TiltSeriesMicrograph>
}


#[derive(Debug, Clone, PartialEq)]
pub struct TomoImageSet {
	pub raw_movies: Option<MovieStackCollection>,
	pub tilt_series: Option<TiltSeriesMicrographStack>
}


/// One region of a specimen
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
	pub tomo_imaging: Vec<TomoImageSet>
}


#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
	pub name: String,
	pub regions: Vec<Region>
}


impl ToJson for Annotation {

	fn to_json(&self) -> Value {
		let mut json = Map::<String,Value>::new();
		json.ins("type", "text");
		json.ins("text", self.text.as_str());
		Value::Object(json)
	}
}

impl ToJson for ImageInfo {

	fn to_json(&self) -> Value {
		let mut json = Map::<String,Value>::new();
		json.ins("path", self.path.as_str());
		if let Some(section) = self.section {
			json.ins("section", section);
		}
		json.ins("width", self.width);
		json.ins("height", self.height);
		Value::Object(json)
	}
}

impl ToJson for CtfMetadata {

	fn to_json(&self) -> Value {
		let mut json = Map::<String,Value>::new();
		json.ins("defocus_u", self.defocus_u);
		json.ins("defocus_v", self.defocus_v);
		json.ins("defocus_angle", self.defocus_angle);
		json.ins("defocus_handedness", self.defocus_handedness);
		Value::Object(json)
	}
}

impl ToJson for Transformation {

	fn to_json(&self) -> Value {
		let mut json = Map::<String,Value>::new();
		json.ins("transform_type", self.type_name());
		match self {
			Self::Translation { x, y } => {
				json.ins("trans_matrix", matrix(&[[*x, 0.0], [0.0, *y]]));
			}
			Self::MotionCorrection { matrix: m, annotations } => {
				json.ins("trans_matrix", matrix(m));
				json.ins("annotations", annotations.to_json());
			}
		}
		Value::Object(json)
	}
}

impl ToJson for TiltSeriesMicrographAlignment {

	fn to_json(&self) -> Value {
		let mut json = Map::<String,Value>::new();
		json.ins("translation", self.translation().to_json());
		json.ins("x_tilt", self.x_tilt);
		json.ins("y_tilt", self.y_tilt);
		json.ins("z_rot", self.z_rot);
		Value::Object(json)
	}
}

impl ToJson for MovieFrame {

	fn to_json(&self) -> Value {
		let mut json = Map::<String,Value>::new();
		json.merge(self.image.to_json());
		json.ins("nominal_tilt_angle", self.acquisition.nominal_tilt_angle);
		json.ins("accumulated_dose", self.acquisition.accumulated_dose);
		json.ins("ctf_metadata", self.acquisition.ctf.to_json());
		json.ins("motion_correction_transformations", self.motion_correction_transformations.to_json());
		Value::Object(json)
	}
}

impl ToJson for MovieStack {

	fn to_json(&self) -> Value {
		let mut json = Map::<String,Value>::new();
		json.ins("path", self.path.as_str());
		json.ins("frame_images", self.frames.to_json());
		Value::Object(json)
	}
}

impl ToJson for MovieStackSet {

	fn to_json(&self) -> Value {
		let mut json = Map::<String,Value>::new();
		json.ins("movie_stacks", self.movie_stacks.to_json());
		json.ins("annotations", self.annotations.to_json());
		Value::Object(json)
	}
}

impl ToJson for DetectorReference {

	fn to_json(&self) -> Value {
		let mut json = Map::<String,Value>::new();
		json.ins("path", self.path.as_str());
		json.ins("width", self.width);
		json.ins("height", self.height);
		Value::Object(json)
	}
}

impl ToJson for MovieStackCollection {

	fn to_json(&self) -> Value {
		let mut json = Map::<String,Value>::new();
		json.ins("movie_stack_sets", self.movie_stack_sets.to_json());
		json.ins("gain_file", self.gain_file.to_json());
		json.ins("defect_file", self.defect_file.to_json());
		Value::Object(json)
	}
}

impl ToJson for TiltSeriesMicrograph {

	fn to_json(&self) -> Value {
		let mut json = Map::<String,Value>::new();
		json.merge(self.image.to_json());
		json.ins("nominal_tilt_angle", self.acquisition.nominal_tilt_angle);
		json.ins("total_accumulated_dose", self.acquisition.accumulated_dose);
		json.ins("ctf_metadata", self.acquisition.ctf.to_json());
		json.ins("refined_tilt_angle", self.refined_tilt_angle);
		json.ins("alignment_transformations", self.alignment.to_json());
		Value::Object(json)
	}
}

impl ToJson for TiltSeriesMicrographStack {

	fn to_json(&self) -> Value {
		let mut json = Map::<String,Value>::new();
		json.ins("path", self.path.as_str());
		json.ins("micrographs", self.micrographs.to_json());
		Value::Object(json)
	}
}

impl ToJson for TomoImageSet {

	fn to_json(&self) -> Value {
		let mut json = Map::<String,Value>::new();
		json.ins("raw_movies", self.raw_movies.to_json());
		json.ins("tilt_series", self.tilt_series.to_json());
		Value::Object(json)
	}
}

impl ToJson for Region {

	fn to_json(&self) -> Value {
		let mut json = Map::<String,Value>::new();
		json.ins("tomo_imaging", self.tomo_imaging.to_json());
		Value::Object(json)
	}
}

impl ToJson for DataSet {

	fn to_json(&self) -> Value {
		let mut json = Map::<String,Value>::new();
		json.ins("name", self.name.as_str());
		json.ins("regions", self.regions.to_json());
		Value::Object(json)
	}
}
