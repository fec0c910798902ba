
use serde_json::{Map, Value};


/// Converts a record into its JSON document form
pub trait ToJson {
	fn to_json(&self) -> Value;
}

impl<T:ToJson> ToJson for Option<T> {

	fn to_json(&self) -> Value {
		match self {
			Some(value) => value.to_json(),
			None => Value::Null
		}
	}
}

impl<T:ToJson> ToJson for Vec<T> {

	fn to_json(&self) -> Value {
		Value::Array(self.iter()
			.map(ToJson::to_json)
			.collect()
		)
	}
}


pub trait MapEx {
	fn ins(&mut self, key: impl AsRef<str>, value: impl Into<Value>) -> &mut Value;

	/// copies all the fields of a JSON object into this one, for flattening composed records
	fn merge(&mut self, other: Value) -> &mut Self;
}

impl MapEx for Map<String,Value> {

	fn ins(&mut self, key: impl AsRef<str>, value: impl Into<Value>) -> &mut Value {
		let key = key.as_ref();
		self.insert(key.to_string(), value.into());
		self.get_mut(key)
			.expect("missing value we just added")
	}

	fn merge(&mut self, other: Value) -> &mut Self {
		if let Value::Object(other) = other {
			for (key, value) in other {
				self.insert(key, value);
			}
		}
		self
	}
}


pub fn matrix<const R: usize, const C: usize>(m: &[[f64; C]; R]) -> Value {
	Value::Array(m.iter()
		.map(|row| Value::Array(row.iter()
			.map(|&v| Value::from(v))
			.collect()
		))
		.collect()
	)
}
