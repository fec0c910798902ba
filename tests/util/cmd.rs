
use std::path::Path;

use assert_cmd::assert::Assert;
use assert_cmd::Command;


/// runs the converter binary from inside a project folder, like RELION users would
pub fn cmd(project_dir: impl AsRef<Path>) -> Command {
	let mut cmd = Command::cargo_bin("cets-convert")
		.unwrap();
	cmd.current_dir(project_dir)
		.arg("--log=cets_convert=debug");
	cmd
}


pub trait AssertExt {
	fn print_output(self) -> Self;
}

impl AssertExt for Assert {

	fn print_output(self) -> Self {
		let output = self.get_output();
		println!("STDOUT:\n{}", String::from_utf8_lossy(&output.stdout));
		println!("STDERR:\n{}", String::from_utf8_lossy(&output.stderr));
		self
	}
}
