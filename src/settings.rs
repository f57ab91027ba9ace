use std::{fs, path::Path, path::PathBuf};

use serde::Deserialize;

pub(crate) const DEFAULT_OUTPUT_DIR: &str = "build";
pub(crate) const TOOLCHAIN_FILE: &str = "mortar-toolchain.toml";

/// Process-wide build settings.
///
/// Everything here has a working default; the embedding build script only
/// overrides what it cares about. Explicit setter calls win over the
/// toolchain file, which wins over the built-in defaults.
#[derive(Debug)]
pub struct Settings {
	pub output_dir: PathBuf,
	pub parallelism: usize,
	pub compiler_exe: Option<String>,
	pub archiver_exe: Option<String>,
	pub linker_exe: Option<String>,
	pub global_cflags: Vec<String>,
	pub global_ldflags: Vec<String>,
	pub global_defines: Vec<String>,
	pub generate_compile_commands: bool,
	pub dep_tracking: bool,
	pub toolchain_file: Option<PathBuf>,
	pub rebuild_command: Option<String>,
}

impl Default for Settings {
	fn default() -> Settings {
		Settings {
			output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
			parallelism: num_cpus::get().max(1),
			compiler_exe: None,
			archiver_exe: None,
			linker_exe: None,
			global_cflags: Vec::new(),
			global_ldflags: Vec::new(),
			global_defines: Vec::new(),
			generate_compile_commands: false,
			dep_tracking: false,
			toolchain_file: None,
			rebuild_command: None,
		}
	}
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ToolchainFile {
	pub compiler: Option<String>,
	pub archiver: Option<String>,
	pub linker: Option<String>,
	pub cflags: Option<Vec<String>>,
	pub ldflags: Option<Vec<String>>,
}

pub(crate) fn read_toolchain_file(path: &Path) -> Result<ToolchainFile, anyhow::Error> {
	let toolchain_toml = match fs::read_to_string(path) {
		Ok(x) => x,
		Err(e) => return Err(anyhow::anyhow!("Error opening toolchain file \"{}\": {}", path.display(), e)),
	};

	let toolchain_file = match toml::from_str::<ToolchainFile>(&toolchain_toml) {
		Ok(x) => x,
		Err(e) => return Err(anyhow::anyhow!("Error reading toolchain file \"{}\": {}", path.display(), e)),
	};

	Ok(toolchain_file)
}

// Load the configured toolchain file, or the conventional one from the
// current directory when none was configured. Absence is not an error.
pub(crate) fn load_toolchain_file(settings: &Settings) -> Option<ToolchainFile> {
	let path = match &settings.toolchain_file {
		Some(x) => x.clone(),
		None => {
			let conventional = PathBuf::from(TOOLCHAIN_FILE);
			if !conventional.is_file() {
				return None;
			}
			conventional
		}
	};
	match read_toolchain_file(&path) {
		Ok(x) => Some(x),
		Err(e) => {
			log::warn!("{}", e);
			None
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn toolchain_file_parses_partial_tables() {
		let mut file = tempfile::NamedTempFile::new().expect("temp file");
		write!(
			file,
			r#"
compiler = "clang"
cflags = ["-O2", "-Wall"]
"#
		)
		.expect("write toolchain file");

		let tc = read_toolchain_file(file.path()).expect("parse toolchain file");
		assert_eq!(tc.compiler.as_deref(), Some("clang"));
		assert_eq!(tc.archiver, None);
		assert_eq!(tc.cflags, Some(vec!["-O2".to_owned(), "-Wall".to_owned()]));
	}

	#[test]
	fn missing_toolchain_file_is_an_error() {
		assert!(read_toolchain_file(Path::new("no/such/mortar-toolchain.toml")).is_err());
	}
}
