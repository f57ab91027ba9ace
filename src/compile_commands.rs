//! compile_commands.json generation.
//!
//! One entry per translation unit, recording the exact compile line the
//! scheduler would run. The index is rebuilt from scratch on every `run` and
//! written after a successful build so IDE tooling never sees a half-updated
//! file.

use std::{fs, path::Path};

use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CompileCommand {
	/// Absolute working directory at index time.
	pub directory: String,
	/// The full synthesized compile line.
	pub command: String,
	/// The source path as recorded in the target.
	pub file: String,
}

#[derive(Debug, Default)]
pub(crate) struct CompileCommandIndex {
	entries: Vec<CompileCommand>,
}

impl CompileCommandIndex {
	pub(crate) fn reset(&mut self) {
		self.entries.clear();
	}

	pub(crate) fn record(&mut self, directory: String, command: String, file: String) {
		self.entries.push(CompileCommand { directory, command, file });
	}

	pub(crate) fn entries(&self) -> &[CompileCommand] {
		&self.entries
	}

	pub(crate) fn write(&self, output_dir: &Path) -> Result<(), anyhow::Error> {
		let json = serde_json::to_string_pretty(&self.entries)?;
		let path = output_dir.join("compile_commands.json");
		fs::write(&path, json)?;
		log::info!("Wrote {}", path.display());
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn index_is_written_as_json_array() {
		let mut index = CompileCommandIndex::default();
		index.record(
			"/work".to_owned(),
			"\"cc\" -c -o \"build/obj_m/m.o\" \"m.c\"".to_owned(),
			"m.c".to_owned(),
		);

		let dir = tempfile::tempdir().expect("temp dir");
		index.write(dir.path()).expect("write index");

		let text = fs::read_to_string(dir.path().join("compile_commands.json")).expect("read back");
		let parsed: Vec<serde_json::Value> = serde_json::from_str(&text).expect("valid json");
		assert_eq!(parsed.len(), 1);
		assert_eq!(parsed[0]["directory"], "/work");
		assert_eq!(parsed[0]["file"], "m.c");
		assert_eq!(parsed[0]["command"], "\"cc\" -c -o \"build/obj_m/m.o\" \"m.c\"");
	}

	#[test]
	fn control_bytes_are_escaped() {
		let mut index = CompileCommandIndex::default();
		index.record("/w".to_owned(), "cc \"a\\b.c\"\t\x01".to_owned(), "a.c".to_owned());
		let json = serde_json::to_string(&index.entries().to_vec()).expect("serialize");
		assert!(json.contains(r#"cc \"a\\b.c\"\t"#));
	}

	#[test]
	fn reset_clears_previous_run() {
		let mut index = CompileCommandIndex::default();
		index.record("/w".to_owned(), "cc".to_owned(), "a.c".to_owned());
		index.reset();
		assert!(index.entries().is_empty());
	}
}
