//! Self-rebuild: the build script notices its own sources are newer than the
//! running executable, rebuilds itself, and replaces the process image with
//! the fresh binary so the invoking shell sees the new run directly.

use std::{env, fs, path::Path, path::PathBuf};

use crate::{misc, process};

pub(crate) fn self_rebuild_if_needed(rebuild_command: Option<&str>, args: &[String], sources: &[&str]) {
	let exe = match env::current_exe() {
		Ok(x) => x,
		Err(e) => {
			log::warn!("Could not resolve the running executable: {}", e);
			return;
		}
	};

	// A lingering .old from a previous rebuild is always removed first.
	let old = old_path(&exe);
	misc::remove_file(&old);

	if !needs_rebuild(&exe, sources) {
		return;
	}

	println!("mortar: build script sources changed, rebuilding...");
	if let Err(e) = fs::rename(&exe, &old) {
		log::warn!("Error renaming {} to {}: {}", exe.display(), old.display(), e);
	}

	let cmd = match rebuild_command {
		Some(x) => x.to_owned(),
		None => default_rebuild_line(&exe, sources),
	};
	if process::run_shell(&cmd) != 0 {
		eprintln!("mortar: self-rebuild failed");
		std::process::exit(1);
	}
	process::exec_replace(&exe, args);
}

pub(crate) fn old_path(exe: &Path) -> PathBuf {
	PathBuf::from(format!("{}.old", exe.display()))
}

// Stale when any declared source is strictly newer than the executable. An
// unreadable source is skipped; an unreadable executable forces a rebuild.
pub(crate) fn needs_rebuild(exe: &Path, sources: &[&str]) -> bool {
	let exe_mtime = match misc::mtime_secs(exe) {
		Some(x) => x,
		None => return true,
	};
	sources
		.iter()
		.any(|src| misc::mtime_secs(Path::new(src)).is_some_and(|m| m > exe_mtime))
}

// The build script is a single-file Rust program unless the embedder says
// otherwise via `set_rebuild_command`.
fn default_rebuild_line(exe: &Path, sources: &[&str]) -> String {
	let first = sources.first().copied().unwrap_or("build.rs");
	format!("rustc --edition 2021 -O -o \"{}\" \"{}\"", exe.display(), first)
}
