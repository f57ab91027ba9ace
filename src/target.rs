use std::path::{Path, PathBuf};

use crate::{command::CommandId, subproject::ManifestKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TargetId(pub(crate) usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetKind {
	Executable,
	StaticLibrary,
	SharedLibrary,
	Proxy,
}

/// A named node of the build graph producing one artifact on disk.
///
/// Targets are owned by the [`Build`](crate::Build) registry and referred to
/// everywhere else by [`TargetId`]. Iteration order equals registration order.
#[derive(Debug)]
pub struct Target {
	pub kind: TargetKind,
	pub name: String,
	pub sources: Vec<String>,
	pub include_dirs: Vec<String>,
	pub library_dirs: Vec<String>,
	pub link_libs: Vec<String>,
	pub defines: Vec<String>,
	pub deps: Vec<TargetId>,
	pub pre_commands: Vec<CommandId>,
	pub post_commands: Vec<CommandId>,
	pub cflags: Option<String>,
	pub ldflags: Option<String>,

	// For a Proxy the output path is externally managed (it lives under the
	// subproject directory) and obj_dir stays None.
	pub output_path: PathBuf,
	pub obj_dir: Option<PathBuf>,
	pub(crate) proxy_kind: Option<ManifestKind>,
}

impl Target {
	pub(crate) fn new(name: &str, kind: TargetKind, output_dir: &Path) -> Target {
		Target {
			kind,
			name: name.to_owned(),
			sources: Vec::new(),
			include_dirs: Vec::new(),
			library_dirs: Vec::new(),
			link_libs: Vec::new(),
			defines: Vec::new(),
			deps: Vec::new(),
			pre_commands: Vec::new(),
			post_commands: Vec::new(),
			cflags: None,
			ldflags: None,
			output_path: output_dir.join(artifact_file_name(kind, name)),
			obj_dir: Some(output_dir.join(format!("obj_{}", name))),
			proxy_kind: None,
		}
	}

	pub(crate) fn new_proxy(name: &str, kind: ManifestKind, output_path: PathBuf) -> Target {
		Target {
			kind: TargetKind::Proxy,
			name: name.to_owned(),
			sources: Vec::new(),
			include_dirs: Vec::new(),
			library_dirs: Vec::new(),
			link_libs: Vec::new(),
			defines: Vec::new(),
			deps: Vec::new(),
			pre_commands: Vec::new(),
			post_commands: Vec::new(),
			cflags: None,
			ldflags: None,
			output_path,
			obj_dir: None,
			proxy_kind: Some(kind),
		}
	}

	// Recompute derived paths after the output directory changes.
	pub(crate) fn rederive_paths(&mut self, output_dir: &Path) {
		if self.kind == TargetKind::Proxy {
			return;
		}
		self.output_path = output_dir.join(artifact_file_name(self.kind, &self.name));
		self.obj_dir = Some(output_dir.join(format!("obj_{}", self.name)));
	}

	// Whether this target's artifact is passed to dependant link lines as a
	// raw path.
	pub(crate) fn links_as_artifact(&self) -> bool {
		match self.kind {
			TargetKind::StaticLibrary | TargetKind::SharedLibrary => true,
			TargetKind::Proxy => {
				matches!(self.proxy_kind, Some(ManifestKind::StaticLib) | Some(ManifestKind::SharedLib))
			}
			TargetKind::Executable => false,
		}
	}

	pub(crate) fn object_path(&self, source: &str) -> PathBuf {
		let obj_dir = self.obj_dir.as_deref().unwrap_or_else(|| Path::new(""));
		obj_dir.join(format!("{}.o", source_stem(source)))
	}
}

/// Platform-conventional file name for an artifact of the given kind.
pub(crate) fn artifact_file_name(kind: TargetKind, name: &str) -> String {
	match kind {
		TargetKind::Executable => {
			if cfg!(windows) {
				format!("{}.exe", name)
			} else {
				name.to_owned()
			}
		}
		TargetKind::StaticLibrary => {
			if cfg!(windows) {
				format!("{}.lib", name)
			} else {
				format!("lib{}.a", name)
			}
		}
		TargetKind::SharedLibrary => {
			if cfg!(windows) {
				format!("{}.dll", name)
			} else if cfg!(target_os = "macos") {
				format!("lib{}.dylib", name)
			} else {
				format!("lib{}.so", name)
			}
		}
		// Proxies never derive their own artifact name.
		TargetKind::Proxy => name.to_owned(),
	}
}

// Source file name stripped of its directory part and final extension. Stem
// collisions within one target are undefined.
pub(crate) fn source_stem(source: &str) -> String {
	let base = match source.rfind(['/', '\\']) {
		Some(idx) => &source[idx + 1..],
		None => source,
	};
	match base.rfind('.') {
		Some(idx) => base[..idx].to_owned(),
		None => base.to_owned(),
	}
}
