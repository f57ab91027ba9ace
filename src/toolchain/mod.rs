pub(crate) mod synth;

use crate::settings::{load_toolchain_file, Settings};

/// Compiler family, chosen once from the compiler executable name.
///
/// Everything the command-line synthesizer emits is keyed on this.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Family {
	Gnu,
	Msvc,
}

pub(crate) fn identify_family(compiler_exe: &str) -> Family {
	// "cl", "cl.exe", "clang-cl"-free spellings of MSVC. Anything mentioning
	// clang is GCC-like regardless of the "cl" substring.
	if compiler_exe.contains("cl") && !compiler_exe.contains("clang") {
		Family::Msvc
	} else {
		Family::Gnu
	}
}

/// The resolved tool set and global flags for one `run` invocation.
#[derive(Clone, Debug)]
pub struct Toolchain {
	pub compiler: String,
	pub archiver: String,
	pub linker: String,
	pub family: Family,
	pub cflags: Vec<String>,
	pub ldflags: Vec<String>,
}

impl Toolchain {
	/// Resolve the toolchain from settings, the optional toolchain file, and
	/// built-in defaults, in that precedence order. Global flags set on the
	/// build win over the file's; the file's fill in when none were set.
	pub(crate) fn resolve(settings: &Settings) -> Toolchain {
		let file = load_toolchain_file(settings).unwrap_or_default();

		let compiler = match &settings.compiler_exe {
			Some(x) => x.clone(),
			None => file.compiler.unwrap_or_else(|| "cc".to_owned()),
		};
		let family = identify_family(&compiler);

		let archiver = match &settings.archiver_exe {
			Some(x) => x.clone(),
			None => file.archiver.unwrap_or_else(|| {
				match family {
					Family::Msvc => "lib".to_owned(),
					Family::Gnu => "ar".to_owned(),
				}
			}),
		};

		let linker = match &settings.linker_exe {
			Some(x) => x.clone(),
			None => match file.linker {
				Some(x) => x,
				// The compiler drives the link on macOS and Linux.
				None => {
					if cfg!(any(target_os = "macos", target_os = "linux")) {
						compiler.clone()
					} else {
						"ld".to_owned()
					}
				}
			},
		};

		let cflags = if settings.global_cflags.is_empty() {
			file.cflags.unwrap_or_default()
		} else {
			settings.global_cflags.clone()
		};
		let ldflags = if settings.global_ldflags.is_empty() {
			file.ldflags.unwrap_or_default()
		} else {
			settings.global_ldflags.clone()
		};

		log::debug!("toolchain: compiler={} archiver={} linker={} family={:?}", compiler, archiver, linker, family);

		Toolchain { compiler, archiver, linker, family, cflags, ldflags }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn family_identification() {
		assert_eq!(identify_family("cl"), Family::Msvc);
		assert_eq!(identify_family("cl.exe"), Family::Msvc);
		assert_eq!(identify_family("clang"), Family::Gnu);
		assert_eq!(identify_family("clang-cl"), Family::Gnu);
		assert_eq!(identify_family("gcc"), Family::Gnu);
		assert_eq!(identify_family("cc"), Family::Gnu);
		assert_eq!(identify_family("/usr/bin/gcc-13"), Family::Gnu);
	}

	#[test]
	fn explicit_settings_win_over_defaults() {
		let settings = Settings {
			compiler_exe: Some("cl".to_owned()),
			..Settings::default()
		};
		let tc = Toolchain::resolve(&settings);
		assert_eq!(tc.family, Family::Msvc);
		assert_eq!(tc.archiver, "lib");
	}

	#[test]
	fn toolchain_file_fills_unset_tools() {
		use std::io::Write;
		let mut file = tempfile::NamedTempFile::new().expect("temp file");
		write!(file, "compiler = \"cl\"\narchiver = \"llvm-lib\"\n").expect("write toolchain file");

		let settings = Settings {
			toolchain_file: Some(file.path().to_owned()),
			..Settings::default()
		};
		let tc = Toolchain::resolve(&settings);
		assert_eq!(tc.compiler, "cl");
		assert_eq!(tc.family, Family::Msvc);
		assert_eq!(tc.archiver, "llvm-lib");

		// An explicit setter still wins over the file.
		let settings = Settings {
			toolchain_file: Some(file.path().to_owned()),
			compiler_exe: Some("gcc".to_owned()),
			..Settings::default()
		};
		let tc = Toolchain::resolve(&settings);
		assert_eq!(tc.compiler, "gcc");
		assert_eq!(tc.family, Family::Gnu);
	}

	#[cfg(unix)]
	#[test]
	fn toolchain_file_flags_reach_the_command_lines() {
		use std::io::Write;
		use std::path::Path;

		let mut file = tempfile::NamedTempFile::new().expect("temp file");
		write!(
			file,
			"compiler = \"gcc\"\nlinker = \"gcc\"\ncflags = [\"-O2\", \"-Wall\"]\nldflags = [\"-flto\"]\n"
		)
		.expect("write toolchain file");

		let settings = Settings {
			toolchain_file: Some(file.path().to_owned()),
			..Settings::default()
		};
		let tc = Toolchain::resolve(&settings);
		assert_eq!(tc.cflags, vec!["-O2", "-Wall"]);
		assert_eq!(tc.ldflags, vec!["-flto"]);

		let t = crate::target::Target::new("m", crate::target::TargetKind::Executable, Path::new("build"));
		let compile = synth::compile_line(&tc, &settings, &t, "m.c", Path::new("build/obj_m/m.o"));
		assert_eq!(compile, "\"gcc\" -c -o \"build/obj_m/m.o\" -O2 -Wall \"m.c\"");
		let link = synth::link_line(&tc, &t, &[], &[]);
		assert_eq!(link, "gcc -o build/m -flto");

		// Flags added on the build replace the file's.
		let settings = Settings {
			toolchain_file: Some(file.path().to_owned()),
			global_cflags: vec!["-g".to_owned()],
			global_ldflags: vec!["-static".to_owned()],
			..Settings::default()
		};
		let tc = Toolchain::resolve(&settings);
		assert_eq!(tc.cflags, vec!["-g"]);
		assert_eq!(tc.ldflags, vec!["-static"]);
	}

	#[cfg(any(target_os = "macos", target_os = "linux"))]
	#[test]
	fn linker_defaults_to_compiler_on_unix() {
		let settings = Settings {
			compiler_exe: Some("gcc".to_owned()),
			..Settings::default()
		};
		let tc = Toolchain::resolve(&settings);
		assert_eq!(tc.linker, "gcc");
		assert_eq!(tc.archiver, "ar");
	}
}
