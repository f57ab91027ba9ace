//! Compiler, archiver, and linker command lines, synthesized as single shell
//! lines keyed on the compiler family. The scheduler and the compile-commands
//! exporter both go through here, so recorded and executed lines are
//! byte-identical.

use std::path::Path;

use super::{Family, Toolchain};
use crate::{settings::Settings, target::Target, target::TargetKind};

// Per-target cflags replace the global ones outright (override, not append).
fn effective_cflags(tc: &Toolchain, t: &Target) -> String {
	match &t.cflags {
		Some(flags) if !flags.is_empty() => flags.clone(),
		_ => tc.cflags.join(" "),
	}
}

pub(crate) fn compile_line(tc: &Toolchain, settings: &Settings, t: &Target, src: &str, obj: &Path) -> String {
	let mut cmd = format!("\"{}\" ", tc.compiler);
	match tc.family {
		Family::Msvc => {
			cmd += &format!("/c /nologo /Fo\"{}\" ", obj.display());
			cmd += "/showIncludes ";
		}
		Family::Gnu => {
			cmd += &format!("-c -o \"{}\" ", obj.display());
		}
	}

	let cflags = effective_cflags(tc, t);
	if !cflags.is_empty() {
		cmd += &cflags;
		cmd += " ";
	}

	for inc in &t.include_dirs {
		match tc.family {
			Family::Msvc => cmd += &format!("/I \"{}\" ", inc),
			Family::Gnu => cmd += &format!("-I\"{}\" ", inc),
		}
	}

	// Global defines first, then per-target ones.
	for def in settings.global_defines.iter().chain(t.defines.iter()) {
		match tc.family {
			Family::Msvc => cmd += &format!("/D{} ", def),
			Family::Gnu => cmd += &format!("-D{} ", def),
		}
	}

	cmd += &format!("\"{}\"", src);
	cmd
}

pub(crate) fn archive_line(tc: &Toolchain, t: &Target, objs: &[std::path::PathBuf]) -> String {
	let mut cmd = match tc.family {
		Family::Msvc => format!("{} /OUT:{}", tc.archiver, t.output_path.display()),
		Family::Gnu => format!("{} rcs {}", tc.archiver, t.output_path.display()),
	};
	for obj in objs {
		cmd += &format!(" {}", obj.display());
	}
	cmd
}

pub(crate) fn link_line(tc: &Toolchain, t: &Target, objs: &[std::path::PathBuf], deps: &[&Target]) -> String {
	let mut cmd = format!("{} -o {}", tc.linker, t.output_path.display());
	for obj in objs {
		cmd += &format!(" {}", obj.display());
	}
	for dir in &t.library_dirs {
		match tc.family {
			Family::Msvc => cmd += &format!(" /LIBPATH:\"{}\"", dir),
			Family::Gnu => cmd += &format!(" -L\"{}\"", dir),
		}
	}
	for lib in &t.link_libs {
		match tc.family {
			Family::Msvc => cmd += &format!(" {}.lib", lib),
			Family::Gnu => cmd += &format!(" -l{}", lib),
		}
	}
	// Library artifacts built by dependency targets are linked by path.
	for dep in deps {
		if dep.links_as_artifact() {
			cmd += &format!(" {}", dep.output_path.display());
		}
	}
	if let Some(ldflags) = &t.ldflags {
		cmd += &format!(" {}", ldflags);
	}
	if !tc.ldflags.is_empty() {
		cmd += &format!(" {}", tc.ldflags.join(" "));
	}
	if t.kind == TargetKind::SharedLibrary {
		match tc.family {
			Family::Msvc => cmd += " /DLL",
			Family::Gnu => cmd += " -shared",
		}
	}
	cmd
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::path::{Path, PathBuf};

	fn gnu_toolchain() -> Toolchain {
		Toolchain {
			compiler: "cc".to_owned(),
			archiver: "ar".to_owned(),
			linker: "cc".to_owned(),
			family: Family::Gnu,
			cflags: Vec::new(),
			ldflags: Vec::new(),
		}
	}

	fn msvc_toolchain() -> Toolchain {
		Toolchain {
			compiler: "cl".to_owned(),
			archiver: "lib".to_owned(),
			linker: "link".to_owned(),
			family: Family::Msvc,
			cflags: Vec::new(),
			ldflags: Vec::new(),
		}
	}

	#[test]
	fn gnu_compile_line_shape() {
		let mut tc = gnu_toolchain();
		tc.cflags.push("-O2".to_owned());
		let mut settings = Settings::default();
		settings.global_defines.push("NDEBUG".to_owned());

		let mut t = Target::new("math", TargetKind::StaticLibrary, Path::new("build"));
		t.include_dirs.push("include".to_owned());
		t.defines.push("FEATURE=1".to_owned());

		let line = compile_line(&tc, &settings, &t, "src/math.c", Path::new("build/obj_math/math.o"));
		assert_eq!(
			line,
			"\"cc\" -c -o \"build/obj_math/math.o\" -O2 -I\"include\" -DNDEBUG -DFEATURE=1 \"src/math.c\""
		);
	}

	#[test]
	fn msvc_compile_line_shape() {
		let tc = msvc_toolchain();
		let settings = Settings::default();
		let t = Target::new("math", TargetKind::StaticLibrary, Path::new("build"));

		let line = compile_line(&tc, &settings, &t, "math.c", Path::new("build/obj_math/math.o"));
		assert_eq!(line, "\"cl\" /c /nologo /Fo\"build/obj_math/math.o\" /showIncludes \"math.c\"");
	}

	#[test]
	fn target_cflags_replace_global_cflags() {
		let mut tc = gnu_toolchain();
		tc.cflags.push("-O2".to_owned());
		let settings = Settings::default();

		let mut t = Target::new("app", TargetKind::Executable, Path::new("build"));
		t.cflags = Some("-g -O0".to_owned());

		let line = compile_line(&tc, &settings, &t, "app.c", Path::new("build/obj_app/app.o"));
		assert_eq!(line, "\"cc\" -c -o \"build/obj_app/app.o\" -g -O0 \"app.c\"");
	}

	#[test]
	fn archive_lines_per_family() {
		let t = Target::new("math", TargetKind::StaticLibrary, Path::new("build"));
		let objs = vec![PathBuf::from("build/obj_math/math.o")];
		assert_eq!(
			archive_line(&gnu_toolchain(), &t, &objs),
			"ar rcs build/libmath.a build/obj_math/math.o"
		);
		let t_win = Target {
			output_path: PathBuf::from("build/math.lib"),
			..Target::new("math", TargetKind::StaticLibrary, Path::new("build"))
		};
		assert_eq!(
			archive_line(&msvc_toolchain(), &t_win, &objs),
			"lib /OUT:build/math.lib build/obj_math/math.o"
		);
	}

	#[test]
	fn link_line_orders_dirs_libs_deps_flags() {
		let mut tc = gnu_toolchain();
		tc.ldflags.push("-flto".to_owned());

		let dep = Target {
			output_path: PathBuf::from("build/libmath.a"),
			..Target::new("math", TargetKind::StaticLibrary, Path::new("build"))
		};
		let mut t = Target::new("app", TargetKind::Executable, Path::new("build"));
		t.library_dirs.push("/opt/lib".to_owned());
		t.link_libs.push("m".to_owned());
		t.ldflags = Some("-rdynamic".to_owned());

		let objs = vec![PathBuf::from("build/obj_app/app.o")];
		let line = link_line(&tc, &t, &objs, &[&dep]);
		assert_eq!(
			line,
			"cc -o build/app build/obj_app/app.o -L\"/opt/lib\" -lm build/libmath.a -rdynamic -flto"
		);
	}

	#[test]
	fn shared_library_gets_shared_flag() {
		let tc = gnu_toolchain();
		let t = Target {
			output_path: PathBuf::from("build/libway.so"),
			..Target::new("way", TargetKind::SharedLibrary, Path::new("build"))
		};
		let objs = vec![PathBuf::from("build/obj_way/way.o")];
		let line = link_line(&tc, &t, &objs, &[]);
		assert!(line.ends_with(" -shared"));
		assert!(line.starts_with("cc -o build/libway.so"));
	}

	#[test]
	fn executable_deps_are_not_linked_by_path() {
		let tc = gnu_toolchain();
		let dep = Target::new("tool", TargetKind::Executable, Path::new("build"));
		let t = Target::new("app", TargetKind::Executable, Path::new("build"));
		let line = link_line(&tc, &t, &[], &[&dep]);
		assert_eq!(line, "cc -o build/app");
	}
}
