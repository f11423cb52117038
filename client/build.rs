use std::{env, fs, path::Path};

fn main() {
    // workspace version, tagged with the build profile for non-release builds
    let version = env::var("CARGO_PKG_VERSION").expect("CARGO_PKG_VERSION not set by cargo");
    let profile = env::var("PROFILE").unwrap_or_default();
    let version = match profile.as_str() {
        "release" | "" => version,
        other => format!("{version}-{other}"),
    };

    let out_dir = env::var("OUT_DIR").expect("OUT_DIR not set by cargo");
    let version_file_path = Path::new(&out_dir).join("version.rs");
    fs::write(&version_file_path, format!("pub const VERSION: &str = \"{version}\";"))
        .expect("Unable to write version file");

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=../Cargo.toml");
}
