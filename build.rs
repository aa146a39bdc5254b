use std::env;
use std::process::Command;

fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn main() {
    let commit = command_output("git", &["rev-parse", "--short", "HEAD"]);
    let date = command_output("git", &["log", "-1", "--format=%cd", "--date=short"]);
    let rustc = env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    let rustc_version = command_output(&rustc, &["--version"]);

    let unknown = || "unknown".to_string();
    println!("cargo:rustc-env=GRAFT_GIT_COMMIT={}", commit.unwrap_or_else(unknown));
    println!("cargo:rustc-env=GRAFT_GIT_COMMIT_DATE={}", date.unwrap_or_else(unknown));
    println!("cargo:rustc-env=GRAFT_RUSTC_VERSION={}", rustc_version.unwrap_or_else(unknown));
    println!(
        "cargo:rustc-env=GRAFT_BUILD_PROFILE={}",
        env::var("PROFILE").unwrap_or_else(|_| unknown())
    );
    println!(
        "cargo:rustc-env=GRAFT_TARGET={}",
        env::var("TARGET").unwrap_or_else(|_| unknown())
    );

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=.git/HEAD");
}
