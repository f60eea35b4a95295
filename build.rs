use std::{error::Error, process::Command};
use vergen::EmitBuilder;

// Emits VERGEN_BUILD_TIMESTAMP, plus VERGEN_GIT_SHA inside a git checkout.
// The crate reads both with option_env!, so builds from a source tarball work.
fn main() -> Result<(), Box<dyn Error>> {
    let in_git_checkout = Command::new("git")
        .args(["rev-parse", "--git-dir"])
        .output()
        .is_ok_and(|output| output.status.success());

    let mut builder = EmitBuilder::builder();
    builder.build_timestamp();
    if in_git_checkout {
        builder.git_sha(true);
    }
    builder.emit()?;

    Ok(())
}
