use std::env;
use std::path::Path;

// `protoc` is not available in this build environment (and there is no network
// to install it), so we cannot run `tonic_build::compile_protos`. Instead we
// ship the already-generated bindings (proto/dispatch.rs.in) and copy them into
// OUT_DIR so the existing `tonic::include_proto!("dispatch")` call resolves.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/dispatch.rs.in");
    println!("cargo:rerun-if-changed=proto/dispatch.proto");

    let out_dir = env::var("OUT_DIR")?;
    let dest = Path::new(&out_dir).join("dispatch.rs");
    std::fs::copy("proto/dispatch.rs.in", &dest)?;
    Ok(())
}
