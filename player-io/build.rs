//! Build script for compiling the PlayerIO protobuf schema

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = prost_build::Config::new();
    config.type_attribute(".", "#[allow(clippy::derive_partial_eq_without_eq)]");

    config.compile_protos(&["proto/messages.proto"], &["proto/"])?;

    println!("cargo:rerun-if-changed=proto/messages.proto");

    Ok(())
}
