//! Build script for build-relay
//!
//! Generates the gRPC client and server code for the build dispatch
//! protocol from `proto/build.proto` using tonic-build.

use std::env;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Rerun if the protocol definition changes
    println!("cargo:rerun-if-changed=proto/build.proto");

    // Prefer an explicitly configured protoc, otherwise use the vendored binary
    if env::var_os("PROTOC").is_none() {
        let protoc = protoc_bin_vendored::protoc_bin_path()?;
        env::set_var("PROTOC", protoc);
    }

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["proto/build.proto"], &["proto"])?;

    Ok(())
}
