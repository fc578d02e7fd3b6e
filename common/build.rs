fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Fall back to the bundled protoc when the environment does not name one.
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }

    // Compile the proto files via `prost`, generating service stubs
    // and proto definitions for use with `tonic`.
    tonic_build::compile_protos("../protos/coordinator.proto")?;
    Ok(())
}
