fn main() {
    println!("cargo:rerun-if-changed=proto/event.proto");
    std::env::set_var(
        "PROTOC",
        protoc_bin_vendored::protoc_bin_path().expect("vendored protoc binary"),
    );
    prost_build::compile_protos(&["proto/event.proto"], &["proto/"])
        .expect("failed to compile event.proto");
}
