use std::env;

fn main() {
    println!("cargo:rerun-if-env-changed=FFMPEG_DIR");

    // On unix targets ffmpeg-sys-next locates FFmpeg through pkg-config; on
    // Windows it needs FFMPEG_DIR pointing at an FFmpeg install. Surface
    // that early instead of letting the sys crate fail with a linker error.
    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    if target_os == "windows" && env::var_os("FFMPEG_DIR").is_none() {
        println!(
            "cargo:warning=framesift links against the FFmpeg libraries; set FFMPEG_DIR \
             to an FFmpeg install (e.g. <vcpkg root>\\installed\\x64-windows) so \
             ffmpeg-sys-next can find them."
        );
    }
}
