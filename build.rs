fn main() {
    println!("cargo:rerun-if-env-changed=FFMPEG_DIR");

    #[cfg(target_os = "windows")]
    windows::stage_ffmpeg_dlls();
}

/// Puts the FFmpeg runtime libraries the audio path needs (demux, decode,
/// resample) next to the built binary.
#[cfg(target_os = "windows")]
mod windows {
    use std::path::{Path, PathBuf};
    use std::time::SystemTime;

    const AUDIO_LIBRARIES: [&str; 4] = ["avcodec-", "avformat-", "avutil-", "swresample-"];

    pub fn stage_ffmpeg_dlls() {
        let bin_dir = std::env::var_os("FFMPEG_DIR")
            .map(|dir| PathBuf::from(dir).join("bin"))
            .unwrap_or_else(|| PathBuf::from("third_party/ffmpeg/bin"));
        println!("cargo:rerun-if-changed={}", bin_dir.display());

        let Some(profile_dir) = profile_dir() else {
            println!("cargo:warning=Cannot locate the target directory, FFmpeg DLLs not staged");
            return;
        };

        let entries = match std::fs::read_dir(&bin_dir) {
            Ok(entries) => entries,
            Err(e) => {
                println!("cargo:warning=FFmpeg DLLs not found at {}: {}", bin_dir.display(), e);
                return;
            }
        };

        for dll in entries.flatten().map(|e| e.path()).filter(|p| is_audio_library(p)) {
            let Some(name) = dll.file_name() else {
                continue;
            };
            let staged = profile_dir.join(name);
            if staged.exists() && modified(&staged) >= modified(&dll) {
                continue;
            }
            match std::fs::copy(&dll, &staged) {
                Ok(_) => println!("cargo:warning=Staged {}", dll.display()),
                Err(e) => println!("cargo:warning=Cannot copy {}: {}", dll.display(), e),
            }
        }
        println!("cargo:rustc-link-search=native={}", bin_dir.display());
    }

    /// `target/<profile>/`, three levels above `OUT_DIR`
    fn profile_dir() -> Option<PathBuf> {
        let out_dir = PathBuf::from(std::env::var_os("OUT_DIR")?);
        out_dir.ancestors().nth(3).map(Path::to_path_buf)
    }

    fn modified(path: &Path) -> SystemTime {
        std::fs::metadata(path)
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH)
    }

    fn is_audio_library(path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        let name = name.to_ascii_lowercase();
        name.ends_with(".dll") && AUDIO_LIBRARIES.iter().any(|prefix| name.starts_with(prefix))
    }
}
