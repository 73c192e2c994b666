use std::env;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use flate2::read::GzDecoder;
use tar::Archive;
use walkdir::WalkDir;
use zip::read::ZipArchive;

const DEFAULT_PDFIUM_VERSION: &str = "7350";
const DEFAULT_BASE_URL: &str = "https://github.com/bblanchon/pdfium-binaries/releases/download";

const WATCHED_ENV: &[&str] = &[
    "FOLIO_PDFIUM_SKIP_DOWNLOAD",
    "FOLIO_PDFIUM_ARCHIVE_PATH",
    "FOLIO_PDFIUM_VERSION",
    "FOLIO_PDFIUM_RELEASE_TAG",
    "FOLIO_PDFIUM_PLATFORM",
    "FOLIO_PDFIUM_BASE_URL",
    "FOLIO_FORCE_DOWNLOAD",
    "PDFIUM_DYNAMIC_LIB_PATH",
    "PDFIUM_STATIC_LIB_PATH",
];

/// Where to fetch pdfium from, resolved from the environment.
struct Fetch {
    version: String,
    release_tag: String,
    base_url: String,
    platform: String,
    force: bool,
}

impl Fetch {
    fn from_env(target_os: &str, target_arch: &str) -> Self {
        let version =
            env::var("FOLIO_PDFIUM_VERSION").unwrap_or_else(|_| DEFAULT_PDFIUM_VERSION.to_string());
        Self {
            release_tag: env::var("FOLIO_PDFIUM_RELEASE_TAG")
                .unwrap_or_else(|_| format!("chromium/{version}")),
            base_url: env::var("FOLIO_PDFIUM_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            platform: env::var("FOLIO_PDFIUM_PLATFORM")
                .unwrap_or_else(|_| platform_name(target_os, target_arch)),
            force: env::var_os("FOLIO_FORCE_DOWNLOAD").is_some(),
            version,
        }
    }

    fn archive_names(&self) -> [String; 4] {
        let (platform, version) = (&self.platform, &self.version);
        [
            format!("pdfium-{platform}.tgz"),
            format!("pdfium-{version}-{platform}.tgz"),
            format!("pdfium-{platform}.zip"),
            format!("pdfium-{version}-{platform}.zip"),
        ]
    }

    fn url(&self, name: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.release_tag.trim_matches('/'),
            name
        )
    }
}

fn main() -> Result<()> {
    println!("cargo:rerun-if-changed=build.rs");
    for var in WATCHED_ENV {
        println!("cargo:rerun-if-env-changed={var}");
    }

    if env::var_os("FOLIO_PDFIUM_SKIP_DOWNLOAD").is_some()
        || env::var_os("PDFIUM_DYNAMIC_LIB_PATH").is_some()
        || env::var_os("PDFIUM_STATIC_LIB_PATH").is_some()
    {
        return Ok(());
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR").context("OUT_DIR env var not set")?);
    let staging = out_dir.join("pdfium");
    fs::create_dir_all(&staging).context("failed to create staging directory")?;

    let target_os = env::var("CARGO_CFG_TARGET_OS").context("CARGO_CFG_TARGET_OS missing")?;
    let target_arch = env::var("CARGO_CFG_TARGET_ARCH").context("CARGO_CFG_TARGET_ARCH missing")?;

    let library = match find_library(&staging, &target_os) {
        Some(path) => path,
        None => {
            let archive = match env::var_os("FOLIO_PDFIUM_ARCHIVE_PATH") {
                Some(path) => PathBuf::from(path),
                None => download(&staging, &Fetch::from_env(&target_os, &target_arch))?,
            };
            unpack(&archive, &staging)?;
            find_library(&staging, &target_os)
                .with_context(|| format!("pdfium library not found in {:?}", staging))?
        }
    };

    let library = library
        .to_str()
        .ok_or_else(|| anyhow!("library path {:?} is not UTF-8", library))?;
    println!("cargo:rustc-env=FOLIO_PDFIUM_LIBRARY_PATH={library}");
    Ok(())
}

fn platform_name(target_os: &str, target_arch: &str) -> String {
    let os = match target_os {
        "macos" => "mac",
        other => other,
    };
    let arch = match target_arch {
        "aarch64" => "arm64",
        "x86_64" => "x64",
        other => other,
    };
    format!("{os}-{arch}")
}

fn find_library(root: &Path, target_os: &str) -> Option<PathBuf> {
    let name = match target_os {
        "windows" => "pdfium.dll",
        "macos" => "libpdfium.dylib",
        _ => "libpdfium.so",
    };
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .find(|entry| entry.file_name() == name)
        .map(|entry| entry.into_path())
}

fn download(staging: &Path, fetch: &Fetch) -> Result<PathBuf> {
    let downloads = staging.join("downloads");
    fs::create_dir_all(&downloads).context("failed to create download cache directory")?;

    let agent = ureq::AgentBuilder::new()
        .timeout_read(Duration::from_secs(120))
        .timeout_write(Duration::from_secs(120))
        .build();

    let mut failures = Vec::new();
    for name in fetch.archive_names() {
        let destination = downloads.join(&name);
        if destination.exists() && !fetch.force {
            return Ok(destination);
        }
        let url = fetch.url(&name);
        match agent.get(&url).call() {
            Ok(response) => {
                let mut file = File::create(&destination)
                    .with_context(|| format!("failed to create {:?}", destination))?;
                io::copy(&mut response.into_reader(), &mut file)
                    .with_context(|| format!("failed to write {:?}", destination))?;
                return Ok(destination);
            }
            Err(err) => failures.push(format!("{url}: {err}")),
        }
    }
    bail!(
        "failed to download pdfium {} for {}: {}",
        fetch.version,
        fetch.platform,
        failures.join("; ")
    )
}

fn unpack(archive: &Path, destination: &Path) -> Result<()> {
    // keep the download cache, drop any previous extraction
    for entry in fs::read_dir(destination)? {
        let path = entry?.path();
        if path.file_name().is_some_and(|name| name == "downloads") {
            continue;
        }
        if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        }
        .with_context(|| format!("failed to remove {:?}", path))?;
    }

    let file = File::open(archive).with_context(|| format!("failed to open {:?}", archive))?;
    match archive.extension().and_then(|ext| ext.to_str()) {
        Some("tgz") | Some("gz") => Archive::new(GzDecoder::new(file))
            .unpack(destination)
            .with_context(|| format!("failed to unpack {:?}", archive)),
        Some("zip") => ZipArchive::new(file)
            .and_then(|mut zip| zip.extract(destination))
            .with_context(|| format!("failed to extract {:?}", archive)),
        _ => bail!("unsupported archive format for {:?}", archive),
    }
}
