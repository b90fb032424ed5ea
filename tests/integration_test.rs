use assert_cmd::Command;
use assert_cmd::cargo;
use flate2::Compression;
use flate2::write::GzEncoder;
use mockito::Server;
use mta_shim::platform::PlatformKey;
use predicates::prelude::*;
use std::fs;
use std::io::prelude::*;
use std::path::Path;
use tar::Builder;
use tempfile::tempdir;

const CLOUD_MTA: &str = r#"{
  "name": "cloud-mta",
  "version": "1.2.3",
  "description": "MTA tool",
  "main": "index.js",
  "bin": {
    "mta": "./bin/mta"
  },
  "scripts": {
    "install": "node install.js",
    "test": "node test.js"
  },
  "dependencies": {
    "binwrap": "^1.0.0"
  }
}"#;

fn create_tar_gz(files: &[(&str, &str, u32)]) -> Vec<u8> {
    let mut tar_builder = Builder::new(Vec::new());
    for (name, content, mode) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_path(name).unwrap();
        header.set_mode(*mode);
        header.set_cksum();
        tar_builder.append(&header, content.as_bytes()).unwrap();
    }
    let tar = tar_builder.into_inner().unwrap();

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar).unwrap();
    encoder.finish().unwrap()
}

fn shim() -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("mta-shim"));
    cmd.env_remove("GITHUB_TOKEN")
        .env_remove("MTA_SHIM_MANIFEST")
        .env_remove("MTA_SHIM_RELEASE_URL")
        .env_remove("MTA_SHIM_PLATFORMS");
    cmd
}

fn write_manifest(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("package.json");
    fs::write(&path, CLOUD_MTA).unwrap();
    path
}

/// Platform list containing only the host, served as Host.tar.gz.
fn host_platforms() -> String {
    format!("{}=Host.tar.gz", PlatformKey::detect())
}

#[test]
fn test_local_variant_with_relocated_downloader() {
    let dir = tempdir().unwrap();
    let manifest = write_manifest(dir.path());

    shim()
        .arg("local")
        .arg("--relocate-downloader")
        .arg("--manifest")
        .arg(&manifest)
        .assert()
        .success()
        .stdout(predicate::str::contains("cloud-mta -> mta-local"));

    assert_eq!(
        fs::read_to_string(&manifest).unwrap(),
        r#"{
  "name": "mta-local",
  "version": "1.2.3",
  "description": "MTA tool",
  "main": "index.js",
  "scripts": {
    "test": "node test.js"
  },
  "dependencies": {},
  "devDependencies": {
    "binwrap": "^1.0.0"
  }
}"#
    );
}

#[test]
fn test_local_variant_twice_is_stable() {
    let dir = tempdir().unwrap();
    let manifest = write_manifest(dir.path());

    shim()
        .args(["local", "--manifest"])
        .arg(&manifest)
        .assert()
        .success();
    let once = fs::read_to_string(&manifest).unwrap();

    shim()
        .args(["local", "--manifest"])
        .arg(&manifest)
        .assert()
        .success();
    assert_eq!(fs::read_to_string(&manifest).unwrap(), once);
}

#[test]
fn test_local_variant_missing_dependency_fails_without_writing() {
    let dir = tempdir().unwrap();
    let manifest = dir.path().join("package.json");
    let original = r#"{"name": "cloud-mta", "scripts": {}, "dependencies": {}}"#;
    fs::write(&manifest, original).unwrap();

    shim()
        .args(["local", "--relocate-downloader", "--manifest"])
        .arg(&manifest)
        .assert()
        .failure()
        .stderr(predicate::str::contains("binwrap"));

    assert_eq!(fs::read_to_string(&manifest).unwrap(), original);
}

#[test]
fn test_set_main() {
    let dir = tempdir().unwrap();
    let manifest = write_manifest(dir.path());

    shim()
        .args(["set-main", "dist/index.js", "--manifest"])
        .arg(&manifest)
        .assert()
        .success();
    assert!(
        fs::read_to_string(&manifest)
            .unwrap()
            .contains(r#""main": "dist/index.js""#)
    );

    shim()
        .args(["set-main", "--manifest"])
        .arg(&manifest)
        .assert()
        .success();
    assert!(
        fs::read_to_string(&manifest)
            .unwrap()
            .contains(r#""main": "index.js""#)
    );
}

#[test]
fn test_urls_current_and_legacy() {
    let dir = tempdir().unwrap();
    let manifest = write_manifest(dir.path());
    let base = "https://github.com/SAP/cloud-mta/releases/download/v1.2.3/cloud-mta_1.2.3_";

    shim()
        .args(["urls", "--manifest"])
        .arg(&manifest)
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "darwin-arm64\t{}Darwin_arm64.tar.gz",
            base
        )))
        .stdout(predicate::str::contains(format!(
            "darwin-x64\t{}Darwin_amd64.tar.gz",
            base
        )))
        .stdout(predicate::str::contains(format!(
            "linux-x64\t{}Linux_amd64.tar.gz",
            base
        )))
        .stdout(predicate::str::contains(format!(
            "win32-x64\t{}Windows_amd64.tar.gz",
            base
        )));

    shim()
        .args(["urls", "--platforms", "legacy", "--manifest"])
        .arg(&manifest)
        .assert()
        .success()
        .stdout(predicate::str::contains("darwin-arm64").not())
        .stdout(predicate::str::contains("linux-x64"));
}

#[test]
fn test_install_downloads_and_unpacks() {
    let mut server = Server::new();
    let binary = PlatformKey::detect().executable_name("mta");
    let archive = create_tar_gz(&[(&binary, "#!/bin/sh\nexit 0\n", 0o755), ("LICENSE", "Apache-2.0", 0o644)]);
    let download = server
        .mock("GET", "/v1.2.3/cloud-mta_1.2.3_Host.tar.gz")
        .with_status(200)
        .with_body(&archive)
        .create();

    let dir = tempdir().unwrap();
    let manifest = write_manifest(dir.path());

    shim()
        .args(["install", "--manifest"])
        .arg(&manifest)
        .args(["--release-url", &server.url()])
        .args(["--platforms", &host_platforms()])
        .assert()
        .success();

    download.assert();
    let installed = dir.path().join("unpacked_bin").join(&binary);
    assert!(installed.exists());
    assert!(dir.path().join("unpacked_bin").join("LICENSE").exists());
    assert!(!dir.path().join("cloud-mta_1.2.3_Host.tar.gz").exists());
}

#[test]
fn test_install_missing_binary_fails() {
    let mut server = Server::new();
    let archive = create_tar_gz(&[("README.md", "nothing", 0o644), ("LICENSE", "x", 0o644)]);
    let _download = server
        .mock("GET", "/v1.2.3/cloud-mta_1.2.3_Host.tar.gz")
        .with_status(200)
        .with_body(&archive)
        .create();

    let dir = tempdir().unwrap();
    let manifest = write_manifest(dir.path());

    shim()
        .args(["install", "--manifest"])
        .arg(&manifest)
        .args(["--release-url", &server.url()])
        .args(["--platforms", &host_platforms()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));

    assert!(!dir.path().join("unpacked_bin").exists());
}

#[test]
fn test_install_unsupported_platform() {
    let dir = tempdir().unwrap();
    let manifest = write_manifest(dir.path());

    shim()
        .args(["install", "--manifest"])
        .arg(&manifest)
        .args(["--release-url", "http://127.0.0.1:9"])
        .args(["--platforms", "plan9-mips=Plan9_mips.tar.gz"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported platform"));
}

#[test]
fn test_install_release_not_found() {
    let mut server = Server::new();
    let download = server
        .mock("GET", "/v1.2.3/cloud-mta_1.2.3_Host.tar.gz")
        .with_status(404)
        .expect(1)
        .create();

    let dir = tempdir().unwrap();
    let manifest = write_manifest(dir.path());

    shim()
        .args(["install", "--manifest"])
        .arg(&manifest)
        .args(["--release-url", &server.url()])
        .args(["--platforms", &host_platforms()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Release asset not found"));

    download.assert();
}

#[cfg(unix)]
#[test]
fn test_run_installs_on_first_use_and_forwards_exit_code() {
    let mut server = Server::new();
    let script = "#!/bin/sh\necho \"mta $@\"\nexit 5\n";
    let archive = create_tar_gz(&[("mta", script, 0o755), ("LICENSE", "Apache-2.0", 0o644)]);
    let download = server
        .mock("GET", "/v1.2.3/cloud-mta_1.2.3_Host.tar.gz")
        .with_status(200)
        .with_body(&archive)
        .expect(1)
        .create();

    let dir = tempdir().unwrap();
    let manifest = write_manifest(dir.path());

    for _ in 0..2 {
        shim()
            .args(["run", "--manifest"])
            .arg(&manifest)
            .args(["--release-url", &server.url()])
            .args(["--platforms", &host_platforms()])
            .args(["--", "validate", "-m", "mta.yaml"])
            .assert()
            .code(5)
            .stdout(predicate::str::contains("mta validate -m mta.yaml"));
    }

    // Second run reuses the unpacked binary
    download.assert();
}

#[test]
fn test_check_reports_unreachable_urls() {
    let mut server = Server::new();
    let _linux = server
        .mock("HEAD", "/v1.2.3/cloud-mta_1.2.3_Linux_amd64.tar.gz")
        .with_status(200)
        .create();
    let _windows = server
        .mock("HEAD", "/v1.2.3/cloud-mta_1.2.3_Windows_amd64.tar.gz")
        .with_status(404)
        .create();

    let dir = tempdir().unwrap();
    let manifest = write_manifest(dir.path());

    shim()
        .args(["check", "--manifest"])
        .arg(&manifest)
        .args(["--release-url", &server.url()])
        .args([
            "--platforms",
            "linux-x64=Linux_amd64.tar.gz,win32-x64=Windows_amd64.tar.gz",
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains("ok\tlinux-x64"))
        .stdout(predicate::str::contains("FAILED\twin32-x64"))
        .stderr(predicate::str::contains("Unreachable release URLs"));
}
