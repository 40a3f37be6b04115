use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const LAMBDA_PACKAGE: &str = "bucket_lifecycle_lambda";
const LAMBDA_BINARY: &str = "bucket_lifecycle";

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the bucket lifecycle workspace",
    long_about = "A unified CLI for CI checks and packaging the bucket lifecycle\n\
                  custom-resource Lambda."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run CI checks (fmt, clippy, tests)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
    /// Build and package the Lambda as a `bootstrap` zip
    Package {
        /// Compilation target triple for the Lambda binary
        #[arg(long, default_value = "x86_64-unknown-linux-gnu")]
        target: String,
        /// Build profile used for the binary
        #[arg(value_enum, long, default_value_t = BuildProfile::Release)]
        profile: BuildProfile,
        /// Directory the zip is written to
        #[arg(long, default_value = "dist")]
        out_dir: String,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting and clippy
    Lint,
    /// Unit and integration tests
    Test,
    /// Lint + test
    Check,
}

#[derive(Clone, Copy, ValueEnum)]
enum BuildProfile {
    Debug,
    Release,
}

impl BuildProfile {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }

    fn as_cargo_flag(self) -> Option<&'static str> {
        match self {
            Self::Debug => None,
            Self::Release => Some("--release"),
        }
    }
}

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn cargo(args: &[&str]) -> ExitStatus {
    eprintln!("+ cargo {}", args.join(" "));
    Command::new("cargo")
        .args(args)
        .status()
        .expect("failed to execute cargo")
}

fn run_cargo(args: &[&str]) {
    let status = cargo(args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn package_lambda(target: &str, profile: BuildProfile, out_dir: &str) {
    ensure_rust_target_installed(target);

    step("Build lambda binary");
    let mut cargo_args = vec![
        "build",
        "-p",
        LAMBDA_PACKAGE,
        "--target",
        target,
        "--bin",
        LAMBDA_BINARY,
    ];
    if let Some(flag) = profile.as_cargo_flag() {
        cargo_args.push(flag);
    }
    run_cargo(&cargo_args);

    step("Package lambda zip artifact");
    let target_dir = Path::new("target").join(target).join(profile.dir_name());
    let dist_dir = Path::new(out_dir);
    fs::create_dir_all(dist_dir).expect("failed to create lambda dist directory");

    let zip_path = dist_dir.join(format!("{LAMBDA_BINARY}.zip"));
    package_lambda_zip(&target_dir.join(binary_name(LAMBDA_BINARY, target)), &zip_path);

    eprintln!("\nPackaged artifact:\n- {}", zip_path.display());
}

fn ensure_rust_target_installed(target: &str) {
    let output = Command::new("rustup")
        .args(["target", "list", "--installed"])
        .output();

    let output = match output {
        Ok(value) => value,
        Err(error) => {
            eprintln!(
                "warning: failed to run `rustup target list --installed` ({error}); continuing without target preflight"
            );
            return;
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!(
            "failed to list installed rust targets; run `rustup target list --installed` manually. details: {}",
            stderr.trim()
        );
    }

    let installed = String::from_utf8_lossy(&output.stdout);
    if !installed.lines().any(|line| line.trim() == target) {
        panic!(
            "required rust target `{target}` is not installed. install it with `rustup target add {target}` and re-run `cargo run -p xtask -- package`"
        );
    }
}

fn binary_name(bin_name: &str, target: &str) -> String {
    if target.contains("windows") {
        format!("{bin_name}.exe")
    } else {
        bin_name.to_string()
    }
}

/// The `provided.al2023` runtime executes a file called `bootstrap` at the
/// root of the archive.
fn package_lambda_zip(binary_path: &Path, zip_path: &Path) {
    if !binary_path.exists() {
        panic!(
            "no `{LAMBDA_BINARY}` binary at '{}' to ship as `bootstrap`; did the build step run for this target?",
            binary_path.display()
        );
    }

    let binary = fs::read(binary_path).unwrap_or_else(|error| {
        panic!("failed to read `{LAMBDA_BINARY}` binary for the bootstrap entry: {error}")
    });
    let file = fs::File::create(zip_path).unwrap_or_else(|error| {
        panic!("failed to create '{}': {error}", zip_path.display())
    });
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o755);
    zip.start_file("bootstrap", options)
        .unwrap_or_else(|error| panic!("failed to add `bootstrap` to '{}': {error}", zip_path.display()));
    zip.write_all(&binary)
        .unwrap_or_else(|error| panic!("failed to write `bootstrap` ({} bytes): {error}", binary.len()));
    zip.finish()
        .unwrap_or_else(|error| panic!("failed to finalize '{}': {error}", zip_path.display()));
}

fn ci_lint() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);
}

fn ci_test() {
    step("Test bucket_lifecycle_core");
    run_cargo(&["test", "-p", "bucket_lifecycle_core"]);

    step("Test bucket_lifecycle_lambda");
    run_cargo(&["test", "-p", LAMBDA_PACKAGE]);
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ci { job } => {
            match job {
                CiJob::Lint => ci_lint(),
                CiJob::Test => ci_test(),
                CiJob::Check => {
                    ci_lint();
                    ci_test();
                }
            }
            eprintln!("\nCI job passed.");
        }
        Commands::Package {
            target,
            profile,
            out_dir,
        } => {
            package_lambda(&target, profile, &out_dir);
        }
    }
}
