use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the compute farm workspace",
    long_about = "A unified CLI for local sort runs, CI checks and Lambda packaging\n\
                  in the compute farm workspace."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sort a text file locally with the divide/build/merge pipeline
    LocalSort {
        /// Text file to sort
        #[arg(long)]
        input: String,
        /// Sorted output path
        #[arg(long)]
        output: Option<String>,
        /// Split depth (2^max_level leaves)
        #[arg(long, default_value_t = 3)]
        max_level: usize,
    },
    /// Run CI checks (fmt, clippy, tests)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
    /// Build and package the activity runtime Lambda for Terraform inputs
    ServerlessPackage {
        /// Compilation target triple for Lambda binaries
        #[arg(long, default_value = "x86_64-unknown-linux-gnu")]
        target: String,
        /// Build profile used for binaries
        #[arg(value_enum, long, default_value_t = BuildProfile::Release)]
        profile: BuildProfile,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting, clippy, and tests
    Check,
    /// Sort a generated dictionary end to end
    Smoke,
    /// Run check + smoke
    All,
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

// ── helpers ────────────────────────────────────────────────────────

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

fn local_sort(input: &str, output: Option<&str>, max_level: usize) {
    let level = max_level.to_string();
    let mut args: Vec<&str> = vec![
        "run",
        "-p",
        "compute_farm_lambda",
        "--bin",
        "farm_local",
        "--release",
        "--",
        "--input",
        input,
        "--max-level",
        &level,
    ];
    if let Some(path) = output {
        args.push("--output");
        args.push(path);
    }
    run_cargo(&args);
}

fn package_serverless_lambdas(target: &str, profile: BuildProfile) {
    ensure_rust_target_installed(target);

    step("Build activity runtime binary");

    let mut cargo_args = vec![
        "build",
        "-p",
        "compute_farm_lambda",
        "--target",
        target,
        "--bin",
        "farm_runtime",
    ];
    if let Some(flag) = profile.as_cargo_flag() {
        cargo_args.push(flag);
    }
    run_cargo(&cargo_args);

    step("Package Terraform lambda zip artifact");
    let target_dir = Path::new("target").join(target).join(profile.dir_name());
    let dist_dir = Path::new("infra/compute_farm/dist");
    fs::create_dir_all(dist_dir).expect("failed to create lambda dist directory");

    package_lambda_zip(
        &target_dir.join(binary_name("farm_runtime", target)),
        &dist_dir.join("runtime.zip"),
    );

    eprintln!(
        "\nPackaged artifact:\n- {}",
        dist_dir.join("runtime.zip").display()
    );
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
            "required rust target `{target}` is not installed. install it with `rustup target add {target}` and re-run `cargo run -p xtask -- serverless-package`"
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

fn package_lambda_zip(binary_path: &Path, zip_path: &Path) {
    if !binary_path.exists() {
        panic!("expected lambda binary at '{}'", binary_path.display());
    }

    let binary = fs::read(binary_path).expect("failed to read lambda binary");
    let file = fs::File::create(zip_path).expect("failed to create lambda zip");
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o755);
    zip.start_file("bootstrap", options)
        .expect("failed to start bootstrap entry in lambda zip");
    zip.write_all(&binary)
        .expect("failed to write bootstrap entry");
    zip.finish().expect("failed to finish lambda zip");
}

fn write_smoke_dictionary(path: &Path, count: usize) {
    const WORDS: [&str; 6] = ["delta", "Alpha", "charlie", "echo", "Bravo", "foxtrot"];
    let mut body = String::new();
    for index in 0..count {
        body.push_str(WORDS[(index * 7 + 3) % WORDS.len()]);
        body.push_str(&(count - index).to_string());
        body.push('\n');
    }
    fs::write(path, body).expect("failed to write smoke dictionary");
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_check() {
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

    step("Test compute_farm_core");
    run_cargo(&["test", "-p", "compute_farm_core"]);

    step("Test compute_farm_lambda");
    run_cargo(&["test", "-p", "compute_farm_lambda"]);
}

fn ci_smoke() {
    let work_dir = Path::new("target/compute-farm-smoke");
    fs::create_dir_all(work_dir).expect("failed to create smoke directory");
    let input = work_dir.join("dictionary.txt");
    write_smoke_dictionary(&input, 5_000);

    step("Sort smoke dictionary (max_level = 4)");
    let input = input.to_string_lossy().into_owned();
    run_cargo(&[
        "run",
        "-p",
        "compute_farm_lambda",
        "--bin",
        "farm_local",
        "--",
        "--input",
        &input,
        "--work-dir",
        "target/compute-farm-smoke",
        "--max-level",
        "4",
        "--no-progress",
    ]);
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::LocalSort {
            input,
            output,
            max_level,
        } => {
            local_sort(&input, output.as_deref(), max_level);
        }
        Commands::Ci { job } => {
            match job {
                CiJob::Check => ci_check(),
                CiJob::Smoke => ci_smoke(),
                CiJob::All => {
                    ci_check();
                    ci_smoke();
                }
            }
            eprintln!("\nCI job passed.");
        }
        Commands::ServerlessPackage { target, profile } => {
            package_serverless_lambdas(&target, profile);
        }
    }
}
