use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{ArgAction, ArgGroup, Parser};

use lzrescue::{merge_files, repair_file, split_file};

/// Data recovery tool for lzip compressed files.
#[derive(Parser)]
#[command(name = "lzrescue")]
#[command(version, about = "Data recovery tool for lzip compressed files")]
#[command(group(ArgGroup::new("mode").args(["merge", "repair", "split"])))]
struct Cli {
    /// Overwrite existing output files.
    #[arg(short, long)]
    force: bool,

    /// Correct errors in file using several copies.
    #[arg(short, long)]
    merge: bool,

    /// Place the output into <FILE>.
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Suppress all messages.
    #[arg(short, long)]
    quiet: bool,

    /// Try to repair a small error in file.
    #[arg(short = 'R', long)]
    repair: bool,

    /// Split a multimember file in single-member files.
    #[arg(short, long)]
    split: bool,

    /// Be verbose (a second -v gives more).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Files to operate on.
    #[arg(value_name = "FILES")]
    files: Vec<PathBuf>,
}

/// Insert `_fixed` before a `.lz`/`.tlz` suffix, else append `_fixed.lz`.
fn insert_fixed(name: &Path) -> PathBuf {
    let s = name.to_string_lossy();
    if s.len() > 4 && s.ends_with(".tlz") {
        PathBuf::from(format!("{}_fixed.tlz", &s[..s.len() - 4]))
    } else if s.len() > 3 && s.ends_with(".lz") {
        PathBuf::from(format!("{}_fixed.lz", &s[..s.len() - 3]))
    } else {
        PathBuf::from(format!("{s}_fixed.lz"))
    }
}

fn arg_error(msg: &str, verbosity: i32) -> ExitCode {
    if verbosity >= 0 {
        eprintln!("lzrescue: {msg}");
        eprintln!("Try 'lzrescue --help' for more information.");
    }
    ExitCode::from(1)
}

fn main() -> ExitCode {
    // an internal inconsistency must not look like a recovery verdict
    std::panic::set_hook(Box::new(|info| {
        eprintln!("lzrescue: internal error: {info}");
        std::process::exit(3);
    }));

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };
    let verbosity: i32 = if cli.quiet {
        -1
    } else {
        i32::from(cli.verbose.min(4))
    };

    let result = if cli.merge {
        if cli.files.len() < 2 {
            return arg_error("you must specify at least 2 files", verbosity);
        }
        let output = cli
            .output
            .clone()
            .unwrap_or_else(|| insert_fixed(&cli.files[0]));
        merge_files(&cli.files, &output, cli.force, verbosity)
    } else if cli.repair {
        if cli.files.len() != 1 {
            return arg_error("you must specify exactly 1 file", verbosity);
        }
        let output = cli
            .output
            .clone()
            .unwrap_or_else(|| insert_fixed(&cli.files[0]));
        repair_file(&cli.files[0], &output, cli.force, verbosity)
    } else if cli.split {
        if cli.files.len() != 1 {
            return arg_error("you must specify exactly 1 file", verbosity);
        }
        let suffix = cli
            .output
            .as_deref()
            .unwrap_or(&cli.files[0])
            .to_string_lossy()
            .into_owned();
        split_file(&cli.files[0], &suffix, cli.force, verbosity)
    } else {
        return arg_error(
            "you must specify the operation to be performed on file",
            verbosity,
        );
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if verbosity >= 0 {
                eprintln!("lzrescue: {e}");
            }
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_is_inserted_before_known_suffixes() {
        assert_eq!(
            insert_fixed(Path::new("archive.lz")),
            PathBuf::from("archive_fixed.lz")
        );
        assert_eq!(
            insert_fixed(Path::new("bundle.tlz")),
            PathBuf::from("bundle_fixed.tlz")
        );
    }

    #[test]
    fn fixed_is_appended_otherwise() {
        assert_eq!(
            insert_fixed(Path::new("archive.gz")),
            PathBuf::from("archive.gz_fixed.lz")
        );
        assert_eq!(insert_fixed(Path::new(".lz")), PathBuf::from(".lz_fixed.lz"));
        assert_eq!(
            insert_fixed(Path::new(".tlz")),
            PathBuf::from(".tlz_fixed.lz")
        );
    }
}
