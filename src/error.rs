//! Error taxonomy and exit-code mapping.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::member::FormatError;

/// Everything a recovery engine can fail with.
///
/// Environmental problems (bad paths, I/O failures, recoveries that are
/// impossible by construction) map to exit code 1; corrupt or invalid
/// input that could not be recovered maps to exit code 2.
#[derive(Error, Debug)]
pub enum RescueError {
    #[error("can't open input file '{path}': {source}")]
    OpenInput { path: PathBuf, source: io::Error },

    #[error("input file '{path}' is not a regular file")]
    NotRegular { path: PathBuf },

    #[error("input file '{path}' is not seekable: {source}")]
    NotSeekable { path: PathBuf, source: io::Error },

    #[error("output file '{path}' already exists, use '--force' to overwrite it")]
    OutputExists { path: PathBuf },

    #[error("can't create output file '{path}': {source}")]
    CreateOutput { path: PathBuf, source: io::Error },

    #[error("error reading input file: {0}")]
    ReadInput(io::Error),

    #[error("error reading output file: {0}")]
    ReadOutput(io::Error),

    #[error("error writing output file: {0}")]
    WriteOutput(io::Error),

    #[error("seek error: {0}")]
    Seek(io::Error),

    #[error("sizes of input files are different")]
    SizeMismatch,

    #[error("input files are identical, recovery is not possible")]
    IdenticalInputs,

    #[error("input files have the same byte damaged, try repairing one of them")]
    SharedDamagedByte,

    #[error("input files are too damaged, recovery is not possible")]
    TooDamaged,

    #[error("too many members in file")]
    TooManyMembers,

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("some error areas overlap, can't recover input file")]
    OverlappingDamage,

    #[error("can't repair error in input file")]
    Unrepairable,

    #[error("error is larger than 1 byte, can't repair input file")]
    DamageTooLarge,
}

impl RescueError {
    /// The process exit code this error maps to.
    pub fn exit_code(&self) -> i32 {
        match self {
            RescueError::Format(_)
            | RescueError::OverlappingDamage
            | RescueError::Unrepairable
            | RescueError::DamageTooLarge => 2,
            _ => 1,
        }
    }
}
