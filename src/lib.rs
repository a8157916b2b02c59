//! Data recovery for lzip compressed files.
//!
//! Three operations on damaged `.lz` files: [`merge_files`] combines
//! several copies that are damaged in different places, [`repair_file`]
//! searches for a one-byte corruption in a single copy, and
//! [`split_file`] partitions a multimember file into its members.

pub mod diff;
pub mod error;
pub mod ioutil;
pub mod lzma;
pub mod member;
pub mod merge;
pub mod repair;
pub mod split;
pub mod trial;

pub use diff::Block;
pub use error::RescueError;
pub use merge::merge_files;
pub use repair::repair_file;
pub use split::split_file;
pub use trial::{try_decode, Trial};
