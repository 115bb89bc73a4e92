//! A Rust client for the ARM data archive.
//!
//! This crate implements an `arm_archive`-style flow:
//! find files in a datastream, order them, poll the order, then download
//! the staged files over the archive's transfer service.
//!
//! ## Quick start
//! - Endpoints default to the public archive; override them via
//!   environment variables (`ARMARCHIVE_WS_URL`, `ARMARCHIVE_FTP_HOST`) or
//!   an `.armarchiverc` file (supported in the current directory and in
//!   your home directory).
//! - Call [`ArchiveClient::list_files`] to find files, then
//!   [`ArchiveClient::order_files`] to stage them.
//!
//! ```no_run
//! use armarchive::{ArchiveClient, OrderOutcome};
//!
//! fn main() -> armarchive::Result<()> {
//!     let client = ArchiveClient::from_env()?;
//!
//!     let files = client.list_files(
//!         &["sgpmetE13.b1".to_string()],
//!         "20200101",
//!         None,
//!         None,
//!     )?;
//!
//!     match client.order_files("jdoe", &files)? {
//!         OrderOutcome::Accepted(confirmation) => {
//!             // Poll with order_status, then order_download.
//!             println!("order id: {}", confirmation.order_id);
//!         }
//!         OrderOutcome::Rejected(reply) => println!("{reply}"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! For the command-line surface and configuration details, see the crate
//! README.

#![forbid(unsafe_code)]

mod client;
mod config;
mod error;
mod ftp;
mod normalize;
mod soap;
mod util;

pub mod cli;

pub use client::{ArchiveClient, ClientConfig};
pub use error::{Error, Result};
pub use normalize::{OrderConfirmation, OrderOutcome};
