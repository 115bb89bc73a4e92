//! Command-line surface for the archive utility.
//!
//! Thin handlers over [`ArchiveClient`]: parse arguments, compile the
//! optional filter pattern, call one workflow operation, print one item
//! per line. Remote-reported failures are printed in the server's own
//! words; only genuine errors (transport faults, bad input) terminate
//! with a non-zero exit.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use regex::Regex;

use crate::ArchiveClient;
use crate::normalize::OrderOutcome;
use crate::util::regex_filter;

#[derive(Parser, Debug)]
#[command(
    name = "armarchive",
    version,
    about = "Search, order and manage staged orders at the ARM data archive"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress progress bars and non-essential logging
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Metadata/ordering web service URL override
    #[arg(long, global = true, value_name = "URL")]
    pub url: Option<String>,

    /// Bulk transfer host override, host or host:port
    #[arg(long, global = true, value_name = "HOST")]
    pub ftp_host: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List datastreams available at the archive
    Datastreams(DatastreamsArgs),

    /// List files available in a datastream
    List(ListArgs),

    /// Order files from the archive
    Order(OrderArgs),

    /// Check the status of an order
    Status(StatusArgs),

    /// Cancel an order
    Cancel(CancelArgs),

    /// Download an order into the current directory
    Download(DownloadArgs),

    /// List the files in an order
    Files(FilesArgs),

    /// List orders ready for download
    Ready(ReadyArgs),

    /// List data quality reports for a datastream measurement
    Dqrs(DqrsArgs),
}

#[derive(Args, Debug)]
pub struct DatastreamsArgs {
    /// Regular expression to filter the list
    pub regex: Option<String>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Datastream to list files from
    pub datastream: String,

    /// Starting date, YYYYMMDD
    pub start: String,

    /// Ending date, YYYYMMDD; a single day if not given
    pub end: Option<String>,

    /// Regular expression to filter files
    #[arg(short, long)]
    pub regex: Option<String>,
}

#[derive(Args, Debug)]
pub struct OrderArgs {
    /// Archive username
    pub user: String,

    /// Files to order
    pub files: Vec<String>,

    /// Datastream name, start and ending dates to order
    #[arg(
        short = 'd',
        long = "dates",
        num_args = 3,
        value_names = ["DATASTREAM", "START", "END"]
    )]
    pub dates: Option<Vec<String>>,

    /// File to read file names from, one per line
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Order id
    pub order_id: String,
}

#[derive(Args, Debug)]
pub struct CancelArgs {
    /// Archive username
    pub user: String,

    /// Order id
    pub order_id: String,
}

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Archive username
    pub user: String,

    /// Order id
    pub order_id: String,

    /// Files to download; all files in the order if missing
    pub files: Vec<String>,

    /// Regular expression selecting files from the order listing
    #[arg(short, long)]
    pub regex: Option<String>,
}

#[derive(Args, Debug)]
pub struct FilesArgs {
    /// Archive username
    pub user: String,

    /// Order id
    pub order_id: String,
}

#[derive(Args, Debug)]
pub struct ReadyArgs {
    /// Archive username
    pub user: String,
}

#[derive(Args, Debug)]
pub struct DqrsArgs {
    /// Datastream the reports are filed against
    pub datastream: String,

    /// Starting date, YYYYMMDD
    pub start: String,

    /// Ending date, YYYYMMDD
    pub end: String,

    /// Measurement the reports concern
    pub measurement: String,

    /// Regular expression to filter the list
    #[arg(short, long)]
    pub regex: Option<String>,
}

/// Builds the client and dispatches one subcommand.
pub fn run(cli: Cli) -> Result<()> {
    let client = ArchiveClient::new(cli.global.url.clone(), cli.global.ftp_host.clone())?
        .with_progress(!cli.global.quiet);

    match cli.command {
        Commands::Datastreams(args) => datastreams(&client, args),
        Commands::List(args) => list(&client, args),
        Commands::Order(args) => order(&client, args),
        Commands::Status(args) => status(&client, args),
        Commands::Cancel(args) => cancel(&client, args),
        Commands::Download(args) => download(&client, args),
        Commands::Files(args) => files(&client, args),
        Commands::Ready(args) => ready(&client, args),
        Commands::Dqrs(args) => dqrs(&client, args),
    }
}

fn datastreams(client: &ArchiveClient, args: DatastreamsArgs) -> Result<()> {
    let pattern = compile_pattern(args.regex.as_deref())?;
    print_lines(&client.list_datastreams(pattern.as_ref())?);
    Ok(())
}

fn list(client: &ArchiveClient, args: ListArgs) -> Result<()> {
    let pattern = compile_pattern(args.regex.as_deref())?;
    let found = client.list_files(
        std::slice::from_ref(&args.datastream),
        &args.start,
        args.end.as_deref(),
        pattern.as_ref(),
    )?;
    print_lines(&found);
    Ok(())
}

fn order(client: &ArchiveClient, args: OrderArgs) -> Result<()> {
    let files = if !args.files.is_empty() {
        args.files
    } else if let Some(path) = args.file {
        fs::read_to_string(&path)
            .with_context(|| format!("cannot read order list {}", path.display()))?
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect()
    } else if let Some(dates) = args.dates {
        let (datastream, start, end) = (&dates[0], &dates[1], &dates[2]);
        client.list_files(std::slice::from_ref(datastream), start, Some(end), None)?
    } else {
        bail!("no files to order: pass file names, --file or --dates");
    };

    if files.is_empty() {
        bail!("no files to order");
    }

    match client.order_files(&args.user, &files)? {
        OrderOutcome::Accepted(c) => {
            println!(
                "Success {} file(s) ordered, order_id: {}",
                c.file_count, c.order_id
            );
        }
        OrderOutcome::Rejected(reply) => {
            println!("Order failed, response from server:\n{reply}");
        }
    }
    Ok(())
}

fn status(client: &ArchiveClient, args: StatusArgs) -> Result<()> {
    println!("{}", client.order_status(&args.order_id)?);
    Ok(())
}

fn cancel(client: &ArchiveClient, args: CancelArgs) -> Result<()> {
    println!("{}", client.order_clear(&args.user, &args.order_id)?);
    Ok(())
}

fn download(client: &ArchiveClient, args: DownloadArgs) -> Result<()> {
    let files = if let Some(regex) = args.regex.as_deref() {
        let pattern = Regex::new(regex).context("invalid regular expression")?;
        let listed = client.list_order_files(&args.user, &args.order_id)?;
        Some(regex_filter(listed, Some(&pattern)))
    } else if args.files.is_empty() {
        None
    } else {
        Some(args.files)
    };

    client.order_download(&args.user, &args.order_id, files.as_deref())?;
    Ok(())
}

fn files(client: &ArchiveClient, args: FilesArgs) -> Result<()> {
    print_lines(&client.list_order_files(&args.user, &args.order_id)?);
    Ok(())
}

fn ready(client: &ArchiveClient, args: ReadyArgs) -> Result<()> {
    print_lines(&client.list_orders_ready(&args.user)?);
    Ok(())
}

fn dqrs(client: &ArchiveClient, args: DqrsArgs) -> Result<()> {
    let pattern = compile_pattern(args.regex.as_deref())?;
    let reports = client.list_dqrs(
        &args.datastream,
        &args.start,
        &args.end,
        &args.measurement,
        pattern.as_ref(),
    )?;
    print_lines(&reports);
    Ok(())
}

fn compile_pattern(regex: Option<&str>) -> Result<Option<Regex>> {
    regex
        .map(Regex::new)
        .transpose()
        .context("invalid regular expression")
}

fn print_lines(items: &[String]) {
    for item in items {
        println!("{item}");
    }
}
