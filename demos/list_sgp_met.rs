use anyhow::Result;
use armarchive::ArchiveClient;

fn main() -> Result<()> {
    // Example program that calls the library API.
    // Endpoints default to the public archive; override via env vars or
    // an `.armarchiverc` file.
    let client = ArchiveClient::from_env()?;

    let files = client.list_files(&["sgpmetE13.b1".to_string()], "20200101", None, None)?;
    for file in files {
        println!("{file}");
    }
    Ok(())
}
