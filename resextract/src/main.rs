mod data_mgmt;


use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use resms::container::Container;
use resms::icon_group::GroupKind;
use resms::pe::SectionResourceReader;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::data_mgmt::{Error, Listing};


#[derive(Parser)]
enum ProgMode {
    /// Lists the resources of an executable.
    List(ListArgs),

    /// Reassembles every icon group into an `.ico` file.
    Icons(ExtractArgs),

    /// Reassembles every cursor group into a `.cur` file.
    Cursors(ExtractArgs),

    /// Writes the data of every resource as it is.
    Raw(ExtractArgs),
}

#[derive(Parser)]
struct ListArgs {
    pub input_file: PathBuf,

    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
struct ExtractArgs {
    pub input_file: PathBuf,

    #[arg(short, long, default_value = ".")]
    pub dir: PathBuf,
}


fn read_resources(input_file: &Path) -> Result<Container, Error> {
    let input_bytes = std::fs::read(input_file)?;
    let container = Container::read(&input_bytes, &SectionResourceReader)?;
    info!("{} is {:?} with {} resources", input_file.display(), container.kind, container.entries.len());
    Ok(container)
}

fn extract_groups(args: &ExtractArgs, kind: GroupKind) -> Result<(), Error> {
    let container = read_resources(&args.input_file)?;
    let mut failed_groups = 0;
    let groups = match kind {
        GroupKind::Icon => resms::extract_icons(&container.entries),
        GroupKind::Cursor => resms::extract_cursors(&container.entries),
    };
    for result in groups {
        match result {
            Ok((group, data)) => {
                let file_name = crate::data_mgmt::group_file_name(group, kind);
                let path = crate::data_mgmt::write_output(&args.dir, &file_name, &data)?;
                println!("{}", path.display());
            },
            Err(e) => {
                error!("{}: {}", args.input_file.display(), e);
                failed_groups += 1;
            },
        }
    }
    if failed_groups > 0 {
        Err(Error::FailedGroups(failed_groups))
    } else {
        Ok(())
    }
}

fn run(mode: ProgMode) -> Result<(), Error> {
    match mode {
        ProgMode::List(args) => {
            let container = read_resources(&args.input_file)?;
            if args.json {
                let listing = Listing::from(&container);
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                println!("{:?} executable", container.kind);
                for entry in &container.entries {
                    println!("{}", entry);
                }
            }
            Ok(())
        },
        ProgMode::Icons(args) => extract_groups(&args, GroupKind::Icon),
        ProgMode::Cursors(args) => extract_groups(&args, GroupKind::Cursor),
        ProgMode::Raw(args) => {
            let container = read_resources(&args.input_file)?;
            for entry in &container.entries {
                let file_name = crate::data_mgmt::raw_file_name(entry);
                let path = crate::data_mgmt::write_output(&args.dir, &file_name, &entry.data)?;
                println!("{}", path.display());
            }
            Ok(())
        },
    }
}


fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mode = ProgMode::parse();
    match run(mode) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        },
    }
}
