use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::codec::Level;

#[derive(Parser, Debug)]
#[command(name = "pzip")]
#[command(version)]
#[command(about = "A minimal sequential archiver with raw DEFLATE payloads", long_about = None)]
#[command(after_help = "Examples:\n  \
  pzip create -9 out.pz a.txt b.txt   create out.pz with maximum compression\n  \
  pzip create - *.log | ssh host 'cat > logs.pz'   write the archive to stdout\n  \
  pzip list -v out.pz                 list entries with their checksums\n  \
  pzip extract -d restore out.pz      extract into ./restore")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbose: report every entry and skipped input
    #[arg(short = 'v', global = true)]
    pub verbose: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count, global = true)]
    pub quiet: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an archive from files (directories are skipped)
    Create(CreateArgs),

    /// List archive entries without extracting
    List {
        /// Archive to read
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,
    },

    /// Extract every entry
    Extract {
        /// Archive to read
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,

        /// Extract files into exdir
        #[arg(short = 'd', value_name = "DIR")]
        extract_dir: Option<PathBuf>,

        /// Overwrite existing files WITHOUT prompting
        #[arg(short = 'o')]
        overwrite: bool,
    },

    /// Decompress every entry and check its CRC32, writing nothing
    Test {
        /// Archive to read
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Archive to write, or - for stdout
    #[arg(value_name = "ARCHIVE")]
    pub archive: PathBuf,

    /// Files to add
    #[arg(value_name = "FILES", required = true)]
    pub files: Vec<PathBuf>,

    /// Compress faster
    #[arg(short = '1', group = "level")]
    level_1: bool,
    #[arg(short = '2', group = "level", hide = true)]
    level_2: bool,
    #[arg(short = '3', group = "level", hide = true)]
    level_3: bool,
    #[arg(short = '4', group = "level", hide = true)]
    level_4: bool,
    #[arg(short = '5', group = "level", hide = true)]
    level_5: bool,
    #[arg(short = '6', group = "level", hide = true)]
    level_6: bool,
    #[arg(short = '7', group = "level", hide = true)]
    level_7: bool,
    #[arg(short = '8', group = "level", hide = true)]
    level_8: bool,
    /// Compress better (-2 .. -8 pick levels in between)
    #[arg(short = '9', group = "level")]
    level_9: bool,
}

impl CreateArgs {
    pub fn level(&self) -> Level {
        let flags = [
            self.level_1,
            self.level_2,
            self.level_3,
            self.level_4,
            self.level_5,
            self.level_6,
            self.level_7,
            self.level_8,
            self.level_9,
        ];
        flags
            .iter()
            .position(|&on| on)
            .and_then(|i| Level::new(i as u32 + 1).ok())
            .unwrap_or_default()
    }

    pub fn is_stdout(&self) -> bool {
        self.archive == Path::new("-")
    }
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }
}
