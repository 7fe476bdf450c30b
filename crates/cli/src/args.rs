//! The command-line arguments accepted by `gbr`.

use std::{path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand};
use gbr_driver::config::{GccConfigBuilder, DEFAULT_COMPILER};

#[derive(Debug, Parser)]
#[command(name = "gbr", version)]
#[command(about = "Compile C and C++ to FLO by way of GCC's GIMPLE", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// The directory to write a `<function>.flo` object to for each function
    #[arg(short, long, global = true, default_value = ".")]
    pub output_dir: PathBuf,

    /// Translate the functions of a unit one at a time
    #[arg(long, global = true)]
    pub sequential: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compile a C or C++ source file using GCC and the GIMPLE plugin
    Compile(CompileArgs),

    /// Translate the GIMPLE JSON previously dumped by the plugin
    Translate {
        /// The JSON file to translate
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct CompileArgs {
    /// The source file to compile
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,

    /// The GIMPLE dumping plugin to load into GCC
    #[arg(short, long, value_name = "PLUGIN")]
    pub plugin: PathBuf,

    /// The GCC executable to run
    #[arg(long, value_name = "GCC", default_value = DEFAULT_COMPILER)]
    pub gcc: PathBuf,

    /// A directory to search for included headers
    #[arg(short = 'I', value_name = "DIR")]
    pub include_dirs: Vec<PathBuf>,

    /// Kill GCC if it runs for longer than this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,
}

impl CompileArgs {
    /// Gets the builder for the GCC configuration described by the arguments.
    pub fn gcc_config(&self) -> GccConfigBuilder {
        let mut builder = GccConfigBuilder::new(&self.plugin).with_compiler(&self.gcc);
        for dir in &self.include_dirs {
            builder = builder.with_include_dir(dir);
        }
        if let Some(seconds) = self.timeout {
            builder = builder.with_timeout(Duration::from_secs(seconds));
        }

        builder
    }
}

#[cfg(test)]
mod test {
    use std::{path::PathBuf, time::Duration};

    use clap::Parser;

    use crate::args::{Cli, Command};

    #[test]
    fn maps_compile_arguments_onto_the_config() -> anyhow::Result<()> {
        let plugin = std::env::current_exe()?;
        let cli = Cli::try_parse_from([
            "gbr".as_ref(),
            "compile".as_ref(),
            "main.c".as_ref(),
            "--plugin".as_ref(),
            plugin.as_os_str(),
            "-I".as_ref(),
            "include".as_ref(),
            "--timeout".as_ref(),
            "30".as_ref(),
        ])?;

        let Command::Compile(args) = cli.command else {
            anyhow::bail!("expected the compile command");
        };
        let config = args.gcc_config().build()?;
        assert_eq!(config.compiler, PathBuf::from("gcc"));
        assert_eq!(config.include_dirs, vec![PathBuf::from("include")]);
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert_eq!(cli.output_dir, PathBuf::from("."));
        assert!(!cli.sequential);

        Ok(())
    }

    #[test]
    fn global_flags_follow_subcommands() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from(["gbr", "translate", "add.json", "--sequential", "-o", "out"])?;

        assert!(matches!(cli.command, Command::Translate { .. }));
        assert!(cli.sequential);
        assert_eq!(cli.output_dir, PathBuf::from("out"));

        Ok(())
    }
}
