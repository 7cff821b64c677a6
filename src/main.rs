use clap::{Parser, ValueEnum};
use miette::Result;
use tasm::cli::{Cli, Commands, OutputFormat};
use tasm::core::{Config, Project};

fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior (terminate silently) for proper Unix piping.
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let mut global = cli.global;
    tasm::core::logging::init(global.verbose, global.quiet);

    if global.format == OutputFormat::Auto {
        let project = match &global.project {
            Some(path) => Project::discover_from(path),
            None => Project::discover(),
        };
        if let Some(name) = Config::load_for(project.ok().as_ref()).default_format {
            match OutputFormat::from_str(&name, true) {
                Ok(format) => global.format = format,
                Err(e) => tracing::warn!("ignoring default_format '{}': {}", name, e),
            }
        }
    }

    match cli.command {
        Commands::Init(args) => tasm::cli::commands::init::run(args),
        Commands::Parse(args) => tasm::cli::commands::parse::run(args, &global),
        Commands::Match(args) => tasm::cli::commands::match_parts::run(args, &global),
        Commands::Solve(args) => tasm::cli::commands::solve::run(args, &global),
        Commands::Parts(cmd) => tasm::cli::commands::parts::run(cmd, &global),
        Commands::Rules(cmd) => tasm::cli::commands::rules::run(cmd, &global),
        Commands::Store(cmd) => tasm::cli::commands::store::run(cmd, &global),
        Commands::Validate(args) => tasm::cli::commands::validate::run(args, &global),
        Commands::Completions(args) => tasm::cli::commands::completions::run(args),
    }
}
