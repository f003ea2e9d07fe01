//! ssaform command-line tool.

use anyhow::Result;
use log::debug;
use ssaform::cfg::{verify::verify, Reversed};
use ssaform::passes::{SsaOptions, UndefinedUse};
use ssaform::Module;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "ssaform-util", about = "Dominance and SSA renaming utility.")]
struct Options {
    #[structopt(short, long)]
    debug: bool,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    #[structopt(name = "print-ir", about = "Parse IR text and print it back")]
    PrintIR {
        #[structopt(help = "IR file to parse")]
        file: PathBuf,
    },
    #[structopt(name = "dominance", about = "Print dominance information")]
    Dominance {
        #[structopt(help = "IR file to parse")]
        file: PathBuf,
        #[structopt(long, help = "Postdominance, rooted at each function's exit block")]
        reverse: bool,
        #[structopt(long, help = "Cross-check against brute-force dominator sets")]
        verify: bool,
    },
    #[structopt(name = "to-ssa", about = "Rename variables into SSA form and print the result")]
    ToSsa {
        #[structopt(help = "IR file to parse")]
        file: PathBuf,
        #[structopt(
            long,
            help = "Define variables read without a dominating definition at entry"
        )]
        implicit_defs: bool,
        #[structopt(long, help = "Skip SSA validation of the result")]
        no_validate: bool,
        #[structopt(long, help = "Cross-check dominance against brute-force dominator sets")]
        verify: bool,
    },
}

fn load(file: &PathBuf) -> Result<Module> {
    let text = std::fs::read_to_string(file)?;
    debug!("Loaded {} bytes of IR text", text.len());
    Module::from_text(&text)
}

fn main() -> Result<()> {
    let opts = Options::from_args();

    let mut logger = env_logger::Builder::from_default_env();
    if opts.debug {
        logger.filter_level(log::LevelFilter::Debug);
    }
    let _ = logger.try_init();

    match opts.command {
        Command::PrintIR { file } => {
            let module = load(&file)?;
            print!("{}", module.display());
        }
        Command::Dominance {
            file,
            reverse,
            verify: check,
        } => {
            let module = load(&file)?;
            let doms = module.dominance(reverse)?;
            for (i, (body, dom)) in module.funcs.values().zip(doms.iter()).enumerate() {
                if check {
                    if reverse {
                        verify(&Reversed(body), body.exit, dom)?;
                    } else {
                        verify(body, body.entry, dom)?;
                    }
                }
                if i > 0 {
                    println!();
                }
                println!("func {}", body.name);
                print!("{}", dom.display());
            }
        }
        Command::ToSsa {
            file,
            implicit_defs,
            no_validate,
            verify: verify_dominance,
        } => {
            let mut module = load(&file)?;
            let opts = SsaOptions {
                undefined_use: if implicit_defs {
                    UndefinedUse::ImplicitEntry
                } else {
                    UndefinedUse::Error
                },
                validate: !no_validate,
                verify_dominance,
                ..SsaOptions::default()
            };
            let results = module.to_ssa(&opts)?;
            for (body, result) in module.funcs.values().zip(results.iter()) {
                debug!(
                    "{}: {} versions, {} implicit, {} undefined phi args",
                    body.name,
                    result.stats.versions,
                    result.stats.implicit,
                    result.stats.undef_phi_args
                );
            }
            print!("{}", module.display());
        }
    }

    Ok(())
}
