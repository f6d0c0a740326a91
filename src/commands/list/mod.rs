use anyhow::{anyhow, Result};
use fragtk_lib::catalog::{self, Category, CATALOG};
use fragtk_lib::utils::{self, Compression};
use std::io::Write;
use structopt::StructOpt;

/// CLI arguments for the `list` subcommand.
#[derive(Debug, Clone, StructOpt)]
#[structopt(author, name = "list")]
pub struct ListArgs {
    /// Only show the category with this title (case-insensitive).
    #[structopt(long, short = "c")]
    pub category: Option<String>,

    /// Show a single operation by name, e.g. `pp.scrublet` or `scrublet`.
    #[structopt(long)]
    pub operation: Option<String>,
}

fn selected(args: &ListArgs) -> Result<Vec<&'static Category>> {
    match &args.category {
        None => Ok(CATALOG.iter().collect()),
        Some(title) => {
            let found: Vec<_> = CATALOG
                .iter()
                .filter(|c| c.title.eq_ignore_ascii_case(title))
                .collect();
            if found.is_empty() {
                return Err(anyhow!("no category named {:?}", title));
            }
            Ok(found)
        }
    }
}

/// Print the operation catalog to stdout.
pub fn run_list(args: ListArgs) -> Result<()> {
    let mut out = utils::open_for_write("-", Compression::None)?;
    if let Some(name) = &args.operation {
        let op = catalog::resolve(name).ok_or_else(|| anyhow!("unknown operation {:?}", name))?;
        writeln!(out, "{}\n  fragtk_lib::{}\n  fragtk {}\n  {}", op.name, op.path, op.command, op.summary)?;
    } else {
        for category in selected(&args)? {
            writeln!(out, "{}", category)?;
        }
    }
    out.flush()?;
    Ok(())
}
