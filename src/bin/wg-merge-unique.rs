//! Merge many files into one file of unique lines
//!
//! Every file in a directory whose name starts with the given prefix is read, and each distinct
//! line is written once to the output. Order is not preserved. This is how the per-worker node
//! lists (e.g. `nodes_author_0000.txt`) become one list.

// Argument parsing
#[macro_use] extern crate clap;
// logging
#[macro_use] extern crate log;
extern crate env_logger;
// lastly, this library
extern crate wordgraph;

use std::path::Path;
use wordgraph::errors::*;
use wordgraph::unique;

pub fn main() {
    // Main can't return a Result, and the ? operator needs the enclosing function to return Result
    inner_main().expect("Could not recover. Exiting.");
}
pub fn inner_main() -> Result<()> {
    env_logger::init();
    let args = app_from_crate!()
        .arg_from_usage("<dir> 'directory holding the files to merge'")
        .arg_from_usage("<prefix> 'merge the files whose names start with this'")
        .arg_from_usage("<output> 'file in which to store the unique lines'")
        .get_matches();
    let dir = args.value_of("dir").unwrap_or(".");
    let prefix = args.value_of("prefix").unwrap_or("");
    let output = args.value_of("output").unwrap_or("merged.txt");

    let files = unique::files_starting_with(Path::new(dir), prefix)?;
    info!("Merging {} files starting with {:?} in {}, output goes to {}",
        files.len(), prefix, dir, output);
    let count = unique::merge_unique_to_single_file(dir, prefix, output)?;
    println!("{}", count);
    Ok(())
}
