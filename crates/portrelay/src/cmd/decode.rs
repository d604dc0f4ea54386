use std::fs::File;
use std::io::{self, Read};

use portrelay_frame::{Command as RelayCommand, CommandReader};

use crate::cmd::DecodeArgs;
use crate::exit::{decode_error, io_error, CliResult, SUCCESS};
use crate::output::{print_command, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let (command, source) = match &args.file {
        Some(path) => {
            let file = File::open(path).map_err(|err| {
                io_error(&format!("failed opening {}", path.display()), err)
            })?;
            (read_one(file)?, path.display().to_string())
        }
        None => (read_one(io::stdin().lock())?, "stdin".to_string()),
    };

    print_command(&command, &source, format);
    Ok(SUCCESS)
}

fn read_one<R: Read>(reader: R) -> CliResult<RelayCommand> {
    CommandReader::new(reader)
        .read_command()
        .map_err(|err| decode_error("decode failed", err))
}
