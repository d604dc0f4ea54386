use portrelay_frame::{encode, Command as RelayCommand};

use crate::cmd::EncodeArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::print_raw;

pub fn run(args: EncodeArgs) -> CliResult<i32> {
    let command = RelayCommand::with_args(args.name, args.args);
    print_raw(&encode(&command));
    Ok(SUCCESS)
}
