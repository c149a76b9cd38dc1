use docmark::{Options, render_source};
use std::io::{self, Read};
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();

    let mut input = String::new();
    if let Err(err) = io::stdin().read_to_string(&mut input) {
        eprintln!("failed to read stdin: {}", err);
        return ExitCode::FAILURE;
    }

    match render_source(&input, &Options::default()) {
        Ok(rendered) => {
            print!("{}", rendered.html);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}
