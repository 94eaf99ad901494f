use std::{env, process::ExitCode};

use scriptlang::Script;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let Some(path) = args.get(1) else {
        eprintln!("usage: scriptlang <path>");
        return ExitCode::FAILURE;
    };

    let script = match Script::new(path) {
        Ok(script) => script,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = script.run() {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
