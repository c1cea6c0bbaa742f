use std::process::ExitCode;

fn main() -> ExitCode {
    match kepfix::run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("kepfix: {:#}", err);
            ExitCode::from(2)
        }
    }
}
