fn main() {
    match remake::run::run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("remake: {:#}", err);
            std::process::exit(1);
        }
    }
}
