fn main() {
    if let Err(err) = table_anonymizer::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
