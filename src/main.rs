fn main() {
    if let Err(err) = snippet_recall::cli::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
