fn main() {
    if let Err(err) = subflow_layout::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
