fn main() {
    if let Err(err) = flowwheel_lib::run() {
        eprintln!("flowwheel: {err:#}");
        std::process::exit(1);
    }
}
