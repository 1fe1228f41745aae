fn main() {
    let return_code = xptools_app::run_app(xptools_app::Program::Front);
    std::process::exit(return_code)
}
