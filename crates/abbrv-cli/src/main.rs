fn main() {
    abbrv_cli::run_main();
}
