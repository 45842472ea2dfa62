fn main() {
    radtext_cli::run_main();
}
