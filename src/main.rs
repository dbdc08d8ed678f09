fn main() {
    radtrack_pipeline::cli::run();
}
