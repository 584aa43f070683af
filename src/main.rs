fn main() -> anyhow::Result<()> {
    wren::cli::run_cli()
}
