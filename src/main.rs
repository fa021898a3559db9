fn main() -> anyhow::Result<()> {
    embed_bridge::cli::run()
}
