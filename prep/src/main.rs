fn main() -> anyhow::Result<()> {
    prep::run()
}
