fn main() -> anyhow::Result<()> {
    pollster::block_on(ocr_canvas::run())
}
