pub fn version_text() -> String {
    format!(
        "rollout {}\nOS/Arch: {}/{}",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}
