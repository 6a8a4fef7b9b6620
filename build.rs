fn main() -> anyhow::Result<()> {
    println!("cargo:rustc-check-cfg=cfg(esp32p4)");

    // ESP-IDF cfgs (chip model, IDF version) come from the esp-idf-sys build
    // script and only exist when cross-compiling for the espidf target.
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        embuild::build::CfgArgs::output_propagated("ESP_IDF")?;
        embuild::build::LinkArgs::output_propagated("ESP_IDF")?;
    }

    Ok(())
}
