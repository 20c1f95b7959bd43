fn main() {
    // ESP-IDF build-system glue is only meaningful when the espidf feature
    // (and toolchain environment) is active; on host builds this is a no-op.
    if std::env::var_os("CARGO_FEATURE_ESPIDF").is_some() {
        embuild::espidf::sysenv::output();
    }
}
