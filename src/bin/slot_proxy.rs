//! `slot-proxy`: Core A entry point. Thin by design; all the wiring lives
//! in [`slotproxy::core_a::server`] so it stays testable without a process
//! boundary.

#[tokio::main]
async fn main() -> std::io::Result<()> {
    slotproxy::logging::init();
    slotproxy::core_a::server::run_from_env().await
}
