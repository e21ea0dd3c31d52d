//! `wsjf-scheduler`: Core B entry point. Thin by design; all the wiring
//! lives in [`slotproxy::core_b::server`].

#[tokio::main]
async fn main() -> std::io::Result<()> {
    slotproxy::logging::init();
    slotproxy::core_b::server::run_from_env().await
}
