#[macro_use]
extern crate log;

mod service;

const DEFAULT_CONFIG: &str = "gre-flags.ini";

fn main() -> anyhow::Result<()> {
    let file = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG.into());

    // rules are checked before touching iptables or the queue
    let mut srv = service::GreWall::load(&file)?;
    srv.run()
}
