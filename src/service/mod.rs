mod config;
mod iptables;
mod packet;
mod rules;

use gre_flags::IpVersion;
use nfq::Queue;
use packet::TunnelPacket;
use rules::RuleSet;
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    flag,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use config::Config;

pub struct GreWall {
    config: Config,
    rules: RuleSet,
    families: Vec<IpVersion>,
    chain: String,
    queue_num: u16,
    terminate: Arc<AtomicBool>,
}

impl GreWall {
    /// Build the service from a config file, rejecting invalid rules up front.
    pub fn load(file: &str) -> anyhow::Result<Self> {
        Self::from_config(Config::load(file)?)
    }

    /// Logging is set up before the rule is parsed so that configuration warnings
    /// reach the operator.
    fn from_config(config: Config) -> anyhow::Result<Self> {
        Self::setup_logger(&config.get_log_level());
        let rules = config.get_rules()?;
        let families = config.get_families()?;
        let chain = config.get_chain();
        let queue_num = config.get_queue_num()?;
        Ok(GreWall {
            config,
            rules,
            families,
            chain,
            queue_num,
            terminate: Arc::default(),
        })
    }

    fn setup_logger(level: &str) {
        let env = env_logger::Env::default().default_filter_or(level);
        if env_logger::Builder::from_env(env).try_init().is_err() {
            debug!("logger already installed");
        }
    }

    fn daemonize(&self) -> anyhow::Result<()> {
        let log = std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(self.config.get_log_file())?;
        daemonize::Daemonize::new()
            .stderr(log) // env_logger logs to stderr
            .user("root")
            .group("root")
            .start()
            .map_err(|err| anyhow::anyhow!("failed to daemonize: {}", err))
    }

    fn register_signals(&self) -> std::io::Result<()> {
        for signal in [SIGTERM, SIGINT].iter() {
            // a second signal while shutting down terminates right away
            flag::register_conditional_shutdown(*signal, 1, Arc::clone(&self.terminate))?;
            flag::register(*signal, Arc::clone(&self.terminate))?;
        }
        Ok(())
    }

    pub fn run(&mut self) -> anyhow::Result<()> {
        if self.config.get_daemon()? {
            self.daemonize()?;
        }
        self.register_signals()?;

        info!(
            "running '{}' for {:?} on {} via queue {}",
            self.rules.rule, self.families, self.chain, self.queue_num
        );
        iptables::clear_rules(&self.families, &self.chain, self.queue_num);
        if let Err(err) = iptables::add_rules(&self.families, &self.chain, self.queue_num) {
            error!("could not install queue rules: {:#}", err);
            iptables::clear_rules(&self.families, &self.chain, self.queue_num);
            return Err(err);
        }
        let result = self.run_loop();
        iptables::clear_rules(&self.families, &self.chain, self.queue_num);
        if let Err(msg) = &result {
            warn!("run loop failed due to {}", msg);
        }
        Ok(result?)
    }

    fn run_loop(&mut self) -> std::io::Result<()> {
        let mut queue = Queue::open()?;
        queue.bind(self.queue_num)?;
        while !self.terminate.load(Ordering::Relaxed) {
            let mut msg = queue.recv()?;
            let mut payload = msg.get_payload().to_vec();
            let (verdict, modified) = self.rules.get_verdict(&mut payload);
            if log_enabled!(log::Level::Debug) {
                match TunnelPacket::from(&payload) {
                    Ok(pkt) => debug!("verdict for {} is {:?}", pkt, verdict),
                    Err(msg) => debug!("verdict {:?}, {}", verdict, msg),
                }
            }
            if modified {
                msg.set_payload(payload);
            }
            msg.set_verdict(verdict);
            queue.verdict(msg)?;
        }
        info!("terminating");
        Ok(())
    }
}
